// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Parallel build of all shards

use super::{builder::ShardBuilder, Shards};
use crate::{
    file::{fsync_directory, scratch_path, table_path, SCRATCH_FOLDER, TABLES_FOLDER},
    fingerprint::route,
    stop_signal::StopSignal,
    table::Table,
};
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Instant,
};

/// Scatters (fingerprint, offset) pairs over all shards, then finalizes them in parallel
pub struct ShardsBuilder {
    folder: PathBuf,
    shard_bits: u8,
    builders: Vec<ShardBuilder>,
}

impl ShardsBuilder {
    /// Creates one scratch file per shard inside `folder`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn new<P: AsRef<Path>>(folder: P, shard_bits: u8, buffer_size: usize) -> crate::Result<Self> {
        let folder = folder.as_ref();
        let shard_count = 1_usize << shard_bits;

        log::debug!(
            "Creating {shard_count} shard builders in {}",
            folder.display(),
        );

        // Scratch files of an aborted build may belong to more shards
        remove_scratch(folder);

        std::fs::create_dir_all(folder.join(TABLES_FOLDER))?;
        std::fs::create_dir_all(folder.join(SCRATCH_FOLDER))?;

        let builders = (0..shard_count)
            .map(|shard| ShardBuilder::new(scratch_path(folder, shard), buffer_size))
            .collect::<crate::Result<Vec<_>>>()?;

        Ok(Self {
            folder: folder.into(),
            shard_bits,
            builders,
        })
    }

    /// Returns the number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.builders.len()
    }

    /// Routes a pair to its shard builder.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the pair cannot be stored.
    pub fn put(&mut self, fingerprint: u64, offset: u64) -> crate::Result<()> {
        let (shard, key) = route(fingerprint, self.shard_bits);

        #[expect(
            clippy::indexing_slicing,
            reason = "route never yields a shard id outside of 2^shard_bits"
        )]
        let builder = &mut self.builders[shard];

        builder.put(key, offset)
    }

    /// Finalizes all shards using up to `workers` threads.
    ///
    /// The first error any worker hits is returned, tagged with its shard.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Build`] if finalizing a shard failed,
    /// and [`crate::Error::Cancelled`] if the stop signal fired.
    pub fn build_shards(self, workers: usize, stop_signal: &StopSignal) -> crate::Result<Shards> {
        let start = Instant::now();

        let Self {
            folder,
            shard_bits,
            builders,
        } = self;

        let shard_count = builders.len();
        let workers = workers.clamp(1, shard_count);

        log::debug!("Finalizing {shard_count} shards using {workers} workers");

        let queue = Mutex::new(builders.into_iter().enumerate());
        let tables = Mutex::new(Vec::with_capacity(shard_count));
        let first_error: Mutex<Option<(usize, crate::Error)>> = Mutex::new(None);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    if stop_signal.is_stopped() {
                        return;
                    }

                    #[expect(clippy::expect_used, reason = "workers never panic while holding it")]
                    let next = queue.lock().expect("lock is poisoned").next();

                    let Some((shard, builder)) = next else {
                        return;
                    };

                    match finish_shard(&folder, shard, builder) {
                        Ok(table) => {
                            #[expect(clippy::expect_used, reason = "workers never panic while holding it")]
                            let mut tables = tables.lock().expect("lock is poisoned");

                            tables.push((shard, table));
                        }
                        Err(e) => {
                            log::error!("Failed to finalize shard {shard}: {e:?}");

                            #[expect(clippy::expect_used, reason = "workers never panic while holding it")]
                            let mut first_error = first_error.lock().expect("lock is poisoned");

                            if first_error.is_none() {
                                *first_error = Some((shard, e));
                            }

                            return;
                        }
                    }
                });
            }
        });

        if let Some((shard, e)) = first_error.into_inner().unwrap_or_else(|e| e.into_inner()) {
            return Err(crate::Error::Build {
                shard,
                source: Box::new(e),
            });
        }

        let mut tables = tables.into_inner().unwrap_or_else(|e| e.into_inner());

        if stop_signal.is_stopped() && tables.len() < shard_count {
            log::debug!("Shard finalization was cancelled");
            return Err(crate::Error::Cancelled);
        }

        tables.sort_by_key(|(shard, _)| *shard);

        fsync_directory(&folder.join(TABLES_FOLDER))?;

        if let Err(e) = std::fs::remove_dir(folder.join(SCRATCH_FOLDER)) {
            log::warn!("Could not remove scratch folder: {e:?}");
        }

        log::debug!(
            "Finalized {shard_count} shards in {:?}",
            start.elapsed(),
        );

        Ok(Shards::new(
            tables.into_iter().map(|(_, table)| table).collect(),
            shard_bits,
        ))
    }
}

fn finish_shard(folder: &Path, shard: usize, builder: ShardBuilder) -> crate::Result<Table<File>> {
    let path = table_path(folder, shard);
    let item_count = builder.finish(&path)?;

    log::trace!("Finalized shard {shard} with {item_count} items");

    Table::from_path(path)
}

/// Removes leftover scratch files of an aborted build.
pub fn remove_scratch(folder: &Path) {
    let path = folder.join(SCRATCH_FOLDER);

    match std::fs::remove_dir_all(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove scratch folder {}: {e:?}", path.display()),
    }
}
