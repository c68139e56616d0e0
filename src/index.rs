// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    data_log::{read_value, Scanner},
    manifest::Manifest,
    shard::{
        shards_builder::{remove_scratch, ShardsBuilder},
        Shards,
    },
    Config,
};
use std::{fs::File, path::Path, time::Instant};

/// A read-only index over a data log
///
/// The index is built once, on the first open, and reused afterwards.
/// Lookups take `&self` and only use positional reads, so an index
/// can be shared between threads.
pub struct Index {
    config: Config,
    log: File,
    log_size: u64,
    shards: Shards,
    rebuilt: bool,
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Index({})", self.config.path.display())
    }
}

impl Index {
    /// Opens the index of the data log at `path` with the default config.
    ///
    /// See [`Config::open`].
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, the persisted index is
    /// incompatible, or the build fails.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        Config::new(path).open()
    }

    pub(crate) fn from_config(config: Config) -> crate::Result<Self> {
        log::debug!("Opening index for {}", config.path.display());

        let log = File::open(&config.path)?;
        let log_size = log.metadata()?.len();

        std::fs::create_dir_all(&config.index_folder)?;

        if config.force_rebuild {
            log::warn!(
                "Forcing rebuild of index in {}",
                config.index_folder.display(),
            );
            Manifest::remove(&config.index_folder)?;
        }

        let (shards, rebuilt) = if let Some(manifest) = Manifest::load(&config.index_folder)? {
            manifest.check(config.shard_count(), config.fingerprinter.name())?;
            (Shards::open(&config.index_folder, config.shard_bits)?, false)
        } else {
            (Self::build(&config, &log, log_size)?, true)
        };

        Ok(Self {
            config,
            log,
            log_size,
            shards,
            rebuilt,
        })
    }

    fn build(config: &Config, log: &File, log_size: u64) -> crate::Result<Shards> {
        let start = Instant::now();

        log::info!(
            "Building index for {} ({log_size} bytes, {} shards)",
            config.path.display(),
            config.shard_count(),
        );

        match Self::scan(config, log, log_size) {
            Ok((shards, record_count)) => {
                log::info!(
                    "Indexed {record_count} records in {:?}",
                    start.elapsed(),
                );
                Ok(shards)
            }
            Err(e) => {
                log::error!("Index build failed: {e:?}");
                remove_scratch(&config.index_folder);
                Err(e)
            }
        }
    }

    fn scan(config: &Config, log: &File, log_size: u64) -> crate::Result<(Shards, u64)> {
        let folder = &config.index_folder;

        let mut builder =
            ShardsBuilder::new(folder, config.shard_bits, config.scratch_buffer_size)?;
        let mut scanner = Scanner::new(log, log_size, config.scratch_buffer_size);
        let mut record_count = 0;

        while let Some((offset, key)) = scanner.next_record()? {
            if config.stop_signal.is_stopped() {
                log::debug!("Index build was cancelled at offset {offset}");
                return Err(crate::Error::Cancelled);
            }

            builder.put(config.fingerprinter.fingerprint(key), offset)?;
            record_count += 1;
        }

        log::debug!("Scanned {record_count} records");

        let shards = builder.build_shards(config.worker_count, &config.stop_signal)?;

        Manifest::new(config.shard_count(), config.fingerprinter.name()).write(folder)?;

        Ok((shards, record_count))
    }

    /// Retrieves the value of a key from the data log.
    ///
    /// Every candidate offset is verified against the key stored in the log,
    /// so fingerprint collisions never produce a wrong value.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> crate::Result<Option<Vec<u8>>> {
        let key = key.as_ref();
        let fingerprint = self.config.fingerprinter.fingerprint(key);

        for offset in self.shards.candidates(fingerprint) {
            if let Some(value) = read_value(&self.log, self.log_size, offset?, key)? {
                return Ok(Some(value));
            }
        }

        Ok(None)
    }

    /// Returns `true` if the data log contains the key.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn contains_key<K: AsRef<[u8]>>(&self, key: K) -> crate::Result<bool> {
        self.get(key).map(|value| value.is_some())
    }

    /// Retrieves the values of multiple keys, in order.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn multi_get<K: AsRef<[u8]>>(
        &self,
        keys: impl IntoIterator<Item = K>,
    ) -> crate::Result<Vec<Option<Vec<u8>>>> {
        keys.into_iter().map(|key| self.get(key)).collect()
    }

    /// Returns the path of the data log.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Returns the folder the index files are stored in.
    #[must_use]
    pub fn index_folder(&self) -> &Path {
        &self.config.index_folder
    }

    /// Returns the number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the size of the data log when the index was opened.
    #[must_use]
    pub fn log_size(&self) -> u64 {
        self.log_size
    }

    /// Returns `true` if the index was built when it was opened.
    #[must_use]
    pub fn was_rebuilt(&self) -> bool {
        self.rebuilt
    }

    /// Closes the index, releasing all tables and then the data log.
    pub fn close(self) {
        let Self { shards, log, .. } = self;
        drop(shards);
        drop(log);
    }
}
