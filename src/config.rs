// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    fingerprint::{Fingerprinter, Xxh3, MAX_SHARD_BITS},
    path::{absolute_path, parent_folder},
    stop_signal::StopSignal,
    Index,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Index configuration builder
#[derive(Clone)]
pub struct Config {
    /// Path of the data log
    #[doc(hidden)]
    pub path: PathBuf,

    /// Folder the index files live in
    #[doc(hidden)]
    pub index_folder: PathBuf,

    /// Number of bits used to select a shard
    pub shard_bits: u8,

    /// Number of threads used to finalize shards
    pub worker_count: usize,

    /// Buffer size used per shard when writing and reading scratch files
    pub scratch_buffer_size: usize,

    /// Fingerprint function
    pub fingerprinter: Arc<dyn Fingerprinter>,

    /// Discard an existing index and build it again
    pub force_rebuild: bool,

    /// Cancels a running build
    pub stop_signal: StopSignal,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("path", &self.path)
            .field("index_folder", &self.index_folder)
            .field("shard_bits", &self.shard_bits)
            .field("worker_count", &self.worker_count)
            .field("scratch_buffer_size", &self.scratch_buffer_size)
            .field("fingerprinter", &self.fingerprinter.name())
            .field("force_rebuild", &self.force_rebuild)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Initializes a new config for the data log at `path`.
    ///
    /// The index is stored next to the data log by default.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = absolute_path(path);

        Self {
            index_folder: parent_folder(&path),
            path,
            shard_bits: MAX_SHARD_BITS,
            worker_count: 8,
            scratch_buffer_size: /* 1 MiB */ 1_024 * 1_024,
            fingerprinter: Arc::new(Xxh3),
            force_rebuild: false,
            stop_signal: StopSignal::default(),
        }
    }

    /// Returns the number of shards.
    #[must_use]
    pub fn shard_count(&self) -> usize {
        1 << self.shard_bits
    }

    /// Sets the folder the index files are stored in.
    ///
    /// Defaults to the folder of the data log.
    #[must_use]
    pub fn index_folder<P: AsRef<Path>>(mut self, folder: P) -> Self {
        self.index_folder = absolute_path(folder);
        self
    }

    /// Sets the number of bits used to select a shard.
    ///
    /// The index consists of `2^bits` hash tables.
    /// Cannot be changed once the index is built.
    ///
    /// Defaults to 8 (256 shards).
    ///
    /// # Panics
    ///
    /// Panics if `bits` is greater than 8.
    #[must_use]
    pub fn shard_bits(mut self, bits: u8) -> Self {
        assert!(bits <= MAX_SHARD_BITS, "shard bits must be at most {MAX_SHARD_BITS}");

        self.shard_bits = bits;
        self
    }

    /// Sets the number of threads used to finalize shards.
    ///
    /// Defaults to 8.
    ///
    /// # Panics
    ///
    /// Panics if `n` is 0.
    #[must_use]
    pub fn worker_count(mut self, n: usize) -> Self {
        assert!(n > 0, "worker count must be at least 1");

        self.worker_count = n;
        self
    }

    /// Sets the buffer size used per shard when building.
    ///
    /// Every shard holds one buffer during the scan phase,
    /// so the scan needs `shard count * bytes` of memory.
    ///
    /// Defaults to 1 MiB.
    #[must_use]
    pub fn scratch_buffer_size(mut self, bytes: usize) -> Self {
        self.scratch_buffer_size = bytes.max(crate::slot::SLOT_LEN);
        self
    }

    /// Sets the fingerprint function.
    ///
    /// Cannot be changed once the index is built.
    ///
    /// Defaults to [`Xxh3`].
    #[must_use]
    pub fn fingerprinter<F: Fingerprinter + 'static>(mut self, fingerprinter: F) -> Self {
        self.fingerprinter = Arc::new(fingerprinter);
        self
    }

    /// If `true`, an existing index is discarded and built again.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn force_rebuild(mut self, b: bool) -> Self {
        self.force_rebuild = b;
        self
    }

    /// Installs a stop signal that cancels the build when sent.
    #[must_use]
    pub fn stop_signal(mut self, signal: StopSignal) -> Self {
        self.stop_signal = signal;
        self
    }

    /// Opens the index using the config, building it if needed.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, the persisted index is
    /// incompatible, or the build fails.
    pub fn open(self) -> crate::Result<Index> {
        Index::from_config(self)
    }
}
