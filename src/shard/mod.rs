// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Sharded hash tables
//!
//! Fingerprints are spread over `2^shard_bits` independent hash tables,
//! selected by the top bits of the fingerprint.

pub mod builder;
pub mod shards_builder;

use crate::{
    file::{table_path, RandomAccess},
    fingerprint::route,
    table::{Candidates, Table},
};
use std::{fs::File, path::Path};

/// The finalized hash tables of all shards, ordered by shard id
#[derive(Debug)]
pub struct Shards<R: RandomAccess = File> {
    tables: Vec<Table<R>>,
    shard_bits: u8,
}

impl Shards<File> {
    /// Opens the tables of all shards inside `folder`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or a table header is invalid.
    pub fn open<P: AsRef<Path>>(folder: P, shard_bits: u8) -> crate::Result<Self> {
        let folder = folder.as_ref();
        let shard_count = 1_usize << shard_bits;

        log::debug!("Opening {shard_count} shards in {}", folder.display());

        let tables = (0..shard_count)
            .map(|shard| Table::from_path(table_path(folder, shard)))
            .collect::<crate::Result<Vec<_>>>()?;

        Ok(Self::new(tables, shard_bits))
    }
}

impl<R: RandomAccess> Shards<R> {
    /// Wraps already opened tables.
    ///
    /// There must be exactly `2^shard_bits` tables.
    #[must_use]
    pub fn new(tables: Vec<Table<R>>, shard_bits: u8) -> Self {
        debug_assert_eq!(1 << shard_bits, tables.len());
        Self { tables, shard_bits }
    }

    /// Returns the number of shards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns `true` if there are no shards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Returns the number of shard bits.
    #[must_use]
    pub fn shard_bits(&self) -> u8 {
        self.shard_bits
    }

    /// Returns the table of a shard.
    #[must_use]
    pub fn table(&self, shard: usize) -> Option<&Table<R>> {
        self.tables.get(shard)
    }

    /// Returns the first offset stored for the fingerprint.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn get(&self, fingerprint: u64) -> crate::Result<Option<u64>> {
        self.candidates(fingerprint).next().transpose()
    }

    /// Returns all offsets whose shard-local key matches the fingerprint.
    pub fn candidates(&self, fingerprint: u64) -> Candidates<'_, R> {
        let (shard, key) = route(fingerprint, self.shard_bits);

        #[expect(
            clippy::indexing_slicing,
            reason = "route never yields a shard id outside of 2^shard_bits"
        )]
        let table = &self.tables[shard];

        table.candidates(&key)
    }
}
