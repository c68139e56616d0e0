// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Closed hash table
//!
//! A table maps shard-local keys (7 bytes) to record offsets (5 bytes).
//! Collisions are resolved using linear probing; a table is generated once
//! and never mutated afterwards.
//!
//! ```text
//! +--------------+----------+----------+-----+----------------+
//! | slot count   |  slot 0  |  slot 1  | ... | slot count - 1 |
//! | (8B, LE)     |  (12B)   |  (12B)   |     |     (12B)      |
//! +--------------+----------+----------+-----+----------------+
//! ```
//!
//! The slot count is always a power of two.
//! Free slots hold [`EMPTY_SLOT`](crate::slot::EMPTY_SLOT).

mod generator;

pub use generator::{generate, slot_count_for, Generator};

use crate::{
    file::RandomAccess,
    slot::{LocalKey, Slot, SLOT_LEN},
};
use std::{fs::File, path::Path};

/// Length of the slot count header in bytes
pub const HEADER_LEN: u64 = std::mem::size_of::<u64>() as u64;

fn start_slot(key: &LocalKey, slot_count: u64) -> u64 {
    key.as_u64() & (slot_count - 1)
}

/// Read-only view of a generated hash table
///
/// All lookups are positional reads, so a table can be shared between threads.
/// Dropping the table releases its source.
pub struct Table<R: RandomAccess = File> {
    source: R,
    slot_count: u64,
}

impl<R: RandomAccess> std::fmt::Debug for Table<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Table(slot_count={})", self.slot_count)
    }
}

impl Table<File> {
    /// Opens a table file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the header is invalid.
    pub fn from_path<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        log::trace!("Opening hash table at {}", path.display());
        Self::open(File::open(path)?)
    }
}

impl<R: RandomAccess> Table<R> {
    /// Opens a table by reading its header.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidHeader`] if the header is short, the slot count
    /// is not a power of two, or the source size does not match the slot count.
    pub fn open(source: R) -> crate::Result<Self> {
        let mut header = [0; HEADER_LEN as usize];

        match source.read_exact_at(&mut header, 0) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(crate::Error::InvalidHeader("HashTable"));
            }
            Err(e) => return Err(e.into()),
        }

        let slot_count = u64::from_le_bytes(header);

        if !slot_count.is_power_of_two() {
            log::error!("Hash table slot count {slot_count} is not a power of two");
            return Err(crate::Error::InvalidHeader("HashTable"));
        }

        let expected_size = slot_count
            .checked_mul(SLOT_LEN as u64)
            .and_then(|n| n.checked_add(HEADER_LEN));

        let size = source.size()?;

        if expected_size != Some(size) {
            log::error!(
                "Hash table has size {size}, but {slot_count} slots need {expected_size:?} bytes"
            );
            return Err(crate::Error::InvalidHeader("HashTable"));
        }

        Ok(Self { source, slot_count })
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn slot_count(&self) -> u64 {
        self.slot_count
    }

    fn read_slot(&self, pos: u64) -> std::io::Result<[u8; SLOT_LEN]> {
        let mut buf = [0; SLOT_LEN];
        self.source
            .read_exact_at(&mut buf, HEADER_LEN + pos * SLOT_LEN as u64)?;
        Ok(buf)
    }

    /// Returns the record offset of the first slot matching the key.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn get(&self, key: &LocalKey) -> crate::Result<Option<u64>> {
        self.candidates(key).next().transpose()
    }

    /// Returns the record offsets of all slots matching the key, in probe order.
    ///
    /// Different keys may share a shard-local key, so every candidate
    /// has to be verified by the caller.
    #[must_use]
    pub fn candidates(&self, key: &LocalKey) -> Candidates<'_, R> {
        Candidates {
            table: self,
            key: *key,
            pos: start_slot(key, self.slot_count),
            remaining: self.slot_count,
        }
    }
}

/// Iterator over the matching slots of a probe sequence
///
/// Stops at the first free slot or after visiting every slot once.
pub struct Candidates<'a, R: RandomAccess> {
    table: &'a Table<R>,
    key: LocalKey,
    pos: u64,
    remaining: u64,
}

impl<R: RandomAccess> Iterator for Candidates<'_, R> {
    type Item = crate::Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.remaining > 0 {
            self.remaining -= 1;

            let bytes = match self.table.read_slot(self.pos) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.remaining = 0;
                    return Some(Err(e.into()));
                }
            };

            self.pos = (self.pos + 1) & (self.table.slot_count - 1);

            let Some(slot) = Slot::decode(bytes) else {
                // Linear probing never leaves a gap inside a probe sequence
                self.remaining = 0;
                return None;
            };

            if slot.key() == self.key {
                return Some(Ok(slot.offset()));
            }
        }

        None
    }
}
