// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Scratch buffering and finalization of a single shard

use crate::{
    slot::{LocalKey, Slot, SLOT_LEN},
    table::generate,
};
use std::{
    fs::File,
    io::{BufReader, BufWriter, IntoInnerError, Read, Seek, Write},
    path::{Path, PathBuf},
};

/// Buffers the pairs of one shard into a scratch file
///
/// The scratch file is a plain sequence of 12-byte slots in insertion order.
/// [`ShardBuilder::finish`] turns it into a hash table and deletes it.
pub struct ShardBuilder {
    path: PathBuf,
    writer: BufWriter<File>,
    buffer_size: usize,
    item_count: u64,
}

impl std::fmt::Debug for ShardBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ShardBuilder({}, items={})",
            self.path.display(),
            self.item_count,
        )
    }
}

impl ShardBuilder {
    /// Creates (or truncates) the scratch file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn new<P: AsRef<Path>>(path: P, buffer_size: usize) -> crate::Result<Self> {
        let path = path.as_ref();
        log::trace!("Creating scratch file at {}", path.display());

        let file = File::options()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(path)?;

        Ok(Self {
            path: path.into(),
            writer: BufWriter::with_capacity(buffer_size, file),
            buffer_size,
            item_count: 0,
        })
    }

    /// Returns the number of buffered pairs.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Appends a pair to the scratch file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, the offset exceeds 40 bits,
    /// or the pair encodes to the reserved empty slot.
    pub fn put(&mut self, key: LocalKey, offset: u64) -> crate::Result<()> {
        let slot = Slot::new(key, offset)?;
        self.writer.write_all(&slot.encode())?;
        self.item_count += 1;
        Ok(())
    }

    /// Generates the hash table at `table_path` and deletes the scratch file.
    ///
    /// Returns the number of items in the table.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn finish<P: AsRef<Path>>(self, table_path: P) -> crate::Result<u64> {
        let table_path = table_path.as_ref();

        let mut scratch = self.writer.into_inner().map_err(IntoInnerError::into_error)?;
        scratch.rewind()?;

        let mut reader = BufReader::with_capacity(self.buffer_size, scratch);

        let items = std::iter::from_fn(|| {
            let mut buf = [0; SLOT_LEN];

            Some(
                reader
                    .read_exact(&mut buf)
                    .map_err(crate::Error::from)
                    .and_then(|()| Slot::decode(buf).ok_or(crate::Error::ReservedSlot)),
            )
        });

        let mut table_writer = BufWriter::with_capacity(self.buffer_size, File::create(table_path)?);
        let slot_count = generate(self.item_count, items, &mut table_writer)?;

        let table_file = table_writer
            .into_inner()
            .map_err(IntoInnerError::into_error)?;
        table_file.sync_all()?;

        drop(reader);
        std::fs::remove_file(&self.path)?;

        log::trace!(
            "Generated hash table at {} ({} items, {slot_count} slots)",
            table_path.display(),
            self.item_count,
        );

        Ok(self.item_count)
    }
}
