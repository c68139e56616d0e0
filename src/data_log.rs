// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Data log records
//!
//! The data log is owned by someone else; the index only ever reads it.
//!
//! ```text
//! [key len; 8B LE]
//! [...key; ?]
//! [value len; 8B LE]
//! [...value; ?]
//! ```

use crate::file::RandomAccess;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{BufReader, Read, Seek, Write};

/// Length of a record length prefix in bytes
pub const LEN_PREFIX: u64 = std::mem::size_of::<u64>() as u64;

/// Returns the encoded length of a record.
#[must_use]
pub fn record_len(key_len: u64, value_len: u64) -> Option<u64> {
    key_len
        .checked_add(value_len)?
        .checked_add(2 * LEN_PREFIX)
}

/// Appends records to a data log
pub struct Writer<W: Write> {
    inner: W,
    offset: u64,
}

impl<W: Write> Writer<W> {
    /// Starts writing at the given offset of the log.
    pub fn new(inner: W, offset: u64) -> Self {
        Self { inner, offset }
    }

    /// Returns the offset the next record will be written to.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Appends a record, returning its offset.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> std::io::Result<u64> {
        let offset = self.offset;

        self.inner.write_u64::<LittleEndian>(key.len() as u64)?;
        self.inner.write_all(key)?;
        self.inner.write_u64::<LittleEndian>(value.len() as u64)?;
        self.inner.write_all(value)?;

        self.offset += 2 * LEN_PREFIX + key.len() as u64 + value.len() as u64;

        Ok(offset)
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn finish(mut self) -> std::io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Scans a data log front to back
///
/// Values are skipped over, never read.
pub struct Scanner<R: Read + Seek> {
    reader: BufReader<R>,
    offset: u64,
    size: u64,
    key: Vec<u8>,
}

impl<R: Read + Seek> Scanner<R> {
    /// Starts scanning a log of `size` bytes from offset 0.
    pub fn new(reader: R, size: u64, buffer_size: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(buffer_size, reader),
            offset: 0,
            size,
            key: Vec::new(),
        }
    }

    /// Returns the offset of the next record.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next record, returning its offset and key.
    ///
    /// Returns `None` once the end of the log is reached on a record boundary.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TruncatedRecord`] if a record runs past the end of the log.
    pub fn next_record(&mut self) -> crate::Result<Option<(u64, &[u8])>> {
        let offset = self.offset;

        if offset == self.size {
            return Ok(None);
        }

        if self.remaining_from(offset) < LEN_PREFIX {
            return Err(crate::Error::TruncatedRecord(offset));
        }

        let key_len = self.reader.read_u64::<LittleEndian>()?;

        if self.remaining_from(offset) < key_len.saturating_add(2 * LEN_PREFIX) {
            return Err(crate::Error::TruncatedRecord(offset));
        }

        let key_len = usize::try_from(key_len).map_err(|_| crate::Error::TruncatedRecord(offset))?;
        self.key.resize(key_len, 0);
        self.reader.read_exact(&mut self.key)?;

        let value_len = self.reader.read_u64::<LittleEndian>()?;

        let len = record_len(key_len as u64, value_len)
            .filter(|&len| len <= self.remaining_from(offset))
            .ok_or(crate::Error::TruncatedRecord(offset))?;

        let skip = i64::try_from(value_len).map_err(|_| crate::Error::TruncatedRecord(offset))?;
        self.reader.seek_relative(skip)?;

        self.offset += len;

        Ok(Some((offset, &self.key)))
    }

    fn remaining_from(&self, offset: u64) -> u64 {
        self.size.saturating_sub(offset)
    }
}

fn read_u64_at<R: RandomAccess + ?Sized>(source: &R, offset: u64) -> std::io::Result<u64> {
    let mut buf = [0; LEN_PREFIX as usize];
    source.read_exact_at(&mut buf, offset)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads the value of the record at `offset`, if the record's key equals `key`.
///
/// `size` is the size of the log; records reaching past it are rejected
/// before any buffer is allocated.
///
/// # Errors
///
/// Will return `Err` if an IO error occurs, or the record is truncated.
pub fn read_value<R: RandomAccess + ?Sized>(
    source: &R,
    size: u64,
    offset: u64,
    key: &[u8],
) -> crate::Result<Option<Vec<u8>>> {
    let key_len = read_u64_at(source, offset)?;

    if key_len != key.len() as u64 {
        return Ok(None);
    }

    let key_offset = offset + LEN_PREFIX;

    if key_offset.saturating_add(key_len).saturating_add(LEN_PREFIX) > size {
        return Err(crate::Error::TruncatedRecord(offset));
    }

    let mut stored_key = vec![0; key.len()];
    source.read_exact_at(&mut stored_key, key_offset)?;

    if stored_key != key {
        return Ok(None);
    }

    let value_len_offset = key_offset + key_len;
    let value_len = read_u64_at(source, value_len_offset)?;

    let value_offset = value_len_offset + LEN_PREFIX;

    if value_offset.saturating_add(value_len) > size {
        return Err(crate::Error::TruncatedRecord(offset));
    }

    let value_len = usize::try_from(value_len).map_err(|_| crate::Error::TruncatedRecord(offset))?;
    let mut value = vec![0; value_len];
    source.read_exact_at(&mut value, value_offset)?;

    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use test_log::test;

    fn write_log(records: &[(&[u8], &[u8])]) -> std::io::Result<Vec<u8>> {
        let mut writer = Writer::new(vec![], 0);
        for (key, value) in records {
            writer.append(key, value)?;
        }
        writer.finish()
    }

    #[test]
    fn writer_layout() -> std::io::Result<()> {
        let mut writer = Writer::new(vec![], 0);
        assert_eq!(0, writer.append(b"123", b"456")?);
        assert_eq!(22, writer.append(b"a", b"")?);
        assert_eq!(39, writer.offset());

        let bytes = writer.finish()?;

        let mut expected = vec![];
        expected.extend_from_slice(&3_u64.to_le_bytes());
        expected.extend_from_slice(b"123");
        expected.extend_from_slice(&3_u64.to_le_bytes());
        expected.extend_from_slice(b"456");
        expected.extend_from_slice(&1_u64.to_le_bytes());
        expected.extend_from_slice(b"a");
        expected.extend_from_slice(&0_u64.to_le_bytes());
        assert_eq!(expected, bytes);

        Ok(())
    }

    #[test]
    fn scanner_offsets() -> crate::Result<()> {
        let log = write_log(&[
            (b"123", b"456"),
            (b"helloworld", b"!"),
            (b"username", b"password"),
        ])?;
        let size = log.len() as u64;

        let mut scanner = Scanner::new(Cursor::new(log), size, 16);

        let mut records = vec![];
        while let Some((offset, key)) = scanner.next_record()? {
            records.push((offset, key.to_vec()));
        }

        assert_eq!(
            vec![
                (0, b"123".to_vec()),
                (22, b"helloworld".to_vec()),
                (49, b"username".to_vec()),
            ],
            records,
        );
        assert_eq!(size, scanner.offset());

        Ok(())
    }

    #[test]
    fn scanner_empty() -> crate::Result<()> {
        let mut scanner = Scanner::new(Cursor::new(vec![]), 0, 16);
        assert!(scanner.next_record()?.is_none());
        Ok(())
    }

    #[test]
    fn scanner_truncated() -> crate::Result<()> {
        let log = write_log(&[(b"a", b"b"), (b"key", b"value")])?;

        for cut in [1, 5, 20, 25, 35, log.len() - 1] {
            let bytes = log[..cut].to_vec();
            let size = bytes.len() as u64;
            let mut scanner = Scanner::new(Cursor::new(bytes), size, 16);

            let mut result = scanner.next_record().map(|r| r.map(|(offset, _)| offset));
            if cut > 18 {
                assert_eq!(0, result?.unwrap());
                result = scanner.next_record().map(|r| r.map(|(offset, _)| offset));
            }

            let expected = if cut > 18 { 18 } else { 0 };
            assert!(
                matches!(result, Err(crate::Error::TruncatedRecord(offset)) if offset == expected),
                "cut at {cut}",
            );
        }

        Ok(())
    }

    #[test]
    fn read_value_verifies_key() -> crate::Result<()> {
        let log = write_log(&[(b"123", b"456"), (b"helloworld", b"!")])?;
        let size = log.len() as u64;

        assert_eq!(Some(b"456".to_vec()), read_value(&log, size, 0, b"123")?);
        assert_eq!(Some(b"!".to_vec()), read_value(&log, size, 22, b"helloworld")?);

        // Wrong length
        assert_eq!(None, read_value(&log, size, 0, b"1234")?);

        // Same length, different bytes
        assert_eq!(None, read_value(&log, size, 0, b"124")?);

        Ok(())
    }

    #[test]
    fn read_value_truncated() -> crate::Result<()> {
        let log = write_log(&[(b"123", b"456")])?;

        assert!(matches!(
            read_value(&log, 20, 0, b"123"),
            Err(crate::Error::TruncatedRecord(0)),
        ));

        Ok(())
    }
}
