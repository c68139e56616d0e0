// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

pub const MANIFEST_FILE: &str = "manifest";
pub const TABLES_FOLDER: &str = "tables";
pub const SCRATCH_FOLDER: &str = "scratch";

/// `{folder}/tables/{shard}`
#[must_use]
pub fn table_path(folder: &Path, shard: usize) -> PathBuf {
    folder.join(TABLES_FOLDER).join(shard.to_string())
}

/// `{folder}/scratch/{shard}`
#[must_use]
pub fn scratch_path(folder: &Path, shard: usize) -> PathBuf {
    folder.join(SCRATCH_FOLDER).join(shard.to_string())
}

/// Atomically rewrites a file
pub fn rewrite_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    #[expect(clippy::expect_used, reason = "every file we write lives in a folder")]
    let folder = path.parent().expect("should have a parent");

    let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;
    temp_file.write_all(content)?;
    temp_file.persist(path)?;

    #[cfg(not(target_os = "windows"))]
    {
        let file = File::open(path)?;
        file.sync_all()?;
    }

    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    let file = File::open(path)?;
    debug_assert!(file.metadata()?.is_dir());
    file.sync_all()
}

#[cfg(target_os = "windows")]
pub fn fsync_directory(_path: &Path) -> std::io::Result<()> {
    // Cannot fsync directory on Windows
    Ok(())
}

/// Random-access byte source a hash table can be read from.
///
/// All reads are positional, so a source can be shared by concurrent readers
/// without a cursor.
pub trait RandomAccess: Send + Sync {
    /// Fills `buf` with the bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` if the source ends before `buf` is full.
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()>;

    /// Returns the size of the source in bytes.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn size(&self) -> std::io::Result<u64>;
}

impl RandomAccess for File {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;

            FileExt::read_exact_at(self, buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;

            let mut filled = 0;

            while let Some(rest) = buf.get_mut(filled..).filter(|rest| !rest.is_empty()) {
                match self.seek_read(rest, offset + filled as u64) {
                    Ok(0) => {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::UnexpectedEof,
                            "failed to fill whole buffer",
                        ));
                    }
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(e) => return Err(e),
                }
            }

            Ok(())
        }

        #[cfg(not(any(unix, windows)))]
        {
            compile_error!("unsupported OS");
            unimplemented!();
        }
    }

    fn size(&self) -> std::io::Result<u64> {
        self.metadata().map(|m| m.len())
    }
}

impl RandomAccess for Vec<u8> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        let start = usize::try_from(offset).ok();
        let end = start.and_then(|start| start.checked_add(buf.len()));

        match start.zip(end).and_then(|(start, end)| self.get(start..end)) {
            Some(bytes) => {
                buf.copy_from_slice(bytes);
                Ok(())
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read past end of buffer",
            )),
        }
    }

    fn size(&self) -> std::io::Result<u64> {
        Ok(self.as_slice().len() as u64)
    }
}

impl<T: RandomAccess + ?Sized> RandomAccess for Arc<T> {
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        (**self).read_exact_at(buf, offset)
    }

    fn size(&self) -> std::io::Result<u64> {
        (**self).size()
    }
}
