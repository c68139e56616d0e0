// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::path::{Path, PathBuf};

/// Makes a path absolute without touching the file system.
///
/// The empty path is returned as is.
#[allow(clippy::module_name_repetitions)]
pub fn absolute_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    std::path::absolute(path).unwrap_or_else(|_| path.into())
}

/// Returns the folder containing `path`.
pub fn parent_folder<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = absolute_path(path);

    match path.parent() {
        Some(parent) => parent.into(),
        None => path,
    }
}
