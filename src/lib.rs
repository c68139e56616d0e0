// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A build-once, read-many hash index over append-only key-value logs.
//!
//! ##### About
//!
//! This crate exports an [`Index`] that maps arbitrary byte keys to the records
//! of a data log, without ever scanning the log on lookup.
//!
//! The data log is a plain sequence of records:
//!
//! ```text
//! [key len; 8B LE] [...key] [value len; 8B LE] [...value]
//! ```
//!
//! On first open, the log is scanned once. Every key is hashed into a 64-bit fingerprint,
//! whose top bits select one of up to 256 shards. Each shard is a closed hash table
//! (linear probing) of fixed-width slots, holding the low 56 bits of the fingerprint
//! and the 40-bit offset of the record. Shards are buffered into scratch files during the
//! scan, then turned into hash tables in parallel. Finally, a manifest is written, so
//! following opens skip the build entirely.
//!
//! A lookup hashes the key, probes a single table and verifies every candidate
//! against the key stored in the log, so fingerprint collisions never return wrong values.
//!
//! The index is immutable: to index new records, rebuild it.
//!
//! # Example usage
//!
//! ```
//! use shard_index::{data_log::Writer, Config};
//! # let folder = tempfile::tempdir()?;
//! # let path = folder.path().join("data.log");
//!
//! let mut writer = Writer::new(std::fs::File::create(&path)?, 0);
//! writer.append(b"helloworld", b"!")?;
//! writer.finish()?;
//!
//! let index = Config::new(&path).open()?;
//!
//! assert_eq!(Some(b"!".to_vec()), index.get("helloworld")?);
//! assert_eq!(None, index.get("missing")?);
//! #
//! # Ok::<(), shard_index::Error>(())
//! ```

#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]
#![warn(clippy::redundant_feature_names)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod config;

pub mod data_log;

mod error;

#[doc(hidden)]
pub mod file;

/// Fingerprint functions and shard routing
pub mod fingerprint;

mod format_version;
mod index;

#[doc(hidden)]
pub mod manifest;

mod path;

pub mod shard;

#[doc(hidden)]
pub mod slot;

#[doc(hidden)]
pub mod stop_signal;

#[doc(hidden)]
pub mod table;

pub use {
    config::Config,
    error::{Error, Result},
    fingerprint::{Fingerprinter, Fnv1, Xxh3},
    format_version::FormatVersion,
    index::Index,
    stop_signal::StopSignal,
};

#[doc(hidden)]
#[must_use]
#[allow(missing_docs, clippy::missing_errors_doc, clippy::unwrap_used)]
pub fn get_tmp_folder() -> tempfile::TempDir {
    if let Ok(p) = std::env::var("SIDX_TMP_FOLDER") {
        tempfile::tempdir_in(p)
    } else {
        tempfile::tempdir()
    }
    .unwrap()
}
