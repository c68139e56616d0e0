// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Index manifest
//!
//! The manifest is written last during a build, so its existence marks
//! the index as complete.
//!
//! ```json
//! {"version":1,"shard_num":256,"fingerprint":"xxh3"}
//! ```

use crate::{
    file::{fsync_directory, rewrite_atomic, MANIFEST_FILE},
    FormatVersion,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

// Manifests without a fingerprint name were built with FNV-1
fn default_fingerprint() -> String {
    String::from("fnv1")
}

/// Persisted descriptor of a built index
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Disk format version
    pub version: u32,

    /// Number of shards
    pub shard_num: usize,

    /// Name of the fingerprint function
    #[serde(default = "default_fingerprint")]
    pub fingerprint: String,
}

impl Manifest {
    /// Describes an index built with the current format version.
    #[must_use]
    pub fn new(shard_num: usize, fingerprint: &str) -> Self {
        Self {
            version: FormatVersion::CURRENT.into(),
            shard_num,
            fingerprint: fingerprint.into(),
        }
    }

    /// Loads the manifest of an index folder.
    ///
    /// Returns `None` if there is no manifest yet.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the manifest cannot be decoded.
    pub fn load<P: AsRef<Path>>(folder: P) -> crate::Result<Option<Self>> {
        let path = folder.as_ref().join(MANIFEST_FILE);

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let manifest = serde_json::from_slice::<Self>(&bytes)?;

        log::debug!("Loaded manifest from {}: {manifest:?}", path.display());

        Ok(Some(manifest))
    }

    /// Atomically writes the manifest into an index folder.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn write<P: AsRef<Path>>(&self, folder: P) -> crate::Result<()> {
        let folder = folder.as_ref();
        let path = folder.join(MANIFEST_FILE);

        log::trace!("Writing manifest to {}", path.display());

        let bytes = serde_json::to_vec(self)?;
        rewrite_atomic(&path, &bytes)?;
        fsync_directory(folder)?;

        Ok(())
    }

    /// Deletes the manifest of an index folder, if any.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn remove<P: AsRef<Path>>(folder: P) -> crate::Result<()> {
        let folder = folder.as_ref();
        let path = folder.join(MANIFEST_FILE);

        match std::fs::remove_file(&path) {
            Ok(()) => {
                log::trace!("Removed manifest at {}", path.display());
                fsync_directory(folder)?;
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Checks that the index can be read with the given shard count and fingerprint function.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidVersion`], [`crate::Error::ShardCountMismatch`]
    /// or [`crate::Error::FingerprintMismatch`].
    pub fn check(&self, shard_count: usize, fingerprint: &'static str) -> crate::Result<()> {
        FormatVersion::try_from(self.version)
            .map_err(|()| crate::Error::InvalidVersion(self.version))?;

        if self.shard_num != shard_count {
            return Err(crate::Error::ShardCountMismatch {
                expected: shard_count,
                got: self.shard_num,
            });
        }

        if self.fingerprint != fingerprint {
            return Err(crate::Error::FingerprintMismatch {
                expected: fingerprint,
                got: self.fingerprint.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn manifest_write_load() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        assert_eq!(None, Manifest::load(dir.path())?);

        let manifest = Manifest::new(256, "xxh3");
        manifest.write(dir.path())?;

        assert_eq!(
            r#"{"version":1,"shard_num":256,"fingerprint":"xxh3"}"#,
            std::fs::read_to_string(dir.path().join(MANIFEST_FILE))?,
        );
        assert_eq!(Some(manifest), Manifest::load(dir.path())?);

        Manifest::remove(dir.path())?;
        assert_eq!(None, Manifest::load(dir.path())?);

        // Removing twice is fine
        Manifest::remove(dir.path())?;

        Ok(())
    }

    #[test]
    fn manifest_without_fingerprint() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;

        std::fs::write(
            dir.path().join(MANIFEST_FILE),
            "{\"version\": 1, \"shard_num\": 256}\n",
        )?;

        let manifest = Manifest::load(dir.path())?;
        assert_eq!(Some(Manifest::new(256, "fnv1")), manifest);

        assert!(matches!(
            manifest.map(|m| m.check(256, "xxh3")),
            Some(Err(crate::Error::FingerprintMismatch { expected: "xxh3", .. })),
        ));

        Ok(())
    }

    #[test]
    fn manifest_garbage() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join(MANIFEST_FILE), "not json")?;

        assert!(matches!(
            Manifest::load(dir.path()),
            Err(crate::Error::InvalidManifest(_)),
        ));

        Ok(())
    }

    #[test]
    fn manifest_check() {
        let manifest = Manifest::new(256, "xxh3");
        assert!(manifest.check(256, "xxh3").is_ok());

        assert!(matches!(
            manifest.check(16, "xxh3"),
            Err(crate::Error::ShardCountMismatch {
                expected: 16,
                got: 256
            }),
        ));

        assert!(matches!(
            manifest.check(256, "fnv1"),
            Err(crate::Error::FingerprintMismatch { expected: "fnv1", .. }),
        ));

        let manifest = Manifest {
            version: 2,
            ..manifest
        };
        assert!(matches!(
            manifest.check(256, "xxh3"),
            Err(crate::Error::InvalidVersion(2)),
        ));
    }
}
