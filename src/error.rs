// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Represents errors that can occur in the index
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// A hash table file has a short, corrupt or inconsistent header
    InvalidHeader(&'static str),

    /// The manifest could not be decoded
    InvalidManifest(serde_json::Error),

    /// Invalid or unsupported index format version
    InvalidVersion(u32),

    /// The persisted shard count does not match the configured one
    ShardCountMismatch {
        /// Shard count the index was opened with
        expected: usize,

        /// Shard count found in the manifest
        got: usize,
    },

    /// The persisted fingerprint function does not match the configured one
    FingerprintMismatch {
        /// Fingerprint function the index was opened with
        expected: &'static str,

        /// Fingerprint function found in the manifest
        got: String,
    },

    /// A data log record runs past the end of the log (record start offset)
    TruncatedRecord(u64),

    /// A record offset does not fit into 40 bits
    OffsetOverflow(u64),

    /// A (key, offset) pair encodes to the reserved empty slot pattern
    ReservedSlot,

    /// Finalizing a shard failed during the parallel build phase
    Build {
        /// Shard that failed first
        shard: usize,

        /// Underlying error
        source: Box<Self>,
    },

    /// The build was cancelled through its stop signal
    Cancelled,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Build { shard, source } => {
                write!(f, "ShardIndexError: building shard {shard} failed: {source}")
            }
            e => write!(f, "ShardIndexError: {e:?}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::InvalidManifest(e) => Some(e),
            Self::Build { source, .. } => Some(&**source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidManifest(value)
    }
}

/// Index result
pub type Result<T> = std::result::Result<T, Error>;
