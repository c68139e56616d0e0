// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::slot::LocalKey;

/// Maximum number of bits used to select a shard
///
/// With 8 bits, the shard id is exactly the byte dropped from the shard-local key.
pub const MAX_SHARD_BITS: u8 = 8;

/// Derives a 64-bit fingerprint from a key
///
/// Implementations must be deterministic: identical byte sequences must
/// always produce identical fingerprints, across processes and restarts.
/// There are no other requirements; collisions are tolerated by the index.
pub trait Fingerprinter: Send + Sync {
    /// Name that is persisted in the manifest.
    ///
    /// Reopening an index with a different fingerprint function is rejected.
    fn name(&self) -> &'static str;

    /// Hashes a key.
    fn fingerprint(&self, key: &[u8]) -> u64;
}

/// XXH3 (64-bit), the default fingerprint function
#[derive(Copy, Clone, Debug, Default)]
pub struct Xxh3;

impl Fingerprinter for Xxh3 {
    fn name(&self) -> &'static str {
        "xxh3"
    }

    fn fingerprint(&self, key: &[u8]) -> u64 {
        xxhash_rust::xxh3::xxh3_64(key)
    }
}

/// 64-bit FNV-1
#[derive(Copy, Clone, Debug, Default)]
pub struct Fnv1;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

impl Fingerprinter for Fnv1 {
    fn name(&self) -> &'static str {
        "fnv1"
    }

    fn fingerprint(&self, key: &[u8]) -> u64 {
        key.iter().fold(FNV_OFFSET_BASIS, |hash, &byte| {
            hash.wrapping_mul(FNV_PRIME) ^ u64::from(byte)
        })
    }
}

/// Splits a fingerprint into its shard id and shard-local key.
///
/// The shard id is taken from the top `shard_bits` bits, the shard-local key
/// is the low 56 bits. Both build and lookup must go through this function.
#[must_use]
pub fn route(fingerprint: u64, shard_bits: u8) -> (usize, LocalKey) {
    debug_assert!(shard_bits <= MAX_SHARD_BITS);

    #[expect(
        clippy::cast_possible_truncation,
        reason = "shard id has at most 8 bits"
    )]
    let shard = fingerprint
        .checked_shr(64 - u32::from(shard_bits))
        .unwrap_or_default() as usize;

    (shard, LocalKey::from_fingerprint(fingerprint))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn fnv1_reference_values() {
        // Reference values of the 64-bit FNV-1 test suite
        assert_eq!(0xcbf2_9ce4_8422_2325, Fnv1.fingerprint(b""));
        assert_eq!(0xaf63_bd4c_8601_b7be, Fnv1.fingerprint(b"a"));
        assert_eq!(0x340d_8765_a4dd_a9c2, Fnv1.fingerprint(b"foobar"));
    }

    #[test]
    fn xxh3_deterministic() {
        assert_eq!(Xxh3.fingerprint(b"helloworld"), Xxh3.fingerprint(b"helloworld"));
        assert_ne!(Xxh3.fingerprint(b"helloworld"), Xxh3.fingerprint(b"helloworle"));
        assert_eq!(xxhash_rust::xxh3::xxh3_64(b"abc"), Xxh3.fingerprint(b"abc"));
    }

    #[test]
    fn route_uses_top_byte_as_shard() {
        let fingerprint = 28_572_051_027_328_338_u64;
        let (shard, key) = route(fingerprint, 8);

        let le = fingerprint.to_le_bytes();
        assert_eq!(usize::from(le[7]), shard);
        assert_eq!(&le[..7], key.as_bytes());
        assert_eq!(fingerprint << 8 >> 8, key.as_u64());
    }

    #[test]
    fn route_shard_bits() {
        let fingerprint = 0xF300_0000_0000_0065_u64;

        assert_eq!(0xF3, route(fingerprint, 8).0);
        assert_eq!(0xF, route(fingerprint, 4).0);
        assert_eq!(1, route(fingerprint, 1).0);
        assert_eq!(0, route(fingerprint, 0).0);

        assert_eq!(0x65, route(fingerprint, 0).1.as_u64());
        assert_eq!(127, route((127 << 56) | 101, 8).0);
    }
}
