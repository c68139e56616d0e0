// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Fixed-width slot encoding
//!
//! ```text
//! +--------------------------+------------------------+
//! | shard-local key (7B, LE) | record offset (5B, LE) |
//! +--------------------------+------------------------+
//! ```

/// Length of a shard-local key in bytes
pub const KEY_LEN: usize = 7;

/// Length of an encoded record offset in bytes
pub const VALUE_LEN: usize = 5;

/// Length of a slot in bytes
pub const SLOT_LEN: usize = KEY_LEN + VALUE_LEN;

/// Largest record offset a slot can hold (40 bits)
pub const MAX_OFFSET: u64 = (1 << (8 * VALUE_LEN)) - 1;

/// Marks a slot that was never occupied
pub const EMPTY_SLOT: [u8; SLOT_LEN] = [0, 0, 0, 0, 0, 0, 0, 0x0F, 0x0F, 0x0F, 0x0F, 0x0F];

/// The low 56 bits of a fingerprint, stored as the search key inside a shard
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct LocalKey([u8; KEY_LEN]);

impl LocalKey {
    /// Truncates a fingerprint to its low 7 bytes (little endian).
    #[must_use]
    pub fn from_fingerprint(fingerprint: u64) -> Self {
        let [b0, b1, b2, b3, b4, b5, b6, _] = fingerprint.to_le_bytes();
        Self([b0, b1, b2, b3, b4, b5, b6])
    }

    /// Wraps raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Interprets the key as a little-endian integer.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        let [b0, b1, b2, b3, b4, b5, b6] = self.0;
        u64::from_le_bytes([b0, b1, b2, b3, b4, b5, b6, 0])
    }
}

/// A (shard-local key, record offset) pair
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Slot {
    key: LocalKey,
    offset: u64,
}

impl Slot {
    /// Returns the shard-local key.
    #[must_use]
    pub fn key(&self) -> LocalKey {
        self.key
    }

    /// Returns the offset of the record in the data log.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Creates a new slot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OffsetOverflow`] if the offset does not fit into 40 bits,
    /// and [`crate::Error::ReservedSlot`] if the pair encodes to [`EMPTY_SLOT`].
    pub fn new(key: LocalKey, offset: u64) -> crate::Result<Self> {
        if offset > MAX_OFFSET {
            return Err(crate::Error::OffsetOverflow(offset));
        }

        let slot = Self { key, offset };

        if slot.encode() == EMPTY_SLOT {
            return Err(crate::Error::ReservedSlot);
        }

        Ok(slot)
    }

    /// Encodes the slot into its on-disk representation.
    #[must_use]
    pub fn encode(&self) -> [u8; SLOT_LEN] {
        let [k0, k1, k2, k3, k4, k5, k6] = self.key.0;
        let [v0, v1, v2, v3, v4, ..] = self.offset.to_le_bytes();
        [k0, k1, k2, k3, k4, k5, k6, v0, v1, v2, v3, v4]
    }

    /// Decodes an on-disk slot, returning `None` for the empty marker.
    #[must_use]
    pub fn decode(bytes: [u8; SLOT_LEN]) -> Option<Self> {
        if bytes == EMPTY_SLOT {
            return None;
        }

        let [k0, k1, k2, k3, k4, k5, k6, v0, v1, v2, v3, v4] = bytes;

        Some(Self {
            key: LocalKey([k0, k1, k2, k3, k4, k5, k6]),
            offset: u64::from_le_bytes([v0, v1, v2, v3, v4, 0, 0, 0]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn local_key_little_endian() {
        let fingerprint = 28_572_051_027_328_338_u64;
        let key = LocalKey::from_fingerprint(fingerprint);

        assert_eq!(&fingerprint.to_le_bytes()[..KEY_LEN], key.as_bytes());
        assert_eq!(fingerprint << 8 >> 8, key.as_u64());
    }

    #[test]
    fn slot_offset_is_40_bits() -> crate::Result<()> {
        let key = LocalKey::from_fingerprint(0xAB);

        let slot = Slot::new(key, MAX_OFFSET)?;
        let bytes = slot.encode();
        assert_eq!([0xAB, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF], bytes);
        assert_eq!(Some(slot), Slot::decode(bytes));

        assert!(matches!(
            Slot::new(key, MAX_OFFSET + 1),
            Err(crate::Error::OffsetOverflow(_)),
        ));

        Ok(())
    }

    #[test]
    fn slot_zero_is_not_empty() -> crate::Result<()> {
        let slot = Slot::new(LocalKey::default(), 0)?;
        assert_eq!([0; SLOT_LEN], slot.encode());
        assert_eq!(Some(slot), Slot::decode(slot.encode()));
        Ok(())
    }

    #[test]
    fn slot_reserved_pattern() {
        assert!(Slot::decode(EMPTY_SLOT).is_none());

        assert!(matches!(
            Slot::new(LocalKey::default(), 0x0F_0F0F_0F0F),
            Err(crate::Error::ReservedSlot),
        ));

        // Same offset, different key is fine
        assert!(Slot::new(LocalKey::from_fingerprint(1), 0x0F_0F0F_0F0F).is_ok());
    }
}
