// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::start_slot;
use crate::slot::{Slot, EMPTY_SLOT, SLOT_LEN};
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Returns the number of slots a table holding `item_count` items gets.
///
/// The table is sized to the smallest power of two that is at least three
/// times the item count, keeping the load factor at or below 1/3.
#[must_use]
pub fn slot_count_for(item_count: u64) -> u64 {
    item_count.saturating_mul(3).max(1).next_power_of_two()
}

/// Builds a closed hash table in memory
///
/// Slots are placed with linear probing in insertion order;
/// nothing is ever moved or deduplicated once placed.
#[derive(Debug)]
pub struct Generator {
    slots: Vec<[u8; SLOT_LEN]>,
    item_count: u64,
}

impl Generator {
    /// Initializes a new generator sized for the given number of items.
    #[must_use]
    pub fn with_item_count(item_count: u64) -> Self {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "the slot array is materialized in memory anyway"
        )]
        let slot_count = slot_count_for(item_count) as usize;

        Self {
            slots: vec![EMPTY_SLOT; slot_count],
            item_count: 0,
        }
    }

    /// Returns the number of slots.
    #[must_use]
    pub fn slot_count(&self) -> u64 {
        self.slots.len() as u64
    }

    /// Returns the number of items inserted so far.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Places a slot at the first free position of its probe sequence.
    ///
    /// Returns `false` if the table is completely full.
    pub fn insert(&mut self, slot: Slot) -> bool {
        let slot_count = self.slot_count();
        let mut pos = start_slot(&slot.key(), slot_count);

        for _ in 0..slot_count {
            #[expect(
                clippy::indexing_slicing,
                clippy::cast_possible_truncation,
                reason = "start_slot masks by slot count"
            )]
            let entry = &mut self.slots[pos as usize];

            if *entry == EMPTY_SLOT {
                *entry = slot.encode();
                self.item_count += 1;
                return true;
            }

            pos = (pos + 1) & (slot_count - 1);
        }

        false
    }

    /// Writes the header and the slot array.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn write<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u64::<LittleEndian>(self.slot_count())?;
        writer.write_all(self.slots.as_flattened())?;
        Ok(())
    }
}

/// Generates a hash table from a counted stream of slots.
///
/// Exactly `item_count` slots are consumed from `items`, in order.
/// Returns the slot count of the written table.
///
/// # Errors
///
/// Will return `Err` if the stream yields an error or ends early,
/// or if an IO error occurs while writing.
pub fn generate<I, W>(item_count: u64, items: I, writer: &mut W) -> crate::Result<u64>
where
    I: IntoIterator<Item = crate::Result<Slot>>,
    W: Write,
{
    let mut generator = Generator::with_item_count(item_count);
    let mut items = items.into_iter();

    for _ in 0..item_count {
        let Some(slot) = items.next() else {
            return Err(crate::Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "slot stream ended before item count was reached",
            )));
        };

        let inserted = generator.insert(slot?);
        debug_assert!(inserted, "table sized for item count should never fill up");
    }

    let slot_count = generator.slot_count();
    generator.write(writer)?;

    Ok(slot_count)
}
