use std::collections::{HashMap, HashSet};

use dem_types::{BankId, EventId, SlotIndex};
use serde::Serialize;
use thiserror::Error;

use crate::engine::MemoryEngine;

/// A broken structural invariant found by [`MemoryEngine::verify`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "violation", content = "detail")]
pub enum InvariantViolation {
    #[error("bank {bank} size {size} exceeds capacity {max}")]
    SizeExceedsCapacity { bank: BankId, size: usize, max: usize },

    #[error("bank {bank} has no chronology entry at position {position}")]
    ChronologyGap { bank: BankId, position: usize },

    #[error("chronology of bank {bank} lists {slot}, which is free or outside the bank")]
    ChronologyForeignSlot { bank: BankId, slot: SlotIndex },

    #[error("chronology of bank {bank} lists {slot} more than once")]
    ChronologyDuplicate { bank: BankId, slot: SlotIndex },

    #[error("occupied {slot} of bank {bank} is missing from its chronology")]
    UnlistedEntry { bank: BankId, slot: SlotIndex },

    #[error("chronology of bank {bank} is out of timestamp order at position {position}")]
    OutOfOrder { bank: BankId, position: usize },

    #[error("event {event} owns more than one entry in bank {bank}")]
    DuplicateOwner { bank: BankId, event: EventId },

    #[error("{slot} carries timestamp {timestamp}, not older than the next timestamp {next}")]
    StaleTimestamp { slot: SlotIndex, timestamp: u32, next: u32 },
}

impl MemoryEngine {
    /// Check the bookkeeping of every bank against the entry store.
    ///
    /// An empty result means every chronology lists exactly the occupied
    /// slots of its bank in timestamp order and no event owns two entries.
    pub fn verify(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();
        let next = self.directory.timestamp();

        for bank in self.directory.bank_ids() {
            let size = self.directory.current_size(bank);
            let max = self.directory.max_size(bank);
            if size > max {
                violations.push(InvariantViolation::SizeExceedsCapacity { bank, size, max });
            }
            let Some(range) = self.directory.range(bank) else {
                continue;
            };

            let mut listed = HashSet::new();
            let mut previous: Option<u32> = None;
            for position in 0..size.min(max) {
                let Some(slot) = self.chronology.get(bank, position) else {
                    violations.push(InvariantViolation::ChronologyGap { bank, position });
                    continue;
                };
                let occupied = self.store.get(slot).filter(|entry| !entry.is_free());
                let Some(entry) = occupied.filter(|_| range.contains(&slot.get())) else {
                    violations.push(InvariantViolation::ChronologyForeignSlot { bank, slot });
                    continue;
                };
                if !listed.insert(slot) {
                    violations.push(InvariantViolation::ChronologyDuplicate { bank, slot });
                }
                if previous.is_some_and(|older| older > entry.timestamp) {
                    violations.push(InvariantViolation::OutOfOrder { bank, position });
                }
                previous = Some(entry.timestamp);
            }

            let mut owners: HashMap<EventId, usize> = HashMap::new();
            for slot in range.clone().filter_map(|raw| self.store.slot(raw)) {
                let Some(entry) = self.store.get(slot) else {
                    continue;
                };
                let Some(event) = entry.event_id else {
                    continue;
                };
                if !listed.contains(&slot) {
                    violations.push(InvariantViolation::UnlistedEntry { bank, slot });
                }
                let count = owners.entry(event).or_default();
                *count += 1;
                if *count == 2 {
                    violations.push(InvariantViolation::DuplicateOwner { bank, event });
                }
                if entry.timestamp >= next {
                    violations.push(InvariantViolation::StaleTimestamp {
                        slot,
                        timestamp: entry.timestamp,
                        next,
                    });
                }
            }
        }
        violations
    }
}
