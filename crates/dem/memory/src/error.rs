use dem_types::{BankId, EventId, SlotIndex};
use serde::Serialize;
use thiserror::Error;

/// Engine part that detected a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    Directory,
    Chronology,
    Allocation,
    Restoration,
    OriginTranslation,
    Records,
}

/// Consistency faults and caller misuse detected by the engine.
///
/// Faults are handed to the [`FaultReporter`](crate::FaultReporter) and
/// repaired locally; they never cross the engine's public API as errors.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "fault", content = "detail")]
pub enum MemoryFault {
    #[error("bank {0} is not configured")]
    UnknownBank(BankId),

    #[error("origin {0:#06x} does not map to a configured bank")]
    UnknownOrigin(u16),

    #[error("event {0} is not configured")]
    UnconfiguredEvent(EventId),

    #[error("event {event} is not routed to bank {bank}")]
    EventNotRouted { bank: BankId, event: EventId },

    #[error("requested size {requested} for bank {bank} exceeds capacity {max}")]
    SizeOutOfRange {
        bank: BankId,
        requested: usize,
        max: usize,
    },

    #[error("{slot} is outside bank {bank}")]
    SlotOutOfRange { bank: BankId, slot: SlotIndex },

    #[error("{slot} in bank {bank} is not occupied")]
    SlotNotOccupied { bank: BankId, slot: SlotIndex },

    #[error("{slot} missing from chronology of bank {bank}")]
    ChronologyMiss { bank: BankId, slot: SlotIndex },

    #[error("chronology of bank {bank} is full ({max} positions)")]
    ChronologyFull { bank: BankId, max: usize },

    #[error("bank {bank} reports size {current_size} but has no free slot")]
    NoFreeSlot { bank: BankId, current_size: usize },

    #[error("no entry for event {event} in bank {bank}")]
    EntryNotFound { bank: BankId, event: EventId },

    #[error("{slot} references unknown event {event}")]
    UnknownEvent { slot: SlotIndex, event: EventId },

    #[error("event {event} in {slot} is not routed to bank {bank}")]
    WrongBank {
        bank: BankId,
        slot: SlotIndex,
        event: EventId,
    },

    #[error("event {event} in {slot} is not the master of its group (master {master})")]
    NotGroupMaster {
        slot: SlotIndex,
        event: EventId,
        master: EventId,
    },

    #[error("event {event} occupies {kept} and {dropped}; keeping {kept}")]
    DuplicateEntry {
        event: EventId,
        kept: SlotIndex,
        dropped: SlotIndex,
    },

    #[error("image holds {actual} entries, store expects {expected}")]
    ImageSizeMismatch { expected: usize, actual: usize },

    #[error("configured snapshot numbering in bank {bank} requires a record number")]
    RecordNumberMissing { bank: BankId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_messages_name_the_parts() {
        let slot = SlotIndex::new(4, 8).unwrap();
        let fault = MemoryFault::DuplicateEntry {
            event: EventId(9),
            kept: slot,
            dropped: SlotIndex::new(2, 8).unwrap(),
        };
        assert_eq!(
            fault.to_string(),
            "event evt:9 occupies slot:4 and slot:2; keeping slot:4"
        );
        assert_eq!(
            MemoryFault::UnknownOrigin(0x0205).to_string(),
            "origin 0x0205 does not map to a configured bank"
        );
    }
}
