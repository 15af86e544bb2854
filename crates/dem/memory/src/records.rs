use dem_types::{BankId, DataElement, DataRecord, SlotIndex, SnapshotNumbering};
use tracing::debug;

use crate::collaborators::{BlockId, Urgency};
use crate::engine::MemoryEngine;
use crate::error::{Component, MemoryFault};

impl MemoryEngine {
    /// Store a snapshot record in the entry at `slot` and return its number.
    ///
    /// With calculated numbering `number` is ignored: records are numbered
    /// 1 up to the bank's maximum, after which the newest record is
    /// overwritten. Configured numbering requires `number`; an existing record
    /// with that number is replaced, otherwise a new one is appended while
    /// below the maximum.
    pub fn store_snapshot(
        &mut self,
        bank: BankId,
        slot: SlotIndex,
        number: Option<u8>,
        elements: Vec<DataElement>,
    ) -> Option<u8> {
        self.occupant(Component::Records, bank, slot)?;
        let bank_config = self.config.bank(bank)?;
        let numbering = bank_config.snapshot_numbering;
        let max = usize::from(bank_config.max_snapshot_records);
        if numbering == SnapshotNumbering::Configured && number.is_none() {
            self.report(Component::Records, MemoryFault::RecordNumberMissing { bank });
            return None;
        }

        let records = &mut self.store.get_mut(slot)?.snapshots;
        let stored = match (numbering, number) {
            (SnapshotNumbering::Calculated, _) => {
                if records.len() < max {
                    let next = u8::try_from(records.len() + 1).ok()?;
                    records.push(DataRecord {
                        number: next,
                        elements,
                    });
                    Some(next)
                } else if let Some(newest) = records.last_mut() {
                    newest.elements = elements;
                    Some(newest.number)
                } else {
                    None
                }
            }
            (SnapshotNumbering::Configured, Some(number)) => upsert(records, number, elements, max),
            (SnapshotNumbering::Configured, None) => None,
        };
        match stored {
            Some(number) => {
                self.mark(BlockId::Entry(slot), Urgency::Deferred);
                debug!(bank = %bank, slot = %slot, record = number, "Snapshot stored");
            }
            None => debug!(bank = %bank, slot = %slot, "No room for snapshot"),
        }
        stored
    }

    /// Store or replace extended data record `number`.
    pub fn store_extended(
        &mut self,
        bank: BankId,
        slot: SlotIndex,
        number: u8,
        elements: Vec<DataElement>,
    ) -> bool {
        if self.occupant(Component::Records, bank, slot).is_none() {
            return false;
        }
        let Some(entry) = self.store.get_mut(slot) else {
            return false;
        };
        upsert(&mut entry.extended, number, elements, usize::MAX);
        self.mark(BlockId::Entry(slot), Urgency::Deferred);
        true
    }
}

fn upsert(
    records: &mut Vec<DataRecord>,
    number: u8,
    elements: Vec<DataElement>,
    max: usize,
) -> Option<u8> {
    if let Some(record) = records.iter_mut().find(|r| r.number == number) {
        record.elements = elements;
        return Some(number);
    }
    if records.len() >= max {
        return None;
    }
    records.push(DataRecord { number, elements });
    Some(number)
}

#[cfg(test)]
mod tests {
    use dem_types::{BankConfig, BankKind, EventConfig, EventId, MemoryConfig};

    use crate::collaborators::{InMemoryCore, RecordingFaults, RecordingPersistence};
    use crate::engine::Collaborators;

    use super::*;

    fn engine(faults: RecordingFaults) -> MemoryEngine {
        let config = MemoryConfig::default()
            .with_bank(
                BankConfig::new(BankId(0), BankKind::Primary, 2)
                    .with_snapshot_numbering(SnapshotNumbering::Calculated, 2),
            )
            .with_bank(
                BankConfig::new(BankId(1), BankKind::UserDefined(0), 2)
                    .with_snapshot_numbering(SnapshotNumbering::Configured, 2),
            )
            .with_event(EventConfig::new(EventId(1), BankId(0)).also_in(BankId(1)));
        MemoryEngine::new(
            config,
            Collaborators::new(RecordingPersistence::new(), InMemoryCore::new(), faults),
        )
        .unwrap()
    }

    fn data(byte: u8) -> Vec<DataElement> {
        vec![DataElement::opaque(0x0100, vec![byte])]
    }

    #[test]
    fn calculated_numbering_overwrites_newest_when_full() {
        let mut engine = engine(RecordingFaults::new());
        let slot = engine.allocate(BankId(0), EventId(1)).unwrap();
        assert_eq!(engine.store_snapshot(BankId(0), slot, Some(9), data(1)), Some(1));
        assert_eq!(engine.store_snapshot(BankId(0), slot, None, data(2)), Some(2));
        assert_eq!(engine.store_snapshot(BankId(0), slot, None, data(3)), Some(2));
        let snapshots = &engine.entry(slot).unwrap().snapshots;
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].elements, data(3));
    }

    #[test]
    fn configured_numbering_requires_a_number() {
        let faults = RecordingFaults::new();
        let mut engine = engine(faults.clone());
        let slot = engine.allocate(BankId(1), EventId(1)).unwrap();
        assert_eq!(engine.store_snapshot(BankId(1), slot, None, data(1)), None);
        assert_eq!(
            faults.faults()[0].1,
            MemoryFault::RecordNumberMissing { bank: BankId(1) }
        );

        assert_eq!(engine.store_snapshot(BankId(1), slot, Some(0x10), data(1)), Some(0x10));
        assert_eq!(engine.store_snapshot(BankId(1), slot, Some(0x20), data(2)), Some(0x20));
        assert_eq!(engine.store_snapshot(BankId(1), slot, Some(0x10), data(3)), Some(0x10));
        assert_eq!(engine.store_snapshot(BankId(1), slot, Some(0x30), data(4)), None);
        assert_eq!(engine.entry(slot).unwrap().snapshots[0].elements, data(3));
    }

    #[test]
    fn extended_records_replace_by_number() {
        let mut engine = engine(RecordingFaults::new());
        let slot = engine.allocate(BankId(0), EventId(1)).unwrap();
        assert!(engine.store_extended(BankId(0), slot, 0x90, data(1)));
        assert!(engine.store_extended(BankId(0), slot, 0x90, data(2)));
        let extended = &engine.entry(slot).unwrap().extended;
        assert_eq!(extended.len(), 1);
        assert_eq!(extended[0].elements, data(2));

        let free = engine.slot(1).unwrap();
        assert!(!engine.store_extended(BankId(0), free, 0x90, data(1)));
    }
}
