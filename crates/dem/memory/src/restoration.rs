use dem_types::{BankId, EventEntry, EventId, SlotIndex, StorageTrigger};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::collaborators::{BlockId, Urgency};
use crate::engine::MemoryEngine;
use crate::error::{Component, MemoryFault};
use crate::status::restore_status;

/// Outcome of restoring one bank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BankRestoreReport {
    pub bank: BankId,
    /// Entries kept and listed in the chronology.
    pub restored: usize,
    pub cleared_corrupt: usize,
    pub dropped_duplicates: usize,
    /// Root-cause events that received status from a combined entry.
    pub root_causes: usize,
    /// Newest timestamp among the kept entries; 0 for an empty bank.
    pub max_timestamp: u32,
}

impl BankRestoreReport {
    fn empty(bank: BankId) -> Self {
        Self {
            bank,
            restored: 0,
            cleared_corrupt: 0,
            dropped_duplicates: 0,
            root_causes: 0,
            max_timestamp: 0,
        }
    }

    pub fn repairs(&self) -> usize {
        self.cleared_corrupt + self.dropped_duplicates
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RestorationReport {
    pub banks: Vec<BankRestoreReport>,
    pub next_timestamp: u32,
}

impl RestorationReport {
    /// True when no entry had to be repaired.
    pub fn is_clean(&self) -> bool {
        self.banks.iter().all(|bank| bank.repairs() == 0)
    }
}

impl MemoryEngine {
    /// Restore every configured bank, in configuration order.
    pub fn restore_all(&mut self) -> RestorationReport {
        let banks: Vec<BankId> = self.directory.bank_ids().collect();
        let banks = banks.into_iter().map(|bank| self.restore_bank(bank)).collect();
        RestorationReport {
            banks,
            next_timestamp: self.directory.timestamp(),
        }
    }

    /// Rebuild size and chronology of `bank` from the loaded entry store.
    ///
    /// Entries owned by unknown, unrouted or non-master events are cleared.
    /// When two entries claim the same event the newer one is kept; equal
    /// timestamps keep the lower slot. Every repaired slot is marked for an
    /// immediate rewrite. Status of every kept event is re-derived from its
    /// counters and pushed to the status core.
    pub fn restore_bank(&mut self, bank: BankId) -> BankRestoreReport {
        let mut report = BankRestoreReport::empty(bank);
        let (Some(range), Some(trigger)) = (
            self.directory.range(bank),
            self.config.bank(bank).map(|config| config.trigger),
        ) else {
            self.report(Component::Restoration, MemoryFault::UnknownBank(bank));
            return report;
        };

        self.set_size(bank, 0);
        self.chronology.reset(bank);

        let slots: Vec<SlotIndex> = range.filter_map(|raw| self.store.slot(raw)).collect();
        for slot in slots {
            let Some(entry) = self.store.get(slot).cloned() else {
                continue;
            };
            let Some(event) = entry.event_id else {
                continue;
            };

            if let Some(fault) = self.corruption(bank, slot, event) {
                warn!(bank = %bank, slot = %slot, event = %event, "Corrupt entry cleared");
                self.discard(slot, fault);
                report.cleared_corrupt += 1;
                continue;
            }

            if let Some(other) = self.find(bank, event, false) {
                report.dropped_duplicates += 1;
                // `other` sits at a lower physical slot, so it wins ties.
                if entry.timestamp <= self.store.timestamp(other) {
                    warn!(
                        bank = %bank,
                        kept = %other,
                        dropped = %slot,
                        event = %event,
                        "Duplicate entry dropped"
                    );
                    self.discard(
                        slot,
                        MemoryFault::DuplicateEntry {
                            event,
                            kept: other,
                            dropped: slot,
                        },
                    );
                    continue;
                }
                warn!(
                    bank = %bank,
                    kept = %slot,
                    dropped = %other,
                    event = %event,
                    "Duplicate entry dropped"
                );
                self.drop_restored(bank, other);
                self.discard(
                    other,
                    MemoryFault::DuplicateEntry {
                        event,
                        kept: slot,
                        dropped: other,
                    },
                );
            }

            report.max_timestamp = report.max_timestamp.max(entry.timestamp);
            let size = self.directory.current_size(bank);
            match self.chronology.sort_insert(bank, size, slot, &self.store) {
                Ok(()) => self.set_size(bank, size + 1),
                Err(fault) => self.report(Component::Chronology, fault),
            }
            debug!(
                bank = %bank,
                slot = %slot,
                event = %event,
                timestamp = entry.timestamp,
                "Entry restored"
            );
        }

        report.restored = self.directory.current_size(bank);
        // Duplicates are settled only once the scan is over.
        for slot in self.chronological_slots(bank) {
            let Some(entry) = self.store.get(slot) else {
                continue;
            };
            let Some(event) = entry.event_id else {
                continue;
            };
            if self.restore_event_status(event, entry, trigger) {
                report.root_causes += 1;
            }
        }
        let next = report.max_timestamp.saturating_add(1);
        if next > self.directory.timestamp() {
            self.directory.set_timestamp(next);
        }
        if report.repairs() > 0 {
            self.mark(BlockId::Admin, Urgency::Immediate);
        }
        info!(
            bank = %bank,
            restored = report.restored,
            cleared_corrupt = report.cleared_corrupt,
            dropped_duplicates = report.dropped_duplicates,
            next_timestamp = self.directory.timestamp(),
            "Bank restored"
        );
        report
    }

    /// Why the entry in `slot` cannot belong to `bank`, if it cannot.
    fn corruption(&self, bank: BankId, slot: SlotIndex, event: EventId) -> Option<MemoryFault> {
        let Some(master) = self.config.master_of(event) else {
            return Some(MemoryFault::UnknownEvent { slot, event });
        };
        if master != event {
            return Some(MemoryFault::NotGroupMaster { slot, event, master });
        }
        if !self.config.group_routes_to(event, bank) {
            return Some(MemoryFault::WrongBank { bank, slot, event });
        }
        None
    }

    /// Clear a slot found broken during restoration and schedule its rewrite.
    fn discard(&mut self, slot: SlotIndex, fault: MemoryFault) {
        if let Some(entry) = self.store.get_mut(slot) {
            entry.clear();
        }
        self.mark(BlockId::Entry(slot), Urgency::Immediate);
        self.report(Component::Restoration, fault);
    }

    /// Take an already restored slot back out of the chronology.
    fn drop_restored(&mut self, bank: BankId, slot: SlotIndex) {
        let size = self.directory.current_size(bank);
        match self.chronology.remove(bank, size, slot) {
            Ok(()) => self.set_size(bank, size.saturating_sub(1)),
            Err(fault) => self.report(Component::Chronology, fault),
        }
    }

    /// Push re-derived status for `event` and, for combined entries, for the
    /// recorded root-cause event. Returns whether a root cause was restored.
    fn restore_event_status(
        &self,
        event: EventId,
        entry: &EventEntry,
        trigger: StorageTrigger,
    ) -> bool {
        let Some(targets) = self.config.event(event).map(|config| config.targets()) else {
            return false;
        };
        let restored = restore_status(entry, trigger, &targets);
        self.core.restore_event(event, &restored);

        let members = self.config.members_of(event);
        if members.len() < 2 {
            return false;
        }
        match entry.root_cause_event() {
            Some(root) if root == event => false,
            Some(root) if members.contains(&root) => {
                self.core.restore_event(root, &restored.root_cause_projection());
                true
            }
            Some(root) => {
                warn!(
                    event = %event,
                    root_cause = %root,
                    "Root cause is not a member of the group"
                );
                false
            }
            None => {
                debug!(event = %event, "Combined entry carries no root cause");
                false
            }
        }
    }
}
