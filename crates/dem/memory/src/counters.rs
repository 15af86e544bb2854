use dem_types::{BankId, PreConfirmedStatus, SlotIndex};
use serde::Serialize;
use tracing::debug;

use crate::collaborators::{BlockId, Urgency};
use crate::engine::MemoryEngine;
use crate::error::Component;

/// Aging state of an entry after a passed operation cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum AgingProgress {
    Counting { counter: u16, target: u16 },
    Aged,
}

impl MemoryEngine {
    /// Count a failed operation cycle against the entry in `slot`.
    ///
    /// Both counters saturate. Any aging in progress is abandoned.
    pub fn record_failed_cycle(&mut self, bank: BankId, slot: SlotIndex) -> bool {
        if self.occupant(Component::Allocation, bank, slot).is_none() {
            return false;
        }
        let Some(entry) = self.store.get_mut(slot) else {
            return false;
        };
        entry.occurrence_counter = entry.occurrence_counter.saturating_add(1);
        entry.consecutive_failed_cycle_counter =
            entry.consecutive_failed_cycle_counter.saturating_add(1);
        entry.pre_confirmed_status.remove(
            PreConfirmedStatus::AGING_ACTIVE
                .with(PreConfirmedStatus::AGED)
                .with(PreConfirmedStatus::AGING_ONLY),
        );
        entry.aging_counter = 0;
        self.mark(BlockId::Entry(slot), Urgency::Deferred);
        true
    }

    /// Count a passed operation cycle: the consecutive-failed counter resets
    /// and aging starts or advances towards the event's aging target.
    pub fn record_passed_cycle(&mut self, bank: BankId, slot: SlotIndex) -> Option<AgingProgress> {
        let event = self.occupant(Component::Allocation, bank, slot)?;
        let target = self.config.event(event)?.aging_target;
        let entry = self.store.get_mut(slot)?;
        entry.consecutive_failed_cycle_counter = 0;

        let progress = if entry.pre_confirmed_status.contains(PreConfirmedStatus::AGED) {
            AgingProgress::Aged
        } else {
            entry.pre_confirmed_status.insert(PreConfirmedStatus::AGING_ACTIVE);
            entry.aging_counter = entry.aging_counter.saturating_add(1);
            if entry.aging_counter >= target {
                entry.pre_confirmed_status.remove(PreConfirmedStatus::AGING_ACTIVE);
                entry.pre_confirmed_status.insert(PreConfirmedStatus::AGED);
                debug!(bank = %bank, slot = %slot, event = %event, "Entry aged");
                AgingProgress::Aged
            } else {
                AgingProgress::Counting {
                    counter: entry.aging_counter,
                    target,
                }
            }
        };
        self.mark(BlockId::Entry(slot), Urgency::Deferred);
        Some(progress)
    }
}
