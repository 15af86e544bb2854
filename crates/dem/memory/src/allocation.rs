use dem_types::{
    BankId, DisplacementCandidate, DisplacementRequest, EventEntry, EventId, PreConfirmedStatus,
    SlotIndex,
};
use tracing::{debug, warn};

use crate::collaborators::{BlockId, Urgency};
use crate::displacement::select_victim;
use crate::engine::MemoryEngine;
use crate::error::{Component, MemoryFault};

impl MemoryEngine {
    /// Claim an entry for `event` in `bank`, displacing another event's entry
    /// when the bank is full.
    ///
    /// Combined events are stored under their group master. If the event
    /// already owns an entry that slot is returned unchanged. `None` means the
    /// event is not stored this cycle.
    pub fn allocate(&mut self, bank: BankId, event: EventId) -> Option<SlotIndex> {
        let master = self.checked_master(bank, event)?;
        if let Some(existing) = self.find(bank, master, false) {
            debug!(bank = %bank, event = %master, slot = %existing, "Event already stored");
            return Some(existing);
        }
        if let Some(slot) = self.claim_free_slot(bank, master) {
            return Some(slot);
        }

        if !self.directory.overflow(bank) {
            self.directory.set_overflow(bank);
            self.mark(BlockId::Admin, Urgency::Deferred);
        }
        let Some(victim) = self.nominate_victim(bank, master) else {
            debug!(bank = %bank, event = %master, "Bank full and no entry displaceable");
            return None;
        };
        self.displace(bank, victim, master);
        self.claim_free_slot(bank, master)
    }

    /// Claim an entry that only tracks aging. Never displaces.
    pub fn allocate_for_aging(&mut self, bank: BankId, event: EventId) -> Option<SlotIndex> {
        let master = self.checked_master(bank, event)?;
        if let Some(existing) = self.find(bank, master, false) {
            return Some(existing);
        }
        let slot = self.claim_free_slot(bank, master)?;
        if let Some(entry) = self.store.get_mut(slot) {
            entry.pre_confirmed_status =
                PreConfirmedStatus::AGING_ONLY.with(PreConfirmedStatus::AGING_ACTIVE);
        }
        Some(slot)
    }

    /// Release the entry in `slot` and return its former owner.
    ///
    /// When the bank has an associated custom-trigger bank, the owner's entry
    /// there is released as well.
    pub fn free(&mut self, bank: BankId, slot: SlotIndex) -> Option<EventId> {
        let event = self.occupant(Component::Allocation, bank, slot)?;
        self.release_slot(bank, slot);
        debug!(bank = %bank, slot = %slot, event = %event, "Entry freed");

        let linked = self.config.bank(bank).and_then(|config| config.custom_trigger_bank);
        if let Some(linked) = linked {
            if let Some(linked_slot) = self.find(linked, event, false) {
                self.release_slot(linked, linked_slot);
                debug!(
                    bank = %linked,
                    slot = %linked_slot,
                    event = %event,
                    "Custom-trigger entry freed"
                );
            }
        }
        Some(event)
    }

    /// Restamp `slot` and move it to the newest chronology position.
    pub fn touch(&mut self, bank: BankId, slot: SlotIndex) -> bool {
        if self.occupant(Component::Allocation, bank, slot).is_none() {
            return false;
        }
        let timestamp = self.directory.advance_timestamp();
        if let Some(entry) = self.store.get_mut(slot) {
            entry.timestamp = timestamp;
        }
        let size = self.directory.current_size(bank);
        if let Err(fault) = self.chronology.touch(bank, size, slot) {
            self.report(Component::Chronology, fault);
            self.rebuild_chronology(bank);
        }
        self.mark(BlockId::Entry(slot), Urgency::Deferred);
        self.mark(BlockId::Admin, Urgency::Deferred);
        true
    }

    /// Slot owned by `event` (or its group master) in `bank`.
    ///
    /// With `must_exist` a miss is reported as a consistency fault.
    pub fn find(&self, bank: BankId, event: EventId, must_exist: bool) -> Option<SlotIndex> {
        let master = self.config.master_of(event).unwrap_or(event);
        let size = self.directory.current_size(bank);
        let found = self
            .chronology
            .slots(bank, size)
            .into_iter()
            .find(|slot| {
                self.store
                    .get(*slot)
                    .is_some_and(|entry| entry.event_id == Some(master))
            });
        if found.is_none() && must_exist {
            self.report(Component::Allocation, MemoryFault::EntryNotFound { bank, event });
        }
        found
    }

    fn checked_master(&self, bank: BankId, event: EventId) -> Option<EventId> {
        if !self.directory.contains(bank) {
            self.report(Component::Allocation, MemoryFault::UnknownBank(bank));
            return None;
        }
        let Some(master) = self.config.master_of(event) else {
            self.report(Component::Allocation, MemoryFault::UnconfiguredEvent(event));
            return None;
        };
        if !self.config.routes_to(event, bank) {
            self.report(Component::Allocation, MemoryFault::EventNotRouted { bank, event });
            return None;
        }
        Some(master)
    }

    /// Take any free slot of a bank that is below capacity.
    fn claim_free_slot(&mut self, bank: BankId, event: EventId) -> Option<SlotIndex> {
        let size = self.directory.current_size(bank);
        if size >= self.directory.max_size(bank) {
            return None;
        }
        let free = self.directory.range(bank)?.find_map(|raw| {
            let slot = self.store.slot(raw)?;
            self.store.get(slot)?.is_free().then_some(slot)
        });
        let Some(slot) = free else {
            self.report(
                Component::Allocation,
                MemoryFault::NoFreeSlot {
                    bank,
                    current_size: size,
                },
            );
            self.rebuild_chronology(bank);
            return None;
        };

        let timestamp = self.directory.advance_timestamp();
        if let Some(entry) = self.store.get_mut(slot) {
            *entry = EventEntry::allocated(event, timestamp);
        }
        self.chronology.set(bank, size, slot);
        self.set_size(bank, size + 1);
        self.mark(BlockId::Entry(slot), Urgency::Deferred);
        self.mark(BlockId::Admin, Urgency::Deferred);
        debug!(bank = %bank, slot = %slot, event = %event, timestamp, "Entry allocated");
        Some(slot)
    }

    fn nominate_victim(&self, bank: BankId, master: EventId) -> Option<SlotIndex> {
        let request = DisplacementRequest {
            event: master,
            priority: self.config.event(master)?.priority,
        };
        let candidates: Vec<DisplacementCandidate> = self
            .chronological_slots(bank)
            .into_iter()
            .enumerate()
            .filter_map(|(position, slot)| {
                let entry = self.store.get(slot)?;
                let event = entry.event_id?;
                let flags = entry.pre_confirmed_status;
                Some(DisplacementCandidate {
                    slot,
                    event,
                    priority: self.config.event(event).map_or(u8::MAX, |e| e.priority),
                    status: self.core.event_status(event),
                    occurrence_counter: entry.occurrence_counter,
                    aged: flags.contains(PreConfirmedStatus::AGED)
                        || flags.contains(PreConfirmedStatus::AGING_ONLY),
                    position,
                })
            })
            .collect();
        select_victim(self.config.displacement, &request, &candidates)
    }

    fn displace(&mut self, bank: BankId, victim: SlotIndex, requester: EventId) {
        let Some(displaced) = self.store.get(victim).and_then(|entry| entry.event_id) else {
            return;
        };
        warn!(
            bank = %bank,
            slot = %victim,
            displaced = %displaced,
            requester = %requester,
            "Entry displaced"
        );
        for member in self.config.members_of(displaced) {
            self.core.event_displaced(member);
        }
        self.free(bank, victim);
    }

    /// Clear an entry and drop it from the chronology without any owner checks.
    pub(crate) fn release_slot(&mut self, bank: BankId, slot: SlotIndex) {
        if let Some(entry) = self.store.get_mut(slot) {
            entry.clear();
        }
        let size = self.directory.current_size(bank);
        match self.chronology.remove(bank, size, slot) {
            Ok(()) => self.set_size(bank, size.saturating_sub(1)),
            Err(fault) => {
                self.report(Component::Chronology, fault);
                self.rebuild_chronology(bank);
            }
        }
        self.mark(BlockId::Entry(slot), Urgency::Deferred);
        self.mark(BlockId::Admin, Urgency::Deferred);
    }
}
