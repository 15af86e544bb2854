use dem_types::{BankId, ConfigError, EventEntry, EventId, MemoryConfig, MemoryImage, SlotIndex};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::chronology::Chronology;
use crate::collaborators::{BlockId, BlockPersistence, EventStatusCore, FaultReporter, Urgency};
use crate::directory::BankDirectory;
use crate::error::{Component, MemoryFault};
use crate::origin::{translate_origin, DtcOrigin};
use crate::store::EntryStore;

/// The components the engine calls out to.
pub struct Collaborators {
    pub persistence: Box<dyn BlockPersistence>,
    pub core: Box<dyn EventStatusCore>,
    pub faults: Box<dyn FaultReporter>,
}

impl Collaborators {
    pub fn new(
        persistence: impl BlockPersistence + 'static,
        core: impl EventStatusCore + 'static,
        faults: impl FaultReporter + 'static,
    ) -> Self {
        Self {
            persistence: Box::new(persistence),
            core: Box::new(core),
            faults: Box::new(faults),
        }
    }
}

/// Occupancy of one bank.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BankStats {
    pub bank: BankId,
    pub current_size: usize,
    pub max_size: usize,
    pub overflow: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub banks: Vec<BankStats>,
    pub next_timestamp: u32,
}

/// Multi-bank event memory.
///
/// Owns the entry store together with the per-bank directory and chronology
/// and keeps them consistent across every mutation. Mutating operations take
/// `&mut self`; the caller drives the engine from a single task.
///
/// Faults are never returned. They are handed to the [`FaultReporter`],
/// repaired locally, and the operation degrades to "nothing stored" or
/// "nothing found".
pub struct MemoryEngine {
    pub(crate) config: MemoryConfig,
    pub(crate) directory: BankDirectory,
    pub(crate) chronology: Chronology,
    pub(crate) store: EntryStore,
    pub(crate) persistence: Box<dyn BlockPersistence>,
    pub(crate) core: Box<dyn EventStatusCore>,
    pub(crate) faults: Box<dyn FaultReporter>,
}

impl MemoryEngine {
    pub fn new(config: MemoryConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let directory = BankDirectory::new(&config);
        let chronology = Chronology::new(&directory);
        let store = EntryStore::new(directory.total_slots());
        debug!(
            banks = config.banks.len(),
            slots = store.len(),
            "Event memory laid out"
        );
        Ok(Self {
            config,
            directory,
            chronology,
            store,
            persistence: collaborators.persistence,
            core: collaborators.core,
            faults: collaborators.faults,
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn max_size(&self, bank: BankId) -> usize {
        self.directory.max_size(bank)
    }

    pub fn current_size(&self, bank: BankId) -> usize {
        self.directory.current_size(bank)
    }

    /// Override a bank's occupied count. Out-of-range values are clamped and
    /// reported.
    pub fn set_current_size(&mut self, bank: BankId, size: usize) {
        self.set_size(bank, size);
    }

    pub fn overflow(&self, bank: BankId) -> bool {
        self.directory.overflow(bank)
    }

    pub fn set_overflow(&mut self, bank: BankId) {
        self.directory.set_overflow(bank);
    }

    pub fn reset_overflow(&mut self, bank: BankId) {
        if self.directory.overflow(bank) {
            self.directory.reset_overflow(bank);
            self.mark(BlockId::Admin, Urgency::Deferred);
        }
    }

    /// The value the next allocation or touch will be stamped with.
    pub fn timestamp(&self) -> u32 {
        self.directory.timestamp()
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.directory.set_timestamp(timestamp);
    }

    /// Chronology position `index` of `bank`, 0 being the oldest.
    pub fn chronology_at(&self, bank: BankId, index: usize) -> Option<SlotIndex> {
        self.chronology.get(bank, index)
    }

    /// Occupied slots of `bank`, oldest first.
    pub fn chronological_slots(&self, bank: BankId) -> Vec<SlotIndex> {
        self.chronology.slots(bank, self.directory.current_size(bank))
    }

    /// Bounds-checked slot handle for a raw store index.
    pub fn slot(&self, raw: usize) -> Option<SlotIndex> {
        self.store.slot(raw)
    }

    pub fn entry(&self, slot: SlotIndex) -> Option<&EventEntry> {
        self.store.get(slot)
    }

    pub fn bank_of_slot(&self, slot: SlotIndex) -> Option<BankId> {
        self.directory.bank_of_slot(slot)
    }

    /// Resolve a DTC origin, reporting origins that map to no bank.
    pub fn bank_for_origin(&self, origin: DtcOrigin) -> Option<BankId> {
        let bank = translate_origin(origin, &self.config);
        if bank.is_none() {
            self.report(Component::OriginTranslation, MemoryFault::UnknownOrigin(origin.0));
        }
        bank
    }

    pub fn stats(&self) -> MemoryStats {
        let banks = self
            .directory
            .bank_ids()
            .map(|bank| BankStats {
                bank,
                current_size: self.directory.current_size(bank),
                max_size: self.directory.max_size(bank),
                overflow: self.directory.overflow(bank),
            })
            .collect();
        MemoryStats {
            banks,
            next_timestamp: self.directory.timestamp(),
        }
    }

    /// Cold-start re-initialisation: every slot freed, every bank reset.
    pub fn reinitialize(&mut self) {
        self.store.clear_all();
        self.directory.reset();
        self.chronology.reset_all();
        self.mark(BlockId::Admin, Urgency::Deferred);
        for raw in 0..self.store.len() {
            if let Some(slot) = self.store.slot(raw) {
                self.mark(BlockId::Entry(slot), Urgency::Deferred);
            }
        }
        info!(slots = self.store.len(), "Event memory re-initialized");
    }

    /// Load the last persisted image. Call [`restore_all`](Self::restore_all)
    /// afterwards to rebuild sizes and chronology.
    pub fn load_image(&mut self, entries: &[EventEntry]) {
        if let Err(actual) = self.store.load(entries) {
            self.report(
                Component::Restoration,
                MemoryFault::ImageSizeMismatch {
                    expected: self.store.len(),
                    actual,
                },
            );
        }
        debug!(entries = entries.len(), "Event memory image loaded");
    }

    /// Export the entry store for the persistence collaborator.
    pub fn image(&self) -> MemoryImage {
        MemoryImage {
            entries: self.store.entries().to_vec(),
        }
    }

    /// Free every entry of a bank and clear its overflow flag.
    pub fn clear_bank(&mut self, bank: BankId) -> usize {
        if !self.directory.contains(bank) {
            self.report(Component::Allocation, MemoryFault::UnknownBank(bank));
            return 0;
        }
        let slots = self.chronological_slots(bank);
        let cleared = slots
            .into_iter()
            .filter(|slot| self.free(bank, *slot).is_some())
            .count();
        self.reset_overflow(bank);
        info!(bank = %bank, cleared, "Bank cleared");
        cleared
    }

    /// Free the entry of `event` in `bank`, if it has one.
    pub fn clear_event(&mut self, bank: BankId, event: EventId) -> bool {
        match self.find(bank, event, false) {
            Some(slot) => self.free(bank, slot).is_some(),
            None => false,
        }
    }

    pub(crate) fn report(&self, component: Component, fault: MemoryFault) {
        self.faults.report_fault(component, &fault);
    }

    pub(crate) fn mark(&self, block: BlockId, urgency: Urgency) {
        self.persistence.mark_block_dirty(block, urgency);
    }

    pub(crate) fn set_size(&mut self, bank: BankId, size: usize) {
        if let Err(fault) = self.directory.set_current_size(bank, size) {
            self.report(Component::Directory, fault);
        }
    }

    pub(crate) fn slot_in_bank(&self, bank: BankId, slot: SlotIndex) -> bool {
        self.directory
            .range(bank)
            .is_some_and(|range| range.contains(&slot.get()))
    }

    /// Check that `slot` belongs to `bank` and is occupied; report otherwise.
    pub(crate) fn occupant(
        &self,
        component: Component,
        bank: BankId,
        slot: SlotIndex,
    ) -> Option<EventId> {
        if !self.slot_in_bank(bank, slot) {
            self.report(component, MemoryFault::SlotOutOfRange { bank, slot });
            return None;
        }
        let occupant = self.store.get(slot).and_then(|entry| entry.event_id);
        if occupant.is_none() {
            self.report(component, MemoryFault::SlotNotOccupied { bank, slot });
        }
        occupant
    }

    /// Recompute a bank's chronology and size from the entry store.
    ///
    /// Occupied slots are ordered by timestamp, then by slot index.
    pub(crate) fn rebuild_chronology(&mut self, bank: BankId) {
        let Some(range) = self.directory.range(bank) else {
            return;
        };
        let mut occupied: Vec<(u32, SlotIndex)> = range
            .filter_map(|raw| self.store.slot(raw))
            .filter_map(|slot| {
                let entry = self.store.get(slot)?;
                (!entry.is_free()).then_some((entry.timestamp, slot))
            })
            .collect();
        occupied.sort();

        self.chronology.reset(bank);
        for (position, (_, slot)) in occupied.iter().enumerate() {
            self.chronology.set(bank, position, *slot);
        }
        self.set_size(bank, occupied.len());
        warn!(bank = %bank, size = occupied.len(), "Chronology rebuilt from entry store");
        self.mark(BlockId::Admin, Urgency::Immediate);
    }
}
