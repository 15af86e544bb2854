//! Contracts with the components around the engine: persistence, the event
//! status core and fault reporting.
//!
//! All methods take `&self`; implementations that record state use interior
//! mutability so the engine can hold them behind a `Box<dyn _>`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use dem_types::{AgingState, EventId, RestoredStatus, SlotIndex, UdsStatus};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::error;

use crate::error::{Component, MemoryFault};

/// A persisted block the engine can ask to have rewritten.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockId {
    /// Bank sizes, overflow flags and the global timestamp.
    Admin,
    Entry(SlotIndex),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    /// Written with the next regular persistence cycle.
    Deferred,
    /// Written as soon as possible; used for repaired blocks.
    Immediate,
}

/// Durable storage of the entry store. Fire-and-forget: the engine never waits.
pub trait BlockPersistence: Send + Sync {
    fn mark_block_dirty(&self, block: BlockId, urgency: Urgency);
}

/// The component that owns per-event status.
pub trait EventStatusCore: Send + Sync {
    /// Current UDS status of an event.
    fn event_status(&self, event: EventId) -> UdsStatus;

    /// Merge status re-derived from a persisted entry.
    fn restore_event(&self, event: EventId, restored: &RestoredStatus);

    /// The event's entry was chosen as a displacement victim.
    fn event_displaced(&self, event: EventId);
}

/// Process-wide fault sink.
pub trait FaultReporter: Send + Sync {
    fn report_fault(&self, component: Component, fault: &MemoryFault);
}

/// Fault reporter that logs every fault through `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingFaultReporter;

impl FaultReporter for TracingFaultReporter {
    fn report_fault(&self, component: Component, fault: &MemoryFault) {
        error!(component = ?component, fault = %fault, "Event memory fault");
    }
}

/// Persistence double that records every dirty-marking.
///
/// Clones share the same log, so a clone kept by a test observes what the
/// engine marked.
#[derive(Clone, Debug, Default)]
pub struct RecordingPersistence {
    dirty: Arc<Mutex<Vec<(BlockId, Urgency)>>>,
}

impl RecordingPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dirty_blocks(&self) -> Vec<(BlockId, Urgency)> {
        self.dirty.lock().clone()
    }

    pub fn is_dirty(&self, block: BlockId) -> bool {
        self.dirty.lock().iter().any(|(b, _)| *b == block)
    }

    pub fn was_marked(&self, block: BlockId, urgency: Urgency) -> bool {
        self.dirty.lock().contains(&(block, urgency))
    }

    pub fn clear(&self) {
        self.dirty.lock().clear();
    }
}

impl BlockPersistence for RecordingPersistence {
    fn mark_block_dirty(&self, block: BlockId, urgency: Urgency) {
        self.dirty.lock().push((block, urgency));
    }
}

/// Fault reporter double that keeps every reported fault.
#[derive(Clone, Debug, Default)]
pub struct RecordingFaults {
    faults: Arc<Mutex<Vec<(Component, MemoryFault)>>>,
}

impl RecordingFaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn faults(&self) -> Vec<(Component, MemoryFault)> {
        self.faults.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.faults.lock().len()
    }

    pub fn clear(&self) {
        self.faults.lock().clear();
    }
}

impl FaultReporter for RecordingFaults {
    fn report_fault(&self, component: Component, fault: &MemoryFault) {
        self.faults.lock().push((component, fault.clone()));
    }
}

#[derive(Debug, Default)]
struct CoreState {
    statuses: HashMap<EventId, UdsStatus>,
    aging: HashMap<EventId, AgingState>,
    displaced: Vec<EventId>,
}

/// In-memory event status core, for tests and offline tooling.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCore {
    inner: Arc<Mutex<CoreState>>,
}

impl InMemoryCore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, event: EventId, status: UdsStatus) {
        self.inner.lock().statuses.insert(event, status);
    }

    pub fn status(&self, event: EventId) -> UdsStatus {
        self.inner
            .lock()
            .statuses
            .get(&event)
            .copied()
            .unwrap_or_default()
    }

    pub fn aging(&self, event: EventId) -> AgingState {
        self.inner
            .lock()
            .aging
            .get(&event)
            .copied()
            .unwrap_or_default()
    }

    pub fn displaced(&self) -> Vec<EventId> {
        self.inner.lock().displaced.clone()
    }

    /// All known statuses, ordered by event id.
    pub fn statuses(&self) -> BTreeMap<EventId, UdsStatus> {
        self.inner
            .lock()
            .statuses
            .iter()
            .map(|(event, status)| (*event, *status))
            .collect()
    }
}

impl EventStatusCore for InMemoryCore {
    fn event_status(&self, event: EventId) -> UdsStatus {
        self.status(event)
    }

    fn restore_event(&self, event: EventId, restored: &RestoredStatus) {
        let mut state = self.inner.lock();
        let previous = state.statuses.get(&event).copied().unwrap_or_default();
        state.statuses.insert(event, restored.apply_to(previous));
        state.aging.insert(event, restored.aging);
    }

    fn event_displaced(&self, event: EventId) {
        let mut state = self.inner.lock();
        if let Some(status) = state.statuses.get_mut(&event) {
            status.remove(UdsStatus::CDTC | UdsStatus::PDTC);
        }
        state.aging.remove(&event);
        state.displaced.push(event);
    }
}
