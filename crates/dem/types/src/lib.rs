//! Shared types for the diagnostic event memory.
//!
//! Everything the engine persists or reads from configuration lives here:
//! - **Identifiers**: events, banks, combination groups and bounds-checked slots.
//! - **Status**: the UDS status byte and the persisted aging flag bundle.
//! - **Entries**: the fixed-size record that a bank slot holds.
//! - **Configuration**: bank table, event routing and combination groups.

pub mod config;
pub mod displacement;
pub mod entry;
pub mod error;
pub mod ids;
pub mod status;

pub use config::{
    BankConfig, BankKind, CombinationGroup, CustomRestoreFn, DisplacementPolicy, EventConfig,
    EventTargets, MemoryConfig, SnapshotNumbering, StorageTrigger,
};
pub use displacement::{CustomDisplacementFn, DisplacementCandidate, DisplacementRequest};
pub use entry::{DataElement, DataRecord, ElementTag, EventEntry, MemoryImage};
pub use error::ConfigError;
pub use ids::{BankId, EventId, GroupId, SlotIndex};
pub use status::{AgingState, PreConfirmedStatus, RestoredStatus, UdsStatus};
