//! Fault/event memory engine.
//!
//! A fixed-capacity, multi-bank store of event entries:
//! - **BankDirectory**: per-bank occupancy, overflow flags and the global timestamp.
//! - **EntryStore** and **Chronology**: the slots themselves and their
//!   oldest-to-newest order per bank.
//! - **Allocation**: allocate, free, touch and find, with displacement when a
//!   bank is full.
//! - **Restoration**: start-of-day validation of a persisted image and
//!   reconstruction of event status from the entries' redundant counters.
//! - **Origin translation**: DTC origin codes to banks.
//!
//! The engine talks to its neighbours through the traits in
//! [`collaborators`]; faults are reported there and never returned.

mod allocation;
pub mod chronology;
pub mod collaborators;
mod counters;
pub mod directory;
pub mod displacement;
mod engine;
pub mod error;
mod invariants;
pub mod origin;
mod records;
mod restoration;
pub mod status;
pub mod store;

pub use collaborators::{
    BlockId, BlockPersistence, EventStatusCore, FaultReporter, InMemoryCore, RecordingFaults,
    RecordingPersistence, TracingFaultReporter, Urgency,
};
pub use counters::AgingProgress;
pub use directory::INITIAL_TIMESTAMP;
pub use displacement::select_victim;
pub use engine::{BankStats, Collaborators, MemoryEngine, MemoryStats};
pub use error::{Component, MemoryFault};
pub use invariants::InvariantViolation;
pub use origin::{translate_origin, DtcOrigin};
pub use restoration::{BankRestoreReport, RestorationReport};
pub use status::restore_status;
