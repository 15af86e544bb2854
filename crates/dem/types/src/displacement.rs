use crate::ids::{EventId, SlotIndex};
use crate::status::UdsStatus;

/// Scores a candidate for displacement; `None` means the candidate must not be
/// displaced. The highest score wins, ties go to the oldest entry.
pub type CustomDisplacementFn = fn(&DisplacementRequest, &DisplacementCandidate) -> Option<u32>;

/// The event asking for a slot in a full bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplacementRequest {
    pub event: EventId,
    /// Configured priority; 1 is the most important.
    pub priority: u8,
}

/// An occupied slot that might be displaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplacementCandidate {
    pub slot: SlotIndex,
    pub event: EventId,
    pub priority: u8,
    pub status: UdsStatus,
    pub occurrence_counter: u8,
    /// Entry is aged or only carries aging state.
    pub aged: bool,
    /// Chronology position, 0 being the oldest.
    pub position: usize,
}

impl DisplacementCandidate {
    pub fn is_passive(&self) -> bool {
        !self.status.contains(UdsStatus::TF)
    }
}
