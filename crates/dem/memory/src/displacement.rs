//! Victim selection for full banks.

use dem_types::{DisplacementCandidate, DisplacementPolicy, DisplacementRequest, SlotIndex};

/// Score bonus placing every lower-priority candidate above equal-priority ones.
const LOWER_PRIORITY_CLASS: u32 = 0x1000;

/// Nominate the slot to evict for `request`, or `None` if nothing may go.
///
/// `candidates` are expected in chronological order; among equal scores the
/// oldest (smallest `position`) wins. Entries owned by the requesting event
/// are never nominated.
pub fn select_victim(
    policy: DisplacementPolicy,
    request: &DisplacementRequest,
    candidates: &[DisplacementCandidate],
) -> Option<SlotIndex> {
    candidates
        .iter()
        .filter(|candidate| candidate.event != request.event)
        .filter_map(|candidate| {
            let score = match policy {
                DisplacementPolicy::Standard => standard_score(request, candidate),
                DisplacementPolicy::Customized(score) => score(request, candidate),
            }?;
            Some((score, candidate.position, candidate.slot))
        })
        .max_by(|(score_a, pos_a, _), (score_b, pos_b, _)| {
            score_a.cmp(score_b).then_with(|| pos_b.cmp(pos_a))
        })
        .map(|(_, _, slot)| slot)
}

/// Aged entries, then lower-priority entries (passive preferred), then
/// passive entries of equal priority.
fn standard_score(request: &DisplacementRequest, candidate: &DisplacementCandidate) -> Option<u32> {
    if candidate.aged {
        return Some(u32::MAX);
    }
    let passive = u32::from(candidate.is_passive());
    if candidate.priority > request.priority {
        return Some(LOWER_PRIORITY_CLASS + u32::from(candidate.priority) * 2 + passive);
    }
    if candidate.priority == request.priority && candidate.is_passive() {
        return Some(1);
    }
    None
}
