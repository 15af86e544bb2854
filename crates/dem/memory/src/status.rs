//! Re-deriving UDS status from the redundant counters of a persisted entry.

use dem_types::{
    AgingState, EventEntry, EventTargets, PreConfirmedStatus, RestoredStatus, StorageTrigger,
    UdsStatus,
};

/// Reconstruct the restorable status bits and the aging state of an entry.
///
/// The result depends only on the entry's counters, the bank's storage
/// trigger and the event's targets.
pub fn restore_status(
    entry: &EventEntry,
    trigger: StorageTrigger,
    targets: &EventTargets,
) -> RestoredStatus {
    if let StorageTrigger::Custom(restore) = trigger {
        return restore(entry, targets);
    }

    let aging = restore_aging(entry, targets);
    let consecutive = entry.consecutive_failed_cycle_counter;
    let mut status = UdsStatus::empty();

    // A confirmed-triggered entry only exists once the event confirmed.
    let confirmed =
        matches!(trigger, StorageTrigger::Confirmed) || consecutive >= targets.trip_target;
    if confirmed && aging != AgingState::Aged {
        status.insert(UdsStatus::CDTC);
    }

    let pending = matches!(trigger, StorageTrigger::Pending) || consecutive > 0;
    if pending && aging == AgingState::NotAging {
        status.insert(UdsStatus::PDTC);
    }

    // Fdc-triggered entries may exist before the event ever failed.
    if entry.occurrence_counter > 0 || !matches!(trigger, StorageTrigger::Fdc) {
        status.insert(UdsStatus::TFSLC);
    }

    RestoredStatus { status, aging }
}

fn restore_aging(entry: &EventEntry, targets: &EventTargets) -> AgingState {
    let flags = entry.pre_confirmed_status;
    if flags.contains(PreConfirmedStatus::AGED) {
        AgingState::Aged
    } else if flags.contains(PreConfirmedStatus::AGING_ACTIVE)
        || flags.contains(PreConfirmedStatus::AGING_ONLY)
    {
        if entry.aging_counter >= targets.aging_target {
            AgingState::Aged
        } else {
            AgingState::Aging {
                counter: entry.aging_counter,
            }
        }
    } else {
        AgingState::NotAging
    }
}
