//! Property tests for the structural guarantees of the event memory.

use dem_memory::{
    select_victim, Collaborators, InMemoryCore, MemoryEngine, RecordingFaults,
    RecordingPersistence,
};
use dem_types::{
    BankConfig, BankId, BankKind, DisplacementCandidate, DisplacementPolicy, DisplacementRequest,
    EventConfig, EventEntry, EventId, MemoryConfig, SlotIndex, UdsStatus,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

const BANKS: [BankId; 2] = [BankId(0), BankId(1)];
const CAPACITY: u16 = 4;
const EVENTS: u16 = 8;

/// Two banks of four slots; events 1..=8 routed to both with mixed priorities.
fn config() -> MemoryConfig {
    let config = MemoryConfig::default()
        .with_bank(BankConfig::new(BANKS[0], BankKind::Primary, CAPACITY))
        .with_bank(BankConfig::new(BANKS[1], BankKind::UserDefined(1), CAPACITY));
    (1..=EVENTS).fold(config, |config, id| {
        config.with_event(
            EventConfig::new(EventId(id), BANKS[0])
                .also_in(BANKS[1])
                .with_priority((id % 3 + 1) as u8),
        )
    })
}

fn engine() -> (MemoryEngine, InMemoryCore) {
    let core = InMemoryCore::new();
    let engine = MemoryEngine::new(
        config(),
        Collaborators::new(RecordingPersistence::new(), core.clone(), RecordingFaults::new()),
    )
    .expect("valid configuration");
    (engine, core)
}

#[derive(Clone, Debug)]
enum Op {
    Allocate(usize, u16),
    AllocateForAging(usize, u16),
    Free(usize, usize),
    Touch(usize, usize),
    Fail(u16, bool),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..2usize, 1..=EVENTS).prop_map(|(bank, event)| Op::Allocate(bank, event)),
        1 => (0..2usize, 1..=EVENTS).prop_map(|(bank, event)| Op::AllocateForAging(bank, event)),
        2 => (0..2usize, 0..CAPACITY as usize)
            .prop_map(|(bank, position)| Op::Free(bank, position)),
        2 => (0..2usize, 0..CAPACITY as usize)
            .prop_map(|(bank, position)| Op::Touch(bank, position)),
        1 => (1..=EVENTS, any::<bool>()).prop_map(|(event, failing)| Op::Fail(event, failing)),
    ]
}

fn apply(engine: &mut MemoryEngine, core: &InMemoryCore, op: &Op) {
    match *op {
        Op::Allocate(bank, event) => {
            engine.allocate(BANKS[bank], EventId(event));
        }
        Op::AllocateForAging(bank, event) => {
            engine.allocate_for_aging(BANKS[bank], EventId(event));
        }
        Op::Free(bank, position) => {
            if let Some(slot) = engine.chronology_at(BANKS[bank], position) {
                if position < engine.current_size(BANKS[bank]) {
                    engine.free(BANKS[bank], slot);
                }
            }
        }
        Op::Touch(bank, position) => {
            if let Some(slot) = engine.chronology_at(BANKS[bank], position) {
                if position < engine.current_size(BANKS[bank]) {
                    engine.touch(BANKS[bank], slot);
                }
            }
        }
        Op::Fail(event, failing) => {
            let status = if failing { UdsStatus::TF } else { UdsStatus::empty() };
            core.set_status(EventId(event), status);
        }
    }
}

/// A persisted image: per slot an optional (event, timestamp) owner. Event 0
/// and events above 8 are unknown to the configuration.
fn arb_image() -> impl Strategy<Value = Vec<EventEntry>> {
    prop::collection::vec(
        prop::option::of((0..=10u16, 0..32u32)),
        (CAPACITY as usize) * 2,
    )
    .prop_map(|slots| {
        slots
            .into_iter()
            .map(|owner| match owner {
                Some((event, timestamp)) => EventEntry::allocated(EventId(event), timestamp),
                None => EventEntry::default(),
            })
            .collect()
    })
}

fn arb_candidates() -> impl Strategy<Value = Vec<DisplacementCandidate>> {
    prop::collection::vec((1..=EVENTS, 1..=4u8, any::<bool>(), any::<bool>()), 0..8).prop_map(
        |raw| {
            raw.into_iter()
                .enumerate()
                .map(|(position, (event, priority, failing, aged))| DisplacementCandidate {
                    slot: SlotIndex::new(position, 8).expect("position below 8"),
                    event: EventId(event),
                    priority,
                    status: if failing { UdsStatus::TF } else { UdsStatus::empty() },
                    occurrence_counter: 1,
                    aged,
                    position,
                })
                .collect()
        },
    )
}

fn snapshot(engine: &MemoryEngine) -> Vec<(usize, Vec<SlotIndex>)> {
    BANKS
        .iter()
        .map(|bank| (engine.current_size(*bank), engine.chronological_slots(*bank)))
        .collect()
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// Every chronology lists exactly the occupied slots of its bank in
    /// timestamp order, after any sequence of operations.
    #[test]
    fn chronology_matches_store(ops in prop::collection::vec(arb_op(), 1..60)) {
        let (mut engine, core) = engine();
        for op in &ops {
            apply(&mut engine, &core, op);
            let violations = engine.verify();
            prop_assert!(violations.is_empty(), "after {:?}: {:?}", op, violations);
        }
    }

    /// Bank sizes never exceed capacity, whatever size callers request.
    #[test]
    fn size_stays_within_capacity(
        requests in prop::collection::vec((0..2usize, 0..64usize), 1..20),
    ) {
        let (mut engine, _) = engine();
        for (bank, size) in requests {
            engine.set_current_size(BANKS[bank], size);
            prop_assert!(engine.current_size(BANKS[bank]) <= engine.max_size(BANKS[bank]));
            prop_assert_eq!(engine.current_size(BANKS[bank]), size.min(CAPACITY as usize));
        }
    }

    /// Allocating a new event and freeing it again leaves the bank as it was.
    #[test]
    fn allocate_then_free_is_neutral(
        prefill in prop::collection::vec(1..=EVENTS, 0..3),
        event in 1..=EVENTS,
    ) {
        let (mut engine, _) = engine();
        for e in &prefill {
            engine.allocate(BANKS[0], EventId(*e));
        }
        prop_assume!(engine.find(BANKS[0], EventId(event), false).is_none());

        let before = snapshot(&engine);
        let slot = engine.allocate(BANKS[0], EventId(event)).expect("bank has room");
        prop_assert_eq!(engine.free(BANKS[0], slot), Some(EventId(event)));
        prop_assert_eq!(snapshot(&engine), before);
    }

    /// Touching a slot any number of times moves it to the newest position
    /// and keeps the others in their relative order.
    #[test]
    fn repeated_touch_keeps_other_order(
        events in prop::collection::btree_set(1..=EVENTS, 2..=CAPACITY as usize),
        pick in any::<prop::sample::Index>(),
        times in 1..6usize,
    ) {
        let (mut engine, _) = engine();
        for e in &events {
            engine.allocate(BANKS[1], EventId(*e)).expect("bank has room");
        }
        let order = engine.chronological_slots(BANKS[1]);
        let target = order[pick.index(order.len())];
        for _ in 0..times {
            prop_assert!(engine.touch(BANKS[1], target));
        }

        let after = engine.chronological_slots(BANKS[1]);
        let others: Vec<SlotIndex> = order.iter().copied().filter(|s| *s != target).collect();
        prop_assert_eq!(after.last().copied(), Some(target));
        prop_assert_eq!(&after[..after.len() - 1], others.as_slice());
    }

    /// The nominated victim always belongs to a different event.
    #[test]
    fn victim_is_always_foreign(
        candidates in arb_candidates(),
        event in 1..=EVENTS,
        priority in 1..=4u8,
    ) {
        let request = DisplacementRequest { event: EventId(event), priority };
        if let Some(victim) = select_victim(DisplacementPolicy::Standard, &request, &candidates) {
            let chosen = candidates
                .iter()
                .find(|c| c.slot == victim)
                .expect("victim is a candidate");
            prop_assert_ne!(chosen.event, request.event);
        }
    }

    /// A full bank never evicts the requesting event's own data.
    #[test]
    fn displacement_spares_the_requester(
        ops in prop::collection::vec(arb_op(), 1..40),
        event in 1..=EVENTS,
    ) {
        let (mut engine, core) = engine();
        for op in &ops {
            apply(&mut engine, &core, op);
        }
        let displaced_before = core.displaced().len();
        if let Some(slot) = engine.allocate(BANKS[0], EventId(event)) {
            prop_assert_eq!(engine.entry(slot).and_then(|e| e.event_id), Some(EventId(event)));
        }
        prop_assert!(!core.displaced()[displaced_before..].contains(&EventId(event)));
    }

    /// Restoring the same image twice yields identical bookkeeping, and the
    /// result is always consistent.
    #[test]
    fn restoration_is_deterministic(image in arb_image()) {
        let (mut first, _) = engine();
        let (mut second, _) = engine();
        first.load_image(&image);
        second.load_image(&image);

        let first_report = first.restore_all();
        let second_report = second.restore_all();

        prop_assert_eq!(first_report, second_report);
        prop_assert_eq!(snapshot(&first), snapshot(&second));
        prop_assert_eq!(first.timestamp(), second.timestamp());
        prop_assert_eq!(first.image(), second.image());
        prop_assert!(first.verify().is_empty(), "{:?}", first.verify());
    }
}
