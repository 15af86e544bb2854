use thiserror::Error;

use crate::ids::{BankId, EventId, GroupId};

/// Errors raised while loading or validating the memory configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no banks configured")]
    NoBanks,

    #[error("bank {0} configured more than once")]
    DuplicateBank(BankId),

    #[error("bank {0} has zero capacity")]
    EmptyBank(BankId),

    #[error("bank {bank} references unknown custom trigger bank {target}")]
    UnknownCustomTriggerBank { bank: BankId, target: BankId },

    #[error("event {0} configured more than once")]
    DuplicateEvent(EventId),

    #[error("event {event} routed to unknown bank {bank}")]
    UnknownBank { event: EventId, bank: BankId },

    #[error("event {0} is not routed to any bank")]
    Unrouted(EventId),

    #[error("event {0} has a trip target of zero")]
    ZeroTripTarget(EventId),

    #[error("group {0} has no members")]
    EmptyGroup(GroupId),

    #[error("group {group} lists unknown event {event}")]
    UnknownEvent { group: GroupId, event: EventId },

    #[error("event {event} references unknown group {group}")]
    UnknownGroup { event: EventId, group: GroupId },

    #[error("event {event} is listed in group {group} but configured for {configured:?}")]
    GroupMembership {
        event: EventId,
        group: GroupId,
        configured: Option<GroupId>,
    },

    #[error("{total} slots exceed the addressable maximum of {max}")]
    TooManySlots { total: usize, max: usize },
}
