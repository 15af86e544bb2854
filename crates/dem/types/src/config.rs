use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::displacement::CustomDisplacementFn;
use crate::entry::EventEntry;
use crate::error::ConfigError;
use crate::ids::{BankId, EventId, GroupId};
use crate::status::RestoredStatus;

/// Restores status from an entry under a fully customized storage scheme.
pub type CustomRestoreFn = fn(&EventEntry, &EventTargets) -> RestoredStatus;

/// Per-event thresholds consulted when re-deriving status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventTargets {
    /// Failed operation cycles needed to confirm the event.
    pub trip_target: u8,
    /// Passed operation cycles needed to age the event.
    pub aging_target: u16,
}

/// Condition under which a bank stores an entry for an event.
#[derive(Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageTrigger {
    #[default]
    Confirmed,
    Failed,
    Pending,
    /// Fault detection counter crossed its storage threshold.
    Fdc,
    #[serde(skip)]
    Custom(CustomRestoreFn),
}

impl StorageTrigger {
    pub fn name(&self) -> &'static str {
        match self {
            StorageTrigger::Confirmed => "confirmed",
            StorageTrigger::Failed => "failed",
            StorageTrigger::Pending => "pending",
            StorageTrigger::Fdc => "fdc",
            StorageTrigger::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for StorageTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Strategy for choosing a victim when a bank is full.
#[derive(Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplacementPolicy {
    /// Aged entries first, then lower priority, then passive entries of equal
    /// priority; oldest first within each class.
    #[default]
    Standard,
    #[serde(skip)]
    Customized(CustomDisplacementFn),
}

impl fmt::Debug for DisplacementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplacementPolicy::Standard => f.write_str("standard"),
            DisplacementPolicy::Customized(_) => f.write_str("customized"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankKind {
    Primary,
    UserDefined(u8),
    Permanent,
    TimeSeries,
    CustomTrigger,
}

/// How snapshot record numbers are assigned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotNumbering {
    /// Records are numbered 1..=max in storage order.
    #[default]
    Calculated,
    /// Record numbers come from configuration and are supplied by the caller.
    Configured,
}

fn default_max_snapshot_records() -> u8 {
    4
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BankConfig {
    pub id: BankId,
    pub kind: BankKind,
    pub capacity: u16,
    #[serde(default)]
    pub trigger: StorageTrigger,
    #[serde(default)]
    pub snapshot_numbering: SnapshotNumbering,
    #[serde(default = "default_max_snapshot_records")]
    pub max_snapshot_records: u8,
    /// Bank holding custom-triggered data that belongs to this bank's entries.
    #[serde(default)]
    pub custom_trigger_bank: Option<BankId>,
}

impl BankConfig {
    pub fn new(id: BankId, kind: BankKind, capacity: u16) -> Self {
        Self {
            id,
            kind,
            capacity,
            trigger: StorageTrigger::default(),
            snapshot_numbering: SnapshotNumbering::default(),
            max_snapshot_records: default_max_snapshot_records(),
            custom_trigger_bank: None,
        }
    }

    pub fn with_trigger(mut self, trigger: StorageTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn with_snapshot_numbering(
        mut self,
        numbering: SnapshotNumbering,
        max_records: u8,
    ) -> Self {
        self.snapshot_numbering = numbering;
        self.max_snapshot_records = max_records;
        self
    }

    pub fn with_custom_trigger_bank(mut self, bank: BankId) -> Self {
        self.custom_trigger_bank = Some(bank);
        self
    }
}

fn default_priority() -> u8 {
    2
}

fn default_trip_target() -> u8 {
    1
}

fn default_aging_target() -> u16 {
    40
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventConfig {
    pub id: EventId,
    /// Banks this event is stored in.
    pub banks: Vec<BankId>,
    /// 1 is the most important priority.
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default = "default_trip_target")]
    pub trip_target: u8,
    #[serde(default = "default_aging_target")]
    pub aging_target: u16,
    #[serde(default)]
    pub group: Option<GroupId>,
}

impl EventConfig {
    pub fn new(id: EventId, bank: BankId) -> Self {
        Self {
            id,
            banks: vec![bank],
            priority: default_priority(),
            trip_target: default_trip_target(),
            aging_target: default_aging_target(),
            group: None,
        }
    }

    pub fn also_in(mut self, bank: BankId) -> Self {
        self.banks.push(bank);
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_trip_target(mut self, trip_target: u8) -> Self {
        self.trip_target = trip_target;
        self
    }

    pub fn with_aging_target(mut self, aging_target: u16) -> Self {
        self.aging_target = aging_target;
        self
    }

    pub fn in_group(mut self, group: GroupId) -> Self {
        self.group = Some(group);
        self
    }

    pub fn targets(&self) -> EventTargets {
        EventTargets {
            trip_target: self.trip_target,
            aging_target: self.aging_target,
        }
    }
}

/// Events sharing one physical entry. The first member is the master under
/// which the entry is stored.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombinationGroup {
    pub id: GroupId,
    pub members: Vec<EventId>,
}

impl CombinationGroup {
    pub fn master(&self) -> Option<EventId> {
        self.members.first().copied()
    }
}

/// Static description of all banks, events and combination groups.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryConfig {
    pub banks: Vec<BankConfig>,
    #[serde(default)]
    pub events: Vec<EventConfig>,
    #[serde(default)]
    pub groups: Vec<CombinationGroup>,
    #[serde(default)]
    pub displacement: DisplacementPolicy,
}

impl MemoryConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: MemoryConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn with_bank(mut self, bank: BankConfig) -> Self {
        self.banks.push(bank);
        self
    }

    pub fn with_event(mut self, event: EventConfig) -> Self {
        self.events.push(event);
        self
    }

    pub fn with_group(mut self, group: CombinationGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_displacement(mut self, policy: DisplacementPolicy) -> Self {
        self.displacement = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.banks.is_empty() {
            return Err(ConfigError::NoBanks);
        }

        let mut bank_ids = HashSet::new();
        for bank in &self.banks {
            if !bank_ids.insert(bank.id) {
                return Err(ConfigError::DuplicateBank(bank.id));
            }
            if bank.capacity == 0 {
                return Err(ConfigError::EmptyBank(bank.id));
            }
        }
        for bank in &self.banks {
            if let Some(target) = bank.custom_trigger_bank {
                if !bank_ids.contains(&target) || target == bank.id {
                    return Err(ConfigError::UnknownCustomTriggerBank {
                        bank: bank.id,
                        target,
                    });
                }
            }
        }

        let total = self.total_slots();
        let max = u16::MAX as usize;
        if total > max {
            return Err(ConfigError::TooManySlots { total, max });
        }

        let mut event_ids = HashSet::new();
        for event in &self.events {
            if !event_ids.insert(event.id) {
                return Err(ConfigError::DuplicateEvent(event.id));
            }
            if event.banks.is_empty() {
                return Err(ConfigError::Unrouted(event.id));
            }
            if let Some(bank) = event.banks.iter().find(|b| !bank_ids.contains(b)) {
                return Err(ConfigError::UnknownBank {
                    event: event.id,
                    bank: *bank,
                });
            }
            if event.trip_target == 0 {
                return Err(ConfigError::ZeroTripTarget(event.id));
            }
            if let Some(group) = event.group {
                if self.group(group).is_none() {
                    return Err(ConfigError::UnknownGroup {
                        event: event.id,
                        group,
                    });
                }
            }
        }

        for group in &self.groups {
            if group.members.is_empty() {
                return Err(ConfigError::EmptyGroup(group.id));
            }
            for member in &group.members {
                let event = self.event(*member).ok_or(ConfigError::UnknownEvent {
                    group: group.id,
                    event: *member,
                })?;
                if event.group != Some(group.id) {
                    return Err(ConfigError::GroupMembership {
                        event: *member,
                        group: group.id,
                        configured: event.group,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn total_slots(&self) -> usize {
        self.banks.iter().map(|b| b.capacity as usize).sum()
    }

    pub fn bank(&self, id: BankId) -> Option<&BankConfig> {
        self.banks.iter().find(|b| b.id == id)
    }

    pub fn event(&self, id: EventId) -> Option<&EventConfig> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn group(&self, id: GroupId) -> Option<&CombinationGroup> {
        self.groups.iter().find(|g| g.id == id)
    }

    /// The event under which `event`'s entry is stored; `None` for unknown events.
    pub fn master_of(&self, event: EventId) -> Option<EventId> {
        let config = self.event(event)?;
        match config.group.and_then(|g| self.group(g)) {
            Some(group) => group.master(),
            None => Some(event),
        }
    }

    /// Every event sharing `event`'s entry, including `event` itself.
    pub fn members_of(&self, event: EventId) -> Vec<EventId> {
        self.event(event)
            .and_then(|e| e.group)
            .and_then(|g| self.group(g))
            .map(|g| g.members.clone())
            .unwrap_or_else(|| vec![event])
    }

    pub fn routes_to(&self, event: EventId, bank: BankId) -> bool {
        self.event(event).is_some_and(|e| e.banks.contains(&bank))
    }

    /// Whether an entry stored under `event`'s master may live in `bank`:
    /// any member of the group routed there can have allocated it.
    pub fn group_routes_to(&self, event: EventId, bank: BankId) -> bool {
        self.members_of(event)
            .into_iter()
            .any(|member| self.routes_to(member, bank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        displacement = "standard"

        [[banks]]
        id = 0
        kind = "primary"
        capacity = 8
        trigger = "confirmed"
        custom_trigger_bank = 2

        [[banks]]
        id = 1
        kind = { user_defined = 1 }
        capacity = 4
        trigger = "fdc"
        snapshot_numbering = "configured"
        max_snapshot_records = 2

        [[banks]]
        id = 2
        kind = "custom_trigger"
        capacity = 2

        [[events]]
        id = 100
        banks = [0, 1]
        priority = 1
        trip_target = 3

        [[events]]
        id = 200
        banks = [0]
        group = 7

        [[events]]
        id = 201
        banks = [0]
        group = 7

        [[groups]]
        id = 7
        members = [200, 201]
    "#;

    #[test]
    fn parse_sample_config() {
        let config = MemoryConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.banks.len(), 3);
        assert_eq!(config.total_slots(), 14);
        assert_eq!(config.banks[1].kind, BankKind::UserDefined(1));
        assert_eq!(config.banks[1].trigger.name(), "fdc");
        assert_eq!(config.banks[1].snapshot_numbering, SnapshotNumbering::Configured);
        assert_eq!(config.banks[0].max_snapshot_records, 4);
        assert_eq!(config.banks[0].custom_trigger_bank, Some(BankId(2)));

        let event = config.event(EventId(100)).unwrap();
        assert_eq!(event.trip_target, 3);
        assert_eq!(event.aging_target, 40);
        assert!(config.routes_to(EventId(100), BankId(1)));
        assert!(!config.routes_to(EventId(200), BankId(1)));
    }

    #[test]
    fn master_and_members() {
        let config = MemoryConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.master_of(EventId(201)), Some(EventId(200)));
        assert_eq!(config.master_of(EventId(100)), Some(EventId(100)));
        assert_eq!(config.master_of(EventId(999)), None);
        assert_eq!(config.members_of(EventId(201)), vec![EventId(200), EventId(201)]);
        assert_eq!(config.members_of(EventId(100)), vec![EventId(100)]);
    }

    #[test]
    fn group_routing_covers_every_member() {
        let config = MemoryConfig::default()
            .with_bank(BankConfig::new(BankId(0), BankKind::Primary, 2))
            .with_bank(BankConfig::new(BankId(1), BankKind::UserDefined(1), 2))
            .with_event(EventConfig::new(EventId(10), BankId(0)).in_group(GroupId(1)))
            .with_event(
                EventConfig::new(EventId(11), BankId(0))
                    .also_in(BankId(1))
                    .in_group(GroupId(1)),
            )
            .with_group(CombinationGroup {
                id: GroupId(1),
                members: vec![EventId(10), EventId(11)],
            });
        assert!(!config.routes_to(EventId(10), BankId(1)));
        assert!(config.group_routes_to(EventId(10), BankId(1)));
        assert!(config.group_routes_to(EventId(11), BankId(0)));
        assert!(!config.group_routes_to(EventId(10), BankId(2)));
    }

    #[test]
    fn reject_duplicate_bank() {
        let config = MemoryConfig::default()
            .with_bank(BankConfig::new(BankId(0), BankKind::Primary, 2))
            .with_bank(BankConfig::new(BankId(0), BankKind::Permanent, 2));
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateBank(BankId(0)))));
    }

    #[test]
    fn reject_zero_capacity_and_no_banks() {
        assert!(matches!(MemoryConfig::default().validate(), Err(ConfigError::NoBanks)));
        let config =
            MemoryConfig::default().with_bank(BankConfig::new(BankId(3), BankKind::Primary, 0));
        assert!(matches!(config.validate(), Err(ConfigError::EmptyBank(BankId(3)))));
    }

    #[test]
    fn reject_unknown_routing() {
        let config = MemoryConfig::default()
            .with_bank(BankConfig::new(BankId(0), BankKind::Primary, 2))
            .with_event(EventConfig::new(EventId(1), BankId(9)));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownBank { bank: BankId(9), .. })
        ));
    }

    #[test]
    fn reject_zero_trip_target() {
        let config = MemoryConfig::default()
            .with_bank(BankConfig::new(BankId(0), BankKind::Primary, 2))
            .with_event(EventConfig::new(EventId(1), BankId(0)).with_trip_target(0));
        assert!(matches!(config.validate(), Err(ConfigError::ZeroTripTarget(EventId(1)))));
    }

    #[test]
    fn reject_inconsistent_group_membership() {
        let config = MemoryConfig::default()
            .with_bank(BankConfig::new(BankId(0), BankKind::Primary, 2))
            .with_event(EventConfig::new(EventId(1), BankId(0)))
            .with_group(CombinationGroup {
                id: GroupId(1),
                members: vec![EventId(1)],
            });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::GroupMembership { configured: None, .. })
        ));
    }

    #[test]
    fn reject_self_referencing_custom_trigger_bank() {
        let config = MemoryConfig::default().with_bank(
            BankConfig::new(BankId(0), BankKind::Primary, 2).with_custom_trigger_bank(BankId(0)),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownCustomTriggerBank { .. })
        ));
    }

    #[test]
    fn parse_error_is_reported() {
        let err = MemoryConfig::from_toml_str("banks = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
