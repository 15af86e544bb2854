use serde::{Deserialize, Serialize};

use crate::ids::EventId;
use crate::status::PreConfirmedStatus;

/// Tag of a data element inside a snapshot or extended data record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementTag {
    /// Application data identified by its configured data identifier.
    Opaque(u16),
    /// Big-endian event id of the event that caused a combined entry.
    RootCauseEventId,
}

/// One element of a snapshot or extended data record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataElement {
    pub tag: ElementTag,
    pub bytes: Vec<u8>,
}

impl DataElement {
    pub fn opaque(did: u16, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            tag: ElementTag::Opaque(did),
            bytes: bytes.into(),
        }
    }

    pub fn root_cause(event: EventId) -> Self {
        Self {
            tag: ElementTag::RootCauseEventId,
            bytes: event.0.to_be_bytes().to_vec(),
        }
    }

    /// Decode a root-cause element; `None` for other tags or short payloads.
    pub fn root_cause_event(&self) -> Option<EventId> {
        match (self.tag, self.bytes.as_slice()) {
            (ElementTag::RootCauseEventId, [hi, lo, ..]) => {
                Some(EventId(u16::from_be_bytes([*hi, *lo])))
            }
            _ => None,
        }
    }
}

/// A numbered snapshot or extended data record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRecord {
    pub number: u8,
    pub elements: Vec<DataElement>,
}

/// One fixed-size slot of the event memory.
///
/// Free when `event_id` is `None`. The counters and `pre_confirmed_status`
/// are the redundant persisted state from which status bits are re-derived
/// at restart.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEntry {
    #[serde(default)]
    pub event_id: Option<EventId>,
    #[serde(default)]
    pub timestamp: u32,
    #[serde(default)]
    pub consecutive_failed_cycle_counter: u8,
    #[serde(default)]
    pub occurrence_counter: u8,
    #[serde(default)]
    pub pre_confirmed_status: PreConfirmedStatus,
    #[serde(default)]
    pub aging_counter: u16,
    #[serde(default)]
    pub snapshots: Vec<DataRecord>,
    #[serde(default)]
    pub extended: Vec<DataRecord>,
    #[serde(default)]
    pub freeze_frame: Vec<u8>,
}

impl EventEntry {
    /// A freshly allocated entry: owner and timestamp set, everything else zeroed.
    pub fn allocated(event: EventId, timestamp: u32) -> Self {
        Self {
            event_id: Some(event),
            timestamp,
            ..Self::default()
        }
    }

    pub fn is_free(&self) -> bool {
        self.event_id.is_none()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Scan snapshot records, then extended records, for a root-cause element.
    pub fn root_cause_event(&self) -> Option<EventId> {
        self.snapshots
            .iter()
            .chain(self.extended.iter())
            .flat_map(|record| record.elements.iter())
            .find_map(DataElement::root_cause_event)
    }
}

/// Serialized form of the whole entry store, as written by the persistence layer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryImage {
    pub entries: Vec<EventEntry>,
}
