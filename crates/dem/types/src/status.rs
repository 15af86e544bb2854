use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use serde::{Deserialize, Serialize};

/// UDS DTC status byte (ISO 14229-1, DTCStatusMask).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UdsStatus(pub u8);

impl UdsStatus {
    /// testFailed
    pub const TF: Self = Self(0x01);
    /// testFailedThisOperationCycle
    pub const TFTOC: Self = Self(0x02);
    /// pendingDTC
    pub const PDTC: Self = Self(0x04);
    /// confirmedDTC
    pub const CDTC: Self = Self(0x08);
    /// testNotCompletedSinceLastClear
    pub const TNCSLC: Self = Self(0x10);
    /// testFailedSinceLastClear
    pub const TFSLC: Self = Self(0x20);
    /// testNotCompletedThisOperationCycle
    pub const TNCTOC: Self = Self(0x40);
    /// warningIndicatorRequested
    pub const WIR: Self = Self(0x80);

    /// Bits that are re-derived from an entry's redundant counters.
    pub const RESTORABLE: Self = Self(0x04 | 0x08 | 0x20);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl BitOr for UdsStatus {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for UdsStatus {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for UdsStatus {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for UdsStatus {
    type Output = Self;

    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Display for UdsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Aging-related flag bundle persisted inside every event entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreConfirmedStatus(pub u8);

impl PreConfirmedStatus {
    /// The event passed and its aging counter is running.
    pub const AGING_ACTIVE: Self = Self(0x01);
    /// The aging target was reached; the entry is retained but no longer confirmed.
    pub const AGED: Self = Self(0x02);
    /// The entry only carries aging state and holds no event data.
    pub const AGING_ONLY: Self = Self(0x04);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Reconstructed aging progress of an event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum AgingState {
    #[default]
    NotAging,
    Aging {
        counter: u16,
    },
    Aged,
}

/// Status derived for one event from a restored entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoredStatus {
    /// Values for the [`UdsStatus::RESTORABLE`] bits; other bits are ignored.
    pub status: UdsStatus,
    pub aging: AgingState,
}

impl RestoredStatus {
    /// Merge into a previously held status byte.
    ///
    /// Only the restorable bits are replaced. A restored `TFSLC` also proves the
    /// test completed since the last clear, so `TNCSLC` is dropped with it.
    pub fn apply_to(&self, previous: UdsStatus) -> UdsStatus {
        let mut merged =
            (previous & !UdsStatus::RESTORABLE) | (self.status & UdsStatus::RESTORABLE);
        if merged.contains(UdsStatus::TFSLC) {
            merged.remove(UdsStatus::TNCSLC);
        }
        merged
    }

    /// The part of a combined entry's status that belongs to its root-cause event.
    pub fn root_cause_projection(&self) -> Self {
        Self {
            status: self.status & (UdsStatus::CDTC | UdsStatus::TFSLC),
            aging: self.aging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bit_helpers() {
        let mut s = UdsStatus::empty().with(UdsStatus::TF).with(UdsStatus::CDTC);
        assert!(s.contains(UdsStatus::TF));
        assert!(s.contains(UdsStatus::CDTC));
        assert!(!s.contains(UdsStatus::PDTC));
        s.remove(UdsStatus::TF);
        assert_eq!(s, UdsStatus::CDTC);
        s.insert(UdsStatus::WIR);
        assert_eq!(s.bits(), 0x88);
        assert_eq!(s.to_string(), "0x88");
    }

    #[test]
    fn apply_keeps_unrelated_bits_and_drops_tncslc() {
        let previous = UdsStatus::TNCSLC | UdsStatus::TNCTOC | UdsStatus::PDTC | UdsStatus::WIR;
        let restored = RestoredStatus {
            status: UdsStatus::CDTC | UdsStatus::TFSLC,
            aging: AgingState::NotAging,
        };
        let merged = restored.apply_to(previous);
        assert_eq!(
            merged,
            UdsStatus::TNCTOC | UdsStatus::WIR | UdsStatus::CDTC | UdsStatus::TFSLC
        );
    }

    #[test]
    fn apply_ignores_non_restorable_bits() {
        let restored = RestoredStatus {
            status: UdsStatus::TF | UdsStatus::WIR,
            aging: AgingState::NotAging,
        };
        assert_eq!(restored.apply_to(UdsStatus::empty()), UdsStatus::empty());
    }

    #[test]
    fn root_cause_projection_drops_pending() {
        let restored = RestoredStatus {
            status: UdsStatus::PDTC | UdsStatus::CDTC | UdsStatus::TFSLC,
            aging: AgingState::Aging { counter: 2 },
        };
        let projected = restored.root_cause_projection();
        assert_eq!(projected.status, UdsStatus::CDTC | UdsStatus::TFSLC);
        assert_eq!(projected.aging, AgingState::Aging { counter: 2 });
    }
}
