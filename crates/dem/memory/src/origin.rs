//! Translation of externally visible DTC origins to banks.

use std::fmt;

use dem_types::{BankId, BankKind, MemoryConfig};
use serde::{Deserialize, Serialize};

/// DTC origin code as carried by diagnostic requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DtcOrigin(pub u16);

impl DtcOrigin {
    pub const PRIMARY: Self = Self(0x0001);
    /// Mirror memory is not backed by a bank of this engine.
    pub const MIRROR: Self = Self(0x0002);
    pub const PERMANENT: Self = Self(0x0003);
    pub const USER_DEFINED_BASE: Self = Self(0x0100);

    /// Origin of user-defined memory `n`.
    pub const fn user_defined(n: u8) -> Self {
        Self(Self::USER_DEFINED_BASE.0 | n as u16)
    }
}

impl fmt::Display for DtcOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Map an origin to the configured bank; `None` for unknown or unbacked origins.
pub fn translate_origin(origin: DtcOrigin, config: &MemoryConfig) -> Option<BankId> {
    let wanted = match origin {
        DtcOrigin::PRIMARY => BankKind::Primary,
        DtcOrigin::PERMANENT => BankKind::Permanent,
        DtcOrigin(code) if code & 0xff00 == DtcOrigin::USER_DEFINED_BASE.0 => {
            BankKind::UserDefined((code & 0x00ff) as u8)
        }
        _ => return None,
    };
    config
        .banks
        .iter()
        .find(|bank| bank.kind == wanted)
        .map(|bank| bank.id)
}
