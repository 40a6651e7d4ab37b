//! Steam account identifiers.
//!
//! Sources disagree on how they spell a player's id: logs.tf keys players by
//! SteamID3 (`[U:1:22202]`), demos.tf and older tools use the legacy
//! `STEAM_0:0:11101` form, and the Steam Web API uses the 64-bit decimal. The
//! store always keys players by the 64-bit value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

/// 64-bit id of the first individual account in the public universe.
const INDIVIDUAL_BASE: u64 = 76_561_197_960_265_728;

/// A 64-bit Steam id for an individual account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SteamId(u64);

impl SteamId {
    /// Wrap an already validated 64-bit id.
    pub fn from_u64(id: u64) -> Result<Self, StoreError> {
        if id <= INDIVIDUAL_BASE || id - INDIVIDUAL_BASE > u32::MAX as u64 {
            return Err(StoreError::InvalidSteamId(id.to_string()));
        }
        Ok(Self(id))
    }

    pub fn from_account_id(account: u32) -> Self {
        Self(INDIVIDUAL_BASE + account as u64)
    }

    /// Parse any of the textual forms sources use.
    ///
    /// Accepted: `[U:1:N]`, `U:1:N`, `STEAM_X:Y:Z`, a 64-bit decimal, or a bare
    /// 32-bit account number.
    pub fn parse(input: &str) -> Result<Self, StoreError> {
        let invalid = || StoreError::InvalidSteamId(input.to_string());
        let trimmed = input.trim();

        let steam3 = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(trimmed);
        if let Some(account) = steam3.strip_prefix("U:1:") {
            let account: u32 = account.parse().map_err(|_| invalid())?;
            return Ok(Self::from_account_id(account));
        }

        if let Some(legacy) = trimmed.strip_prefix("STEAM_") {
            let mut parts = legacy.split(':');
            let (Some(_universe), Some(y), Some(z), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(invalid());
            };
            let y: u32 = y.parse().map_err(|_| invalid())?;
            let z: u32 = z.parse().map_err(|_| invalid())?;
            if y > 1 {
                return Err(invalid());
            }
            let account = z
                .checked_mul(2)
                .and_then(|v| v.checked_add(y))
                .ok_or_else(invalid)?;
            return Ok(Self::from_account_id(account));
        }

        let value: u64 = trimmed.parse().map_err(|_| invalid())?;
        if value > INDIVIDUAL_BASE {
            Self::from_u64(value).map_err(|_| invalid())
        } else if value <= u32::MAX as u64 {
            Ok(Self::from_account_id(value as u32))
        } else {
            Err(invalid())
        }
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn account_id(&self) -> u32 {
        (self.0 - INDIVIDUAL_BASE) as u32
    }

    /// SteamID3 rendering, as used by logs.tf.
    pub fn steam3(&self) -> String {
        format!("[U:1:{}]", self.account_id())
    }
}

impl FromStr for SteamId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<SteamId> for u64 {
    fn from(id: SteamId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_spelling_of_one_account() {
        let expected = SteamId::from_account_id(22202);
        assert_eq!(SteamId::parse("[U:1:22202]").unwrap(), expected);
        assert_eq!(SteamId::parse("U:1:22202").unwrap(), expected);
        assert_eq!(SteamId::parse("STEAM_0:0:11101").unwrap(), expected);
        assert_eq!(SteamId::parse("STEAM_1:0:11101").unwrap(), expected);
        assert_eq!(SteamId::parse("76561197960287930").unwrap(), expected);
        assert_eq!(SteamId::parse("22202").unwrap(), expected);
        assert_eq!(expected.as_u64(), 76_561_197_960_287_930);
        assert_eq!(expected.steam3(), "[U:1:22202]");
    }

    #[test]
    fn test_odd_legacy_id() {
        let id: SteamId = "STEAM_0:1:7".parse().unwrap();
        assert_eq!(id.account_id(), 15);
    }

    #[test]
    fn test_rejects_garbage() {
        for input in ["", "[U:1:]", "STEAM_0:2:5", "STEAM_0:0", "abc", "[G:1:5]"] {
            assert!(
                matches!(SteamId::parse(input), Err(StoreError::InvalidSteamId(_))),
                "{:?} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_rejects_out_of_range_u64() {
        assert!(SteamId::from_u64(5).is_err());
        assert!(SteamId::from_u64(INDIVIDUAL_BASE + u32::MAX as u64 + 1).is_err());
    }
}
