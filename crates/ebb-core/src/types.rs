//! Primitive engine types: heights, epochs, amounts, accounts.
//!
//! Heights and epochs are `u64`; balances are `u128` so that any realistic
//! supply fits with room for intermediate sums. All balance arithmetic in the
//! engine is checked.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AccountIdError;

/// A block height reported by the host chain.
pub type BlockHeight = u64;

/// Sequential epoch index, starting at 0 for the configured initial block.
pub type Epoch = u64;

/// A token amount in base units.
pub type Amount = u128;

/// A 20-byte account identifier.
///
/// Serialized as a lowercase hex string (optionally `0x`-prefixed on input).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    /// The zero account.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| AccountIdError::InvalidHex(e.to_string()))?;
        let array: [u8; 20] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| AccountIdError::InvalidLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_string()
    }
}

impl From<[u8; 20]> for AccountId {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

/// Expiry status of an epoch relative to a block height.
///
/// Never stored; always recomputed from the window configuration and the
/// height being asked about, so it cannot go stale as the chain advances.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EpochState {
    /// The epoch has not begun at this height.
    Future,
    /// Fully inside the window. `age` 0 is the current epoch.
    Valid { age: u8 },
    /// The one epoch straddling the lower edge of the window: some of its
    /// entries are still live, older ones have expired.
    Expiring,
    /// Every entry in the epoch has expired.
    Expired,
}

impl EpochState {
    pub fn is_current(&self) -> bool {
        matches!(self, Self::Valid { age: 0 })
    }

    /// Whether the epoch can still contribute balance.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Valid { .. } | Self::Expiring)
    }
}
