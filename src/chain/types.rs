//! Chain-facing value types

pub use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Registry account id. Ids wider than 64 bits are not representable and are
/// skipped where they appear.
pub type AccountId = u64;

/// Transaction hash returned by a submitted write; the handle to await.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Success,
    Reverted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub hash: TxHash,
    pub status: TxStatus,
    pub block_number: Option<u64>,
    pub logs: Vec<LogEntry>,
}

impl TxReceipt {
    pub fn is_success(&self) -> bool {
        self.status == TxStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Personal,
    Cluster,
    Joint,
    Business,
    Sub,
}

impl AccountType {
    /// Map the registry's `uint8` discriminant; unknown values read as personal.
    pub fn from_index(index: u64) -> Self {
        match index {
            1 => Self::Cluster,
            2 => Self::Joint,
            3 => Self::Business,
            4 => Self::Sub,
            _ => Self::Personal,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Personal => 0,
            Self::Cluster => 1,
            Self::Joint => 2,
            Self::Business => 3,
            Self::Sub => 4,
        }
    }
}

/// Account record as stored by the account registry contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub wallet_address: Address,
    pub account_type: AccountType,
    pub owner_wallet: Address,
    pub description: String,
    pub parent_account: Option<Address>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Arguments of `createAccount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub wallet_address: Address,
    pub account_type: AccountType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_account_id: Option<AccountId>,
}

/// Digital ID record keyed by wallet address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalIdentity {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub avatar_uri: String,
    pub registered_at: DateTime<Utc>,
    pub active: bool,
}

/// Arguments of `registerID`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub avatar_uri: String,
}

/// Contract timestamps are unix seconds; out-of-range values clamp to the epoch.
pub fn unix_time(secs: U256) -> DateTime<Utc> {
    u64::try_from(secs)
        .ok()
        .and_then(|secs| i64::try_from(secs).ok())
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_default()
}
