//! Persisted record models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last successfully selected subnet.
pub const SELECTED_SUBNET_KEY: &str = "selected_subnet";

/// Contract address table discovered from the backend or address files.
pub const CONTRACT_ADDRESSES_KEY: &str = "contract_addresses";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persisted<T> {
    pub saved_at: DateTime<Utc>,
    pub value: T,
}

impl<T> Persisted<T> {
    pub fn now(value: T) -> Self {
        Self {
            saved_at: Utc::now(),
            value,
        }
    }
}
