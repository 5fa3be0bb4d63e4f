//! Connected wallet session

use serde::{Deserialize, Serialize};

use crate::chain::Address;
use crate::error::ServiceError;

/// Which wallet is connected, and whether it can sign transactions.
///
/// A read-only session (address without signer) can load state but every
/// mutation fails with `NotConnected`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSession {
    pub address: Option<Address>,
    #[serde(default)]
    pub can_sign: bool,
}

impl WalletSession {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn read_only(address: Address) -> Self {
        Self {
            address: Some(address),
            can_sign: false,
        }
    }

    pub fn signing(address: Address) -> Self {
        Self {
            address: Some(address),
            can_sign: true,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.address.is_some()
    }

    /// Address allowed to submit transactions.
    pub fn signer(&self) -> Result<Address, ServiceError> {
        match self.address {
            Some(address) if self.can_sign => Ok(address),
            _ => Err(ServiceError::NotConnected(
                "no signing wallet in session".to_string(),
            )),
        }
    }
}
