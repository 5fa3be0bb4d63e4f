//! Digital identity resolution
//!
//! Each address moves `Unresolved -> Checking -> Found | Absent`. The
//! contract's bytecode is probed before any query, and an undecodable answer
//! reads as "not registered". Only active records count as found.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::chain::{Address, ChainClient, DigitalIdentity, IdentityProfile, TxHash};
use crate::config::{ClientConfig, Timeouts};
use crate::contracts::{ContractDirectory, ContractKind};
use crate::error::ServiceError;
use crate::notify::Notifier;
use crate::session::WalletSession;
use crate::timeout::guarded;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "identity", rename_all = "snake_case")]
pub enum IdentityState {
    Unresolved,
    Checking,
    Found(DigitalIdentity),
    Absent,
}

impl IdentityState {
    pub fn identity(&self) -> Option<&DigitalIdentity> {
        match self {
            Self::Found(identity) => Some(identity),
            _ => None,
        }
    }
}

#[derive(Default)]
struct IdentityBook {
    states: HashMap<Address, IdentityState>,
    last_error: Option<String>,
}

pub struct IdentityResolver {
    chain: Arc<dyn ChainClient>,
    contracts: Arc<ContractDirectory>,
    notifier: Arc<dyn Notifier>,
    timeouts: Timeouts,
    book: RwLock<IdentityBook>,
}

impl IdentityResolver {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        contracts: Arc<ContractDirectory>,
        notifier: Arc<dyn Notifier>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            chain,
            contracts,
            notifier,
            timeouts: config.timeouts.clone(),
            book: RwLock::new(IdentityBook::default()),
        }
    }

    /// Resolve the identity of `address`, or of the session wallet when
    /// `address` is `None`. Never fails; unexpected read errors are kept in
    /// [`IdentityResolver::last_error`].
    pub async fn check_digital_id(
        &self,
        session: &WalletSession,
        address: Option<Address>,
    ) -> IdentityState {
        let target = match (session.is_connected(), address.or(session.address)) {
            (true, Some(target)) => target,
            _ => return IdentityState::Absent,
        };

        let Some(contract) = self
            .contracts
            .resolve(ContractKind::DigitalId)
            .await
            .address()
        else {
            return self.settle(target, IdentityState::Absent).await;
        };

        {
            let mut book = self.book.write().await;
            book.states.insert(target, IdentityState::Checking);
            book.last_error = None;
        }

        match guarded(self.timeouts.code_probe, self.chain.get_code(contract)).await {
            Ok(code) if code.is_empty() => {
                log::debug!("Digital ID contract not deployed at: {}", contract);
                return self.settle(target, IdentityState::Absent).await;
            }
            Ok(_) => {}
            Err(e) => {
                log::debug!("Failed to verify Digital ID contract code: {}", e);
                return self.settle(target, IdentityState::Absent).await;
            }
        }

        let state = match guarded(
            self.timeouts.identity_lookup,
            self.chain.identity_of(contract, target),
        )
        .await
        {
            Ok(identity) if identity.active => IdentityState::Found(identity),
            Ok(_) => IdentityState::Absent,
            Err(ServiceError::Chain(e)) if e.is_decode_absent() => {
                log::debug!("Digital ID contract returned no record for {}: {}", target, e);
                IdentityState::Absent
            }
            Err(e) => {
                log::error!("Error checking digital ID for {}: {}", target, e);
                self.book.write().await.last_error = Some(e.to_string());
                IdentityState::Absent
            }
        };

        self.settle(target, state).await
    }

    async fn settle(&self, address: Address, state: IdentityState) -> IdentityState {
        self.book
            .write()
            .await
            .states
            .insert(address, state.clone());
        state
    }

    pub async fn state_for(&self, address: Address) -> IdentityState {
        self.book
            .read()
            .await
            .states
            .get(&address)
            .cloned()
            .unwrap_or(IdentityState::Unresolved)
    }

    pub async fn has_digital_id(&self, address: Address) -> bool {
        matches!(self.state_for(address).await, IdentityState::Found(_))
    }

    pub async fn last_error(&self) -> Option<String> {
        self.book.read().await.last_error.clone()
    }

    pub async fn forget(&self, address: Address) {
        self.book.write().await.states.remove(&address);
    }

    /// Register an identity for the session wallet.
    pub async fn register_digital_id(
        &self,
        session: &WalletSession,
        profile: IdentityProfile,
    ) -> Result<TxHash, ServiceError> {
        let from = session.signer()?;
        if profile.first_name.trim().is_empty()
            || profile.last_name.trim().is_empty()
            || profile.email.trim().is_empty()
        {
            return Err(ServiceError::InvalidInput(
                "first name, last name and email are required".to_string(),
            ));
        }

        let outcome = async {
            let contract = self.deployed_contract().await?;
            let hash = self.chain.register_id(contract, from, &profile).await?;
            self.notifier
                .success(&format!("Transaction sent! Hash: {}...", short_hash(&hash)));
            self.confirm(&hash).await?;
            Ok::<_, ServiceError>(hash)
        }
        .await;

        self.finish(
            session,
            from,
            outcome,
            "Digital ID registered successfully on Chaos Star Network!",
            "Failed to register Digital ID on Chaos Star Network",
        )
        .await
    }

    pub async fn deactivate_digital_id(
        &self,
        session: &WalletSession,
    ) -> Result<TxHash, ServiceError> {
        let from = session.signer()?;

        let outcome = async {
            let contract = self.deployed_contract().await?;
            let hash = self.chain.deactivate_id(contract, from).await?;
            self.confirm(&hash).await?;
            Ok::<_, ServiceError>(hash)
        }
        .await;

        self.finish(
            session,
            from,
            outcome,
            "Digital ID deactivated on Chaos Star Network",
            "Failed to deactivate Digital ID",
        )
        .await
    }

    /// Resolved address with bytecode behind it.
    async fn deployed_contract(&self) -> Result<Address, ServiceError> {
        let contract = self
            .contracts
            .resolve(ContractKind::DigitalId)
            .await
            .address()
            .ok_or_else(|| {
                ServiceError::ContractUnavailable(
                    "Digital ID contract not available on Chaos Star Network".to_string(),
                )
            })?;

        let code = guarded(self.timeouts.code_probe, self.chain.get_code(contract)).await?;
        if code.is_empty() {
            return Err(ServiceError::ContractUnavailable(
                "Digital ID contract not deployed on Chaos Star Network".to_string(),
            ));
        }
        Ok(contract)
    }

    async fn confirm(&self, hash: &TxHash) -> Result<(), ServiceError> {
        let receipt = self.chain.wait_for_receipt(hash).await?;
        if !receipt.is_success() {
            return Err(ServiceError::TransactionFailed { hash: hash.clone() });
        }
        Ok(())
    }

    async fn finish(
        &self,
        session: &WalletSession,
        wallet: Address,
        outcome: Result<TxHash, ServiceError>,
        success: &str,
        fallback: &str,
    ) -> Result<TxHash, ServiceError> {
        match outcome {
            Ok(hash) => {
                self.notifier.success(success);
                self.check_digital_id(session, Some(wallet)).await;
                Ok(hash)
            }
            Err(e) => {
                let message = e.user_message(fallback);
                log::error!("{}: {}", fallback, e);
                self.book.write().await.last_error = Some(message.clone());
                self.notifier.error(&message);
                Err(e)
            }
        }
    }
}

fn short_hash(hash: &TxHash) -> &str {
    hash.0.get(..10).unwrap_or(&hash.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash() {
        assert_eq!(short_hash(&TxHash("0xabcdef0123456789".to_string())), "0xabcdef01");
        assert_eq!(short_hash(&TxHash("0x12".to_string())), "0x12");
    }
}
