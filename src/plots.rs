//! Plot registry reads and transfer requests

use serde::Serialize;
use std::sync::Arc;

use crate::chain::{Address, ChainClient, TxHash};
use crate::config::ClientConfig;
use crate::contracts::{ContractDirectory, ContractKind};
use crate::error::ServiceError;
use crate::notify::Notifier;
use crate::session::WalletSession;
use crate::timeout::guarded;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlotInfo {
    pub plot_id: u64,
    pub owner: Option<Address>,
    pub activated: bool,
    pub uri: String,
}

pub struct PlotRegistry {
    chain: Arc<dyn ChainClient>,
    contracts: Arc<ContractDirectory>,
    notifier: Arc<dyn Notifier>,
    lookup_timeout: std::time::Duration,
}

impl PlotRegistry {
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
            lookup_timeout: config.timeouts.plot_lookup,
        }
    }

    async fn contract(&self) -> Option<Address> {
        self.contracts
            .resolve(ContractKind::PlotRegistry)
            .await
            .address()
    }

    /// Current owner; `None` for unowned plots or when the lookup fails.
    pub async fn owner_of(&self, plot_id: u64) -> Option<Address> {
        let contract = self.contract().await?;
        match guarded(self.lookup_timeout, self.chain.owner_of_plot(contract, plot_id)).await {
            Ok(owner) if !owner.is_zero() => Some(owner),
            Ok(_) => None,
            Err(e) => {
                log::debug!("ownerOfPlot({}) failed: {}", plot_id, e);
                None
            }
        }
    }

    pub async fn is_activated(&self, plot_id: u64) -> bool {
        let Some(contract) = self.contract().await else {
            return false;
        };
        guarded(self.lookup_timeout, self.chain.activated(contract, plot_id))
            .await
            .unwrap_or_else(|e| {
                log::debug!("activated({}) failed: {}", plot_id, e);
                false
            })
    }

    pub async fn uri(&self, plot_id: u64) -> String {
        let Some(contract) = self.contract().await else {
            return String::new();
        };
        guarded(self.lookup_timeout, self.chain.uri(contract, plot_id))
            .await
            .unwrap_or_else(|e| {
                log::debug!("uri({}) failed: {}", plot_id, e);
                String::new()
            })
    }

    pub async fn plot_info(&self, plot_id: u64) -> PlotInfo {
        let (owner, activated, uri) = futures::join!(
            self.owner_of(plot_id),
            self.is_activated(plot_id),
            self.uri(plot_id)
        );
        PlotInfo {
            plot_id,
            owner,
            activated,
            uri,
        }
    }

    pub async fn is_owner(&self, session: &WalletSession, plot_id: u64) -> bool {
        let Some(address) = session.address else {
            return false;
        };
        self.owner_of(plot_id).await == Some(address)
    }

    pub async fn request_transfer(
        &self,
        session: &WalletSession,
        plot_id: u64,
        new_owner: Address,
    ) -> Result<TxHash, ServiceError> {
        let from = session.signer()?;
        if new_owner.is_zero() {
            return Err(ServiceError::InvalidInput(
                "new owner must not be the zero address".to_string(),
            ));
        }
        let contract = self.contract().await.ok_or_else(|| {
            ServiceError::ContractUnavailable(format!(
                "{} contract address not set",
                ContractKind::PlotRegistry.label()
            ))
        })?;

        let outcome = async {
            let hash = self
                .chain
                .request_transfer(contract, from, plot_id, new_owner)
                .await?;
            let receipt = self.chain.wait_for_receipt(&hash).await?;
            if !receipt.is_success() {
                return Err(ServiceError::TransactionFailed { hash });
            }
            Ok::<_, ServiceError>(hash)
        }
        .await;

        match outcome {
            Ok(hash) => {
                self.notifier
                    .success(&format!("Transfer requested for plot #{}", plot_id));
                Ok(hash)
            }
            Err(e) => {
                log::error!("Transfer request for plot #{} failed: {}", plot_id, e);
                self.notifier.error(&e.user_message("Failed to request transfer"));
                Err(e)
            }
        }
    }
}
