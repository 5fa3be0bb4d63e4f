/// Client Manager - Composition Root
///
/// Builds configuration, storage, the contract directory and every service
/// once, owns them, and exposes session-scoped operations to the API layer.
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::accounts::{AccountService, AccountSnapshot};
use crate::backend::{BackendClient, SubnetDirectory};
use crate::chain::{
    AccountId, Address, ChainClient, EvmChainClient, IdentityProfile, NewAccount, TxHash,
};
use crate::config::ClientConfig;
use crate::contracts::{AddressSource, ContractAddresses, ContractDirectory, FileAddressSource};
use crate::error::ServiceError;
use crate::identity::{IdentityResolver, IdentityState};
use crate::notify::{BroadcastNotifier, Notice, Notifier};
use crate::plots::{PlotInfo, PlotRegistry};
use crate::session::WalletSession;
use crate::storage::Storage;
use crate::subnet::SubnetSession;

const NOTICE_HISTORY: usize = 64;

#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session: WalletSession,
    pub accounts: AccountSnapshot,
    pub identity: IdentityState,
}

pub struct ClientManager {
    pub config: ClientConfig,
    pub storage: Storage,
    pub contracts: Arc<ContractDirectory>,
    pub accounts: AccountService,
    pub identity: IdentityResolver,
    pub plots: PlotRegistry,
    pub subnet: SubnetSession,
    backend: Arc<BackendClient>,
    notifier: Arc<BroadcastNotifier>,
    session: RwLock<WalletSession>,
}

impl ClientManager {
    // ============================================================================
    // Constructor
    // ============================================================================

    pub fn new() -> Result<Self, ServiceError> {
        // Load configuration from environment
        let config = ClientConfig::from_env();
        let storage = Storage::new_with_base_dir(config.storage_dir.clone());
        Self::new_with_storage(config, storage)
    }

    /// Create ClientManager with custom storage (for testing)
    pub fn new_with_storage(config: ClientConfig, storage: Storage) -> Result<Self, ServiceError> {
        let backend = Arc::new(
            BackendClient::new(&config.api_url)?
                .with_address_deadline(config.timeouts.backend_addresses),
        );
        let chain: Arc<dyn ChainClient> = Arc::new(
            EvmChainClient::new(config.rpc_url.clone())
                .with_receipt_polling(config.receipt_poll_attempts, config.receipt_poll_interval),
        );

        let files = config.timeouts.address_files;
        let sources = vec![
            backend.clone() as Arc<dyn AddressSource>,
            Arc::new(FileAddressSource::new(
                config.addresses_dir.join("addresses.json"),
                files,
            )) as Arc<dyn AddressSource>,
            Arc::new(FileAddressSource::new(
                config.addresses_dir.join("deployments").join("addresses.json"),
                files,
            )) as Arc<dyn AddressSource>,
        ];

        let subnets: Arc<dyn SubnetDirectory> = backend.clone();
        Ok(Self::with_components(
            config, storage, chain, subnets, sources, backend,
        ))
    }

    /// Assemble from explicit collaborators.
    pub fn with_components(
        config: ClientConfig,
        storage: Storage,
        chain: Arc<dyn ChainClient>,
        subnets: Arc<dyn SubnetDirectory>,
        sources: Vec<Arc<dyn AddressSource>>,
        backend: Arc<BackendClient>,
    ) -> Self {
        let notifier = Arc::new(BroadcastNotifier::new(NOTICE_HISTORY));
        let notify: Arc<dyn Notifier> = notifier.clone();

        let contracts = Arc::new(ContractDirectory::new(&config, storage.clone(), sources));

        let accounts =
            AccountService::new(chain.clone(), contracts.clone(), notify.clone(), &config);
        let identity =
            IdentityResolver::new(chain.clone(), contracts.clone(), notify.clone(), &config);
        let plots = PlotRegistry::new(chain, contracts.clone(), notify.clone(), &config);
        let subnet = SubnetSession::new(subnets, storage.clone(), notify, &config);

        Self {
            config,
            storage,
            contracts,
            accounts,
            identity,
            plots,
            subnet,
            backend,
            notifier,
            session: RwLock::new(WalletSession::disconnected()),
        }
    }

    /// Startup reconciliation: contract discovery and subnet restore/confirm.
    pub async fn start(&self) {
        futures::join!(
            async {
                self.contracts.initialize().await;
            },
            self.subnet.start()
        );
    }

    // ============================================================================
    // Session
    // ============================================================================

    pub async fn session(&self) -> WalletSession {
        *self.session.read().await
    }

    /// Switch to `session` and reconcile accounts and identity for it.
    pub async fn connect(&self, session: WalletSession) -> SessionView {
        log::info!(
            "Session connected: {:?} (signing: {})",
            session.address,
            session.can_sign
        );
        *self.session.write().await = session;
        self.reconcile(session).await
    }

    pub async fn disconnect(&self) {
        let previous = std::mem::take(&mut *self.session.write().await);
        if let Some(address) = previous.address {
            log::info!("Session disconnected: {}", address);
            self.identity.forget(address).await;
        }
        self.accounts.clear().await;
    }

    pub async fn session_view(&self) -> SessionView {
        let session = self.session().await;
        let identity = match session.address {
            Some(address) => self.identity.state_for(address).await,
            None => IdentityState::Absent,
        };
        SessionView {
            session,
            accounts: self.accounts.snapshot().await,
            identity,
        }
    }

    async fn reconcile(&self, session: WalletSession) -> SessionView {
        let (accounts, identity) = futures::join!(
            self.accounts.load_accounts(&session),
            self.identity.check_digital_id(&session, None)
        );
        SessionView {
            session,
            accounts,
            identity,
        }
    }

    // ============================================================================
    // Accounts
    // ============================================================================

    pub async fn load_accounts(&self) -> AccountSnapshot {
        let session = self.session().await;
        self.accounts.load_accounts(&session).await
    }

    pub async fn create_account(&self, account: NewAccount) -> Result<AccountId, ServiceError> {
        let session = self.session().await;
        self.accounts.create_account(&session, account).await
    }

    pub async fn update_account(
        &self,
        id: AccountId,
        name: &str,
        description: &str,
    ) -> Result<TxHash, ServiceError> {
        let session = self.session().await;
        self.accounts
            .update_account(&session, id, name, description)
            .await
    }

    pub async fn deactivate_account(&self, id: AccountId) -> Result<TxHash, ServiceError> {
        let session = self.session().await;
        self.accounts.deactivate_account(&session, id).await
    }

    // ============================================================================
    // Identity
    // ============================================================================

    pub async fn check_digital_id(&self, address: Option<Address>) -> IdentityState {
        let session = self.session().await;
        self.identity.check_digital_id(&session, address).await
    }

    pub async fn register_digital_id(&self, profile: IdentityProfile) -> Result<TxHash, ServiceError> {
        let session = self.session().await;
        self.identity.register_digital_id(&session, profile).await
    }

    pub async fn deactivate_digital_id(&self) -> Result<TxHash, ServiceError> {
        let session = self.session().await;
        self.identity.deactivate_digital_id(&session).await
    }

    // ============================================================================
    // Plots
    // ============================================================================

    pub async fn plot_info(&self, plot_id: u64) -> (PlotInfo, bool) {
        let session = self.session().await;
        futures::join!(
            self.plots.plot_info(plot_id),
            self.plots.is_owner(&session, plot_id)
        )
    }

    pub async fn request_plot_transfer(
        &self,
        plot_id: u64,
        new_owner: Address,
    ) -> Result<TxHash, ServiceError> {
        let session = self.session().await;
        self.plots
            .request_transfer(&session, plot_id, new_owner)
            .await
    }

    // ============================================================================
    // Contracts and backend passthrough
    // ============================================================================

    pub async fn contract_addresses(&self) -> ContractAddresses {
        self.contracts.addresses().await
    }

    pub async fn refresh_contracts(&self) -> bool {
        self.contracts.refresh().await
    }

    pub async fn network_status(&self) -> Result<serde_json::Value, ServiceError> {
        Ok(self.backend.network_status().await?)
    }

    pub async fn subnet_stats(
        &self,
        name: &str,
        network: Option<&str>,
    ) -> Result<serde_json::Value, ServiceError> {
        Ok(self.backend.subnet_stats(name, network).await?)
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notifier.recent()
    }
}
