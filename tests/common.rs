//! Common test utilities for client integration tests
//!
//! This module provides shared test infrastructure including:
//! - An in-memory `ChainClient` with scriptable reads and receipts
//! - A fake subnet directory standing in for the backend
//! - A notifier that records every notice
//! - Temp-dir storage and short-deadline configuration
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use chaos_star_client::backend::{
    ParsedDescription, RpcUrls, SubnetDescription, SubnetDirectory, SubnetSummary,
    WalletConnection,
};
use chaos_star_client::chain::{
    abi, Account, AccountId, AccountType, Address, ChainClient, DigitalIdentity, IdentityProfile,
    LogEntry, NewAccount, TxHash, TxReceipt, TxStatus, ACCOUNT_CREATED_EVENT, B256,
};
use chaos_star_client::config::{ClientConfig, ConfiguredAddresses, Timeouts};
use chaos_star_client::contracts::ContractDirectory;
use chaos_star_client::error::{BackendError, ChainError, DecodeError};
use chaos_star_client::notify::{NoticeLevel, Notifier};
use chaos_star_client::storage::Storage;
use chaos_star_client::{AccountService, IdentityResolver, SubnetSession};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn addr(n: u8) -> Address {
    Address::repeat_byte(n)
}

pub fn registry() -> Address {
    addr(0xa1)
}

pub fn digital_id_contract() -> Address {
    addr(0xd1)
}

pub fn plot_contract() -> Address {
    addr(0xb1)
}

pub fn wallet() -> Address {
    addr(0x11)
}

pub fn reverted(reason: &str) -> ChainError {
    ChainError::Rpc {
        code: 3,
        message: format!("execution reverted: {}", reason),
        reason: Some(reason.to_string()),
    }
}

pub fn account(id: AccountId, owner: Address) -> Account {
    Account {
        id,
        name: format!("Account {}", id),
        wallet_address: owner,
        account_type: AccountType::Personal,
        owner_wallet: owner,
        description: String::new(),
        parent_account: None,
        is_active: true,
        created_at: chrono::DateTime::default(),
        updated_at: chrono::DateTime::default(),
    }
}

pub fn identity(active: bool) -> DigitalIdentity {
    DigitalIdentity {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@chaos.star".to_string(),
        avatar_uri: String::new(),
        registered_at: chrono::DateTime::default(),
        active,
    }
}

pub fn profile() -> IdentityProfile {
    IdentityProfile {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: "ada@chaos.star".to_string(),
        avatar_uri: String::new(),
    }
}

pub fn new_account(name: &str) -> NewAccount {
    NewAccount {
        name: name.to_string(),
        wallet_address: wallet(),
        account_type: AccountType::Business,
        description: "test".to_string(),
        parent_account_id: None,
    }
}

/// `AccountCreated` log as the registry would emit it.
pub fn account_created_log(emitter: Address, id: AccountId) -> LogEntry {
    let mut id_topic = B256::ZERO;
    id_topic.0[24..].copy_from_slice(&id.to_be_bytes());
    LogEntry {
        address: emitter,
        topics: vec![abi::event_topic(ACCOUNT_CREATED_EVENT), id_topic],
        data: Vec::new(),
    }
}

// ============================================================================
// Mock chain
// ============================================================================

pub struct MockChain {
    /// Deployed bytecode; addresses not listed have none
    pub code: Mutex<HashMap<Address, Vec<u8>>>,
    pub code_error: Mutex<Option<ChainError>>,
    pub account_ids: Mutex<Result<Vec<AccountId>, ChainError>>,
    pub primary: Mutex<Result<AccountId, ChainError>>,
    /// Ids not listed fail with a revert
    pub accounts: Mutex<HashMap<AccountId, Account>>,
    /// Ids whose record fetch never completes
    pub hanging_accounts: Mutex<HashSet<AccountId>>,
    pub hang_account_ids: Mutex<bool>,
    /// Addresses not listed decode as empty
    pub identities: Mutex<HashMap<Address, Result<DigitalIdentity, ChainError>>>,
    pub total_accounts: Mutex<u64>,
    pub receipt_status: Mutex<TxStatus>,
    pub receipt_logs: Mutex<Vec<LogEntry>>,
    pub write_error: Mutex<Option<ChainError>>,
    /// Method names of submitted writes, in order
    pub writes: Mutex<Vec<String>>,
    /// Method names of reads, in order
    pub reads: Mutex<Vec<String>>,
    next_tx: Mutex<u64>,
}

impl MockChain {
    pub fn new() -> Self {
        let mut code = HashMap::new();
        code.insert(registry(), vec![0x60, 0x80]);
        code.insert(digital_id_contract(), vec![0x60, 0x80]);
        code.insert(plot_contract(), vec![0x60, 0x80]);

        Self {
            code: Mutex::new(code),
            code_error: Mutex::new(None),
            account_ids: Mutex::new(Ok(Vec::new())),
            primary: Mutex::new(Ok(0)),
            accounts: Mutex::new(HashMap::new()),
            hanging_accounts: Mutex::new(HashSet::new()),
            hang_account_ids: Mutex::new(false),
            identities: Mutex::new(HashMap::new()),
            total_accounts: Mutex::new(0),
            receipt_status: Mutex::new(TxStatus::Success),
            receipt_logs: Mutex::new(Vec::new()),
            write_error: Mutex::new(None),
            writes: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            next_tx: Mutex::new(1),
        }
    }

    /// Register `ids` as owned by the test wallet, with records.
    pub fn with_accounts(self, ids: &[AccountId]) -> Self {
        *self.account_ids.lock().unwrap() = Ok(ids.to_vec());
        {
            let mut accounts = self.accounts.lock().unwrap();
            for &id in ids {
                accounts.insert(id, account(id, wallet()));
            }
        }
        self
    }

    pub fn undeploy(&self, address: Address) {
        self.code.lock().unwrap().remove(&address);
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    fn read(&self, method: &str) {
        self.reads.lock().unwrap().push(method.to_string());
    }

    fn submit(&self, method: &str) -> Result<TxHash, ChainError> {
        if let Some(e) = self.write_error.lock().unwrap().clone() {
            return Err(e);
        }
        self.writes.lock().unwrap().push(method.to_string());
        let mut next = self.next_tx.lock().unwrap();
        let hash = TxHash(format!("0x{:064x}", *next));
        *next += 1;
        Ok(hash)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn get_code(&self, address: Address) -> Result<Vec<u8>, ChainError> {
        self.read("getCode");
        if let Some(e) = self.code_error.lock().unwrap().clone() {
            return Err(e);
        }
        Ok(self
            .code
            .lock()
            .unwrap()
            .get(&address)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_accounts_by_wallet(
        &self,
        _registry: Address,
        _wallet: Address,
    ) -> Result<Vec<AccountId>, ChainError> {
        self.read("getAccountsByWallet");
        let hang = *self.hang_account_ids.lock().unwrap();
        if hang {
            std::future::pending::<()>().await;
        }
        self.account_ids.lock().unwrap().clone()
    }

    async fn get_account(&self, _registry: Address, id: AccountId) -> Result<Account, ChainError> {
        self.read("getAccount");
        let hang = self.hanging_accounts.lock().unwrap().contains(&id);
        if hang {
            std::future::pending::<()>().await;
        }
        self.accounts
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| reverted("Account does not exist"))
    }

    async fn get_primary_account(
        &self,
        _registry: Address,
        _wallet: Address,
    ) -> Result<AccountId, ChainError> {
        self.read("getPrimaryAccount");
        self.primary.lock().unwrap().clone()
    }

    async fn total_accounts(&self, _registry: Address) -> Result<u64, ChainError> {
        self.read("totalAccounts");
        Ok(*self.total_accounts.lock().unwrap())
    }

    async fn create_account(
        &self,
        _registry: Address,
        _from: Address,
        _account: &NewAccount,
    ) -> Result<TxHash, ChainError> {
        self.submit("createAccount")
    }

    async fn update_account(
        &self,
        _registry: Address,
        _from: Address,
        _id: AccountId,
        _name: &str,
        _description: &str,
    ) -> Result<TxHash, ChainError> {
        self.submit("updateAccount")
    }

    async fn deactivate_account(
        &self,
        _registry: Address,
        _from: Address,
        _id: AccountId,
    ) -> Result<TxHash, ChainError> {
        self.submit("deactivateAccount")
    }

    async fn identity_of(
        &self,
        _contract: Address,
        user: Address,
    ) -> Result<DigitalIdentity, ChainError> {
        self.read("ids");
        self.identities
            .lock()
            .unwrap()
            .get(&user)
            .cloned()
            .unwrap_or(Err(ChainError::Decode(DecodeError::Empty)))
    }

    async fn register_id(
        &self,
        _contract: Address,
        from: Address,
        _profile: &IdentityProfile,
    ) -> Result<TxHash, ChainError> {
        let hash = self.submit("registerID")?;
        if *self.receipt_status.lock().unwrap() == TxStatus::Success {
            self.identities.lock().unwrap().insert(from, Ok(identity(true)));
        }
        Ok(hash)
    }

    async fn deactivate_id(&self, _contract: Address, from: Address) -> Result<TxHash, ChainError> {
        let hash = self.submit("deactivateID")?;
        if *self.receipt_status.lock().unwrap() == TxStatus::Success {
            self.identities.lock().unwrap().insert(from, Ok(identity(false)));
        }
        Ok(hash)
    }

    async fn owner_of_plot(&self, _contract: Address, plot_id: u64) -> Result<Address, ChainError> {
        self.read("ownerOfPlot");
        match plot_id {
            1 => Ok(wallet()),
            2 => Ok(Address::ZERO),
            _ => Err(reverted("Plot does not exist")),
        }
    }

    async fn activated(&self, _contract: Address, plot_id: u64) -> Result<bool, ChainError> {
        self.read("activated");
        Ok(plot_id == 1)
    }

    async fn uri(&self, _contract: Address, plot_id: u64) -> Result<String, ChainError> {
        self.read("uri");
        Ok(format!("ipfs://plots/{}", plot_id))
    }

    async fn request_transfer(
        &self,
        _contract: Address,
        _from: Address,
        _plot_id: u64,
        _new_owner: Address,
    ) -> Result<TxHash, ChainError> {
        self.submit("requestTransfer")
    }

    async fn wait_for_receipt(&self, hash: &TxHash) -> Result<TxReceipt, ChainError> {
        Ok(TxReceipt {
            hash: hash.clone(),
            status: *self.receipt_status.lock().unwrap(),
            block_number: Some(1),
            logs: self.receipt_logs.lock().unwrap().clone(),
        })
    }
}

// ============================================================================
// Fake subnet directory
// ============================================================================

pub struct FakeSubnets {
    pub subnets: Mutex<Result<Vec<SubnetSummary>, u16>>,
    /// Names not listed answer HTTP 500
    pub descriptions: Mutex<HashMap<String, SubnetDescription>>,
    pub describe_calls: Mutex<Vec<String>>,
}

impl FakeSubnets {
    pub fn new(names: &[&str]) -> Self {
        Self {
            subnets: Mutex::new(Ok(names.iter().map(|n| SubnetSummary::named(*n)).collect())),
            descriptions: Mutex::new(HashMap::new()),
            describe_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn describe_ok(self, name: &str) -> Self {
        self.descriptions
            .lock()
            .unwrap()
            .insert(name.to_string(), described(name));
        self
    }

    pub fn set_description(&self, name: &str, description: SubnetDescription) {
        self.descriptions
            .lock()
            .unwrap()
            .insert(name.to_string(), description);
    }

    pub fn describe_calls(&self) -> Vec<String> {
        self.describe_calls.lock().unwrap().clone()
    }
}

/// A successful describe response for `name`.
pub fn described(name: &str) -> SubnetDescription {
    SubnetDescription {
        success: true,
        subnet_name: Some(name.to_string()),
        parsed: Some(ParsedDescription {
            rpc_urls: Some(RpcUrls {
                localhost: Some(format!("http://127.0.0.1:9650/ext/bc/{}/rpc", name)),
            }),
            wallet_connection: Some(WalletConnection {
                network_rpc_url: Some("http://10.0.0.1:9650/rpc".to_string()),
            }),
            avalanche_blockchain_id: Some(format!("{}-chain", name)),
            avalanche_subnet_id: Some(format!("{}-subnet", name)),
        }),
        error: None,
    }
}

#[async_trait]
impl SubnetDirectory for FakeSubnets {
    async fn list_subnets(&self) -> Result<Vec<SubnetSummary>, BackendError> {
        self.subnets
            .lock()
            .unwrap()
            .clone()
            .map_err(|status| BackendError::Status {
                endpoint: "/avalanche-info/subnets".to_string(),
                status,
            })
    }

    async fn describe_subnet(&self, name: &str) -> Result<SubnetDescription, BackendError> {
        self.describe_calls.lock().unwrap().push(name.to_string());
        self.descriptions
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| BackendError::Status {
                endpoint: format!("/avalanche-info/subnet/{}/describe", name),
                status: 500,
            })
    }
}

// ============================================================================
// Recording notifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn successes(&self) -> Vec<String> {
        self.with_level(NoticeLevel::Success)
    }

    pub fn errors(&self) -> Vec<String> {
        self.with_level(NoticeLevel::Error)
    }

    fn with_level(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

// ============================================================================
// Test environment
// ============================================================================

/// Short deadlines so timeout paths finish quickly.
pub fn test_config(storage_dir: &std::path::Path) -> ClientConfig {
    ClientConfig {
        storage_dir: storage_dir.to_path_buf(),
        addresses_dir: storage_dir.join("public"),
        contracts: ConfiguredAddresses {
            account_registry: Some(registry()),
            digital_id: Some(digital_id_contract()),
            plot_registry: Some(plot_contract()),
            land: None,
            treasury: None,
        },
        timeouts: Timeouts {
            account_ids: Duration::from_millis(200),
            primary_account: Duration::from_millis(200),
            account_record: Duration::from_millis(200),
            code_probe: Duration::from_millis(200),
            identity_lookup: Duration::from_millis(200),
            plot_lookup: Duration::from_millis(200),
            backend_addresses: Duration::from_millis(200),
            address_files: Duration::from_millis(200),
        },
        ..ClientConfig::default()
    }
}

/// Test environment with automatic cleanup
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub config: ClientConfig,
    pub storage: Storage,
    pub chain: Arc<MockChain>,
    pub notifier: Arc<RecordingNotifier>,
    pub contracts: Arc<ContractDirectory>,
}

impl TestEnvironment {
    pub fn new(chain: MockChain) -> anyhow::Result<Self> {
        Self::with_config(chain, |_| {})
    }

    pub fn with_config(
        chain: MockChain,
        adjust: impl FnOnce(&mut ClientConfig),
    ) -> anyhow::Result<Self> {
        init_logging();
        let temp_dir = TempDir::new()?;
        log::info!("📁 Test directory: {:?}", temp_dir.path());

        let mut config = test_config(temp_dir.path());
        adjust(&mut config);
        let storage = Storage::new_with_base_dir(temp_dir.path().join("storage"));
        let contracts = Arc::new(ContractDirectory::new(&config, storage.clone(), Vec::new()));

        Ok(Self {
            temp_dir,
            config,
            storage,
            chain: Arc::new(chain),
            notifier: Arc::new(RecordingNotifier::default()),
            contracts,
        })
    }

    pub fn accounts(&self) -> AccountService {
        AccountService::new(
            self.chain.clone(),
            self.contracts.clone(),
            self.notifier.clone(),
            &self.config,
        )
    }

    pub fn identity(&self) -> IdentityResolver {
        IdentityResolver::new(
            self.chain.clone(),
            self.contracts.clone(),
            self.notifier.clone(),
            &self.config,
        )
    }

    pub fn subnet(&self, directory: Arc<FakeSubnets>) -> SubnetSession {
        SubnetSession::new(
            directory,
            self.storage.clone(),
            self.notifier.clone(),
            &self.config,
        )
    }
}
