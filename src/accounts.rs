//! Account reconciliation
//!
//! Loads the accounts a wallet owns from the account registry, along with its
//! primary-account pointer, and puts a synthetic main-wallet entry in front
//! of them. Reads are soft: anything that fails shrinks the snapshot instead
//! of failing the load. Mutations are strict and report through the
//! notifier.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::busy::{is_busy, Busy};
use crate::chain::{
    account_created_id, Account, AccountId, Address, ChainClient, NewAccount, TxHash, TxReceipt,
};
use crate::config::{ClientConfig, Timeouts};
use crate::contracts::{ContractDirectory, ContractKind, Resolution};
use crate::error::ServiceError;
use crate::notify::Notifier;
use crate::session::WalletSession;
use crate::timeout::guarded;

/// The connected wallet itself, listed ahead of registry accounts.
///
/// It carries no account id; registry ids can never collide with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MainWalletEntry {
    pub address: Address,
    pub name: String,
    pub is_main_funded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountEntry {
    MainWallet(MainWalletEntry),
    OnChain(Account),
}

impl AccountEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::MainWallet(entry) => &entry.name,
            Self::OnChain(account) => &account.name,
        }
    }

    pub fn wallet_address(&self) -> Address {
        match self {
            Self::MainWallet(entry) => entry.address,
            Self::OnChain(account) => account.wallet_address,
        }
    }

    /// Registry id; `None` for the main-wallet entry.
    pub fn account_id(&self) -> Option<AccountId> {
        match self {
            Self::MainWallet(_) => None,
            Self::OnChain(account) => Some(account.id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub wallet: Option<Address>,
    /// Main-wallet entry first, then registry accounts in id-list order
    pub entries: Vec<AccountEntry>,
    pub primary_account: Option<AccountId>,
    pub loaded_at: Option<DateTime<Utc>>,
}

impl AccountSnapshot {
    pub fn on_chain(&self) -> impl Iterator<Item = &Account> {
        self.entries.iter().filter_map(|entry| match entry {
            AccountEntry::OnChain(account) => Some(account),
            AccountEntry::MainWallet(_) => None,
        })
    }

    pub fn main_wallet(&self) -> Option<&MainWalletEntry> {
        self.entries.iter().find_map(|entry| match entry {
            AccountEntry::MainWallet(main) => Some(main),
            AccountEntry::OnChain(_) => None,
        })
    }
}

pub struct AccountService {
    chain: Arc<dyn ChainClient>,
    contracts: Arc<ContractDirectory>,
    notifier: Arc<dyn Notifier>,
    main_funded_account: Address,
    timeouts: Timeouts,
    snapshot: RwLock<AccountSnapshot>,
    in_flight: AtomicUsize,
}

impl AccountService {
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
            main_funded_account: config.main_funded_account,
            timeouts: config.timeouts.clone(),
            snapshot: RwLock::new(AccountSnapshot::default()),
            in_flight: AtomicUsize::new(0),
        }
    }

    // ============================================================================
    // Reads
    // ============================================================================

    /// Reconcile the wallet's accounts against the registry.
    ///
    /// Never fails. With no wallet the snapshot is empty; with no usable
    /// registry it holds only the main-wallet entry. Records that fail to load
    /// are left out.
    pub async fn load_accounts(&self, session: &WalletSession) -> AccountSnapshot {
        let _busy = Busy::enter(&self.in_flight);

        let snapshot = match session.address {
            None => AccountSnapshot {
                loaded_at: Some(Utc::now()),
                ..Default::default()
            },
            Some(wallet) => self.reconcile(wallet).await,
        };

        *self.snapshot.write().await = snapshot.clone();
        snapshot
    }

    async fn reconcile(&self, wallet: Address) -> AccountSnapshot {
        let mut snapshot = AccountSnapshot {
            wallet: Some(wallet),
            entries: vec![AccountEntry::MainWallet(self.main_wallet_entry(wallet))],
            primary_account: None,
            loaded_at: Some(Utc::now()),
        };

        let registry = match self.contracts.resolve(ContractKind::AccountRegistry).await {
            Resolution::Resolved(address) => address,
            other => {
                log::debug!("Account registry {:?}; showing main wallet only", other);
                return snapshot;
            }
        };

        match guarded(self.timeouts.code_probe, self.chain.get_code(registry)).await {
            Ok(code) if code.is_empty() => {
                log::debug!("No account registry deployed at {}", registry);
                return snapshot;
            }
            Ok(_) => {}
            Err(e) => log::debug!("Account registry code probe failed: {}", e),
        }

        let ids = match guarded(
            self.timeouts.account_ids,
            self.chain.get_accounts_by_wallet(registry, wallet),
        )
        .await
        {
            Ok(ids) => dedup_ids(ids),
            Err(e) => {
                log::debug!("Failed to load blockchain accounts for {}: {}", wallet, e);
                return snapshot;
            }
        };

        // Primary pointer resolves after the id list and before any record
        snapshot.primary_account = match guarded(
            self.timeouts.primary_account,
            self.chain.get_primary_account(registry, wallet),
        )
        .await
        {
            Ok(0) => None,
            Ok(id) => Some(id),
            Err(e) => {
                log::debug!("Primary account lookup failed for {}: {}", wallet, e);
                None
            }
        };

        let fetches = ids.iter().map(|&id| async move {
            let result = guarded(
                self.timeouts.account_record,
                self.chain.get_account(registry, id),
            )
            .await;
            (id, result)
        });

        for (id, result) in join_all(fetches).await {
            match result {
                Ok(account) => snapshot.entries.push(AccountEntry::OnChain(account)),
                Err(e) => log::debug!("Skipping account {}: {}", id, e),
            }
        }

        log::info!(
            "Loaded {} account(s) for {} (primary: {:?})",
            snapshot.entries.len() - 1,
            wallet,
            snapshot.primary_account
        );
        snapshot
    }

    fn main_wallet_entry(&self, wallet: Address) -> MainWalletEntry {
        let is_main_funded = wallet == self.main_funded_account;
        MainWalletEntry {
            address: wallet,
            name: if is_main_funded {
                "Main Funded Account".to_string()
            } else {
                "Main Wallet".to_string()
            },
            is_main_funded,
        }
    }

    pub async fn snapshot(&self) -> AccountSnapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn primary_account(&self) -> Option<AccountId> {
        self.snapshot.read().await.primary_account
    }

    pub fn is_loading(&self) -> bool {
        is_busy(&self.in_flight)
    }

    pub async fn has_contract(&self) -> bool {
        self.contracts
            .resolution(ContractKind::AccountRegistry)
            .await
            .address()
            .is_some()
    }

    /// Drop the cached snapshot (wallet disconnected).
    pub async fn clear(&self) {
        *self.snapshot.write().await = AccountSnapshot::default();
    }

    // ============================================================================
    // Mutations
    // ============================================================================

    /// Create an account and return the id the registry assigned to it.
    ///
    /// The id comes from the registry's `AccountCreated` log. If the receipt
    /// carries none, the registry's account counter is read instead, which can
    /// name a different account when creations race.
    pub async fn create_account(
        &self,
        session: &WalletSession,
        account: NewAccount,
    ) -> Result<AccountId, ServiceError> {
        let from = session.signer()?;
        let registry = self.registry().await?;
        if account.name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "account name must not be empty".to_string(),
            ));
        }

        let outcome = {
            let _busy = Busy::enter(&self.in_flight);
            async {
                let hash = self.chain.create_account(registry, from, &account).await?;
                let receipt = self.confirm(&hash).await?;
                match account_created_id(&receipt, registry) {
                    Some(id) => Ok::<_, ServiceError>(id),
                    None => {
                        log::warn!(
                            "No AccountCreated log in {}; falling back to totalAccounts()",
                            hash
                        );
                        guarded(self.timeouts.account_record, self.chain.total_accounts(registry))
                            .await
                    }
                }
            }
            .await
        };

        match outcome {
            Ok(id) => {
                self.notifier
                    .success(&format!("Account \"{}\" created on blockchain!", account.name));
                self.load_accounts(session).await;
                Ok(id)
            }
            Err(e) => {
                log::error!("Error creating account on blockchain: {}", e);
                self.notifier
                    .error(&e.user_message("Failed to create account on blockchain"));
                Err(e)
            }
        }
    }

    pub async fn update_account(
        &self,
        session: &WalletSession,
        id: AccountId,
        name: &str,
        description: &str,
    ) -> Result<TxHash, ServiceError> {
        let from = session.signer()?;
        let registry = self.registry().await?;

        let outcome = {
            let _busy = Busy::enter(&self.in_flight);
            async {
                let hash = self
                    .chain
                    .update_account(registry, from, id, name, description)
                    .await?;
                self.confirm(&hash).await?;
                Ok::<_, ServiceError>(hash)
            }
            .await
        };

        self.finish(
            session,
            outcome,
            "Account updated on blockchain!",
            "Failed to update account on blockchain",
        )
        .await
    }

    pub async fn deactivate_account(
        &self,
        session: &WalletSession,
        id: AccountId,
    ) -> Result<TxHash, ServiceError> {
        let from = session.signer()?;
        let registry = self.registry().await?;

        let outcome = {
            let _busy = Busy::enter(&self.in_flight);
            async {
                let hash = self.chain.deactivate_account(registry, from, id).await?;
                self.confirm(&hash).await?;
                Ok::<_, ServiceError>(hash)
            }
            .await
        };

        self.finish(
            session,
            outcome,
            "Account deactivated on blockchain!",
            "Failed to deactivate account on blockchain",
        )
        .await
    }

    async fn registry(&self) -> Result<Address, ServiceError> {
        self.contracts
            .resolve(ContractKind::AccountRegistry)
            .await
            .address()
            .ok_or_else(|| {
                ServiceError::ContractUnavailable(format!(
                    "{} contract address not set",
                    ContractKind::AccountRegistry.label()
                ))
            })
    }

    async fn confirm(&self, hash: &TxHash) -> Result<TxReceipt, ServiceError> {
        let receipt = self.chain.wait_for_receipt(hash).await?;
        if !receipt.is_success() {
            return Err(ServiceError::TransactionFailed { hash: hash.clone() });
        }
        Ok(receipt)
    }

    async fn finish(
        &self,
        session: &WalletSession,
        outcome: Result<TxHash, ServiceError>,
        success: &str,
        fallback: &str,
    ) -> Result<TxHash, ServiceError> {
        match outcome {
            Ok(hash) => {
                self.notifier.success(success);
                self.load_accounts(session).await;
                Ok(hash)
            }
            Err(e) => {
                log::error!("{}: {}", fallback, e);
                self.notifier.error(&e.user_message(fallback));
                Err(e)
            }
        }
    }
}

/// Keep the first occurrence of each id.
fn dedup_ids(ids: Vec<AccountId>) -> Vec<AccountId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_preserves_order() {
        assert_eq!(dedup_ids(vec![3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn test_main_wallet_entry_has_no_id() {
        let entry = AccountEntry::MainWallet(MainWalletEntry {
            address: Address::repeat_byte(1),
            name: "Main Wallet".to_string(),
            is_main_funded: false,
        });
        assert_eq!(entry.account_id(), None);
        assert_eq!(entry.name(), "Main Wallet");
    }
}
