//! Chaos Star Client: account, identity and subnet reconciliation
//!
//! Keeps a client-side view of on-chain state for the Chaos Star Network
//! dashboard. Every read is time-guarded and soft-fails into an empty or
//! absent result; every write waits for its receipt and reports a
//! human-readable outcome.
//!
//! # Architecture
//!
//! - **Chain client** (`chain`): typed contract reads/writes over JSON-RPC
//! - **Contract directory** (`contracts`): one-shot address discovery with tri-state resolution
//! - **Account service** (`accounts`): wallet accounts, primary pointer, main-wallet entry
//! - **Identity resolver** (`identity`): code-probed digital ID lookups
//! - **Subnet session** (`subnet`): persisted subnet selection confirmed against the backend
//! - **Manager** (`manager`): composition root behind the HTTP API
//!
//! # Example
//!
//! ```ignore
//! use chaos_star_client::{ClientManager, WalletSession};
//!
//! let manager = ClientManager::new()?;
//! manager.start().await;
//!
//! let view = manager.connect(WalletSession::signing(address)).await;
//! println!("{} account(s)", view.accounts.entries.len());
//! ```

// Public modules
pub mod accounts;
pub mod api;
pub mod backend;
mod busy;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod identity;
pub mod manager;
pub mod notify;
pub mod plots;
pub mod session;
pub mod storage;
pub mod subnet;
pub mod timeout;

// Re-exports for convenience
pub use accounts::{AccountEntry, AccountService, AccountSnapshot, MainWalletEntry};
pub use backend::{BackendClient, SubnetDirectory, SubnetSummary};
pub use chain::{
    Account, AccountId, AccountType, Address, ChainClient, DigitalIdentity, EvmChainClient,
    IdentityProfile, NewAccount, TxHash, TxReceipt,
};
pub use config::ClientConfig;
pub use contracts::{AddressSource, ContractAddresses, ContractDirectory, ContractKind, Resolution};
pub use error::{BackendError, ChainError, DecodeError, ServiceError, StorageError};
pub use identity::{IdentityResolver, IdentityState};
pub use manager::{ClientManager, SessionView};
pub use notify::{BroadcastNotifier, LogNotifier, Notice, NoticeLevel, Notifier};
pub use plots::{PlotInfo, PlotRegistry};
pub use session::WalletSession;
pub use storage::Storage;
pub use subnet::{ConnectionStatus, SubnetInfo, SubnetSession};
pub use timeout::{guarded, with_timeout, CallTimeout};

// Common result type
pub type Result<T> = std::result::Result<T, ServiceError>;
