//! Chain client adapter
//!
//! - `abi` - calldata encoding and return-data decoding
//! - `rpc` - JSON-RPC transport
//! - `client` - typed contract operations (`ChainClient`)
//! - `types` - addresses, receipts, account and identity records

pub mod abi;
pub mod client;
pub mod rpc;
pub mod types;

pub use client::{account_created_id, ChainClient, EvmChainClient, ACCOUNT_CREATED_EVENT};
pub use rpc::JsonRpcClient;
pub use types::*;
