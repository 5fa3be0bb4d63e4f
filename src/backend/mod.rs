//! Dashboard backend service client

mod client;
mod types;

pub use client::{BackendClient, SubnetDirectory};
pub use types::{
    AddressesResponse, ParsedDescription, RpcUrls, SubnetDescription, SubnetList, SubnetSummary,
    WalletConnection,
};
