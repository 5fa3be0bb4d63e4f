use serde::{Deserialize, Serialize};

use crate::accounts::AccountSnapshot;
use crate::backend::SubnetSummary;
use crate::chain::{AccountId, Address, TxHash};
use crate::contracts::{ContractAddresses, Resolution};
use crate::plots::PlotInfo;
use crate::subnet::{ConnectionStatus, SubnetInfo};

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub address: Address,
    #[serde(default = "default_can_sign")]
    pub can_sign: bool,
}

fn default_can_sign() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct AccountsResponse {
    #[serde(flatten)]
    pub snapshot: AccountSnapshot,
    pub loading: bool,
    pub has_contract: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateAccountResponse {
    pub account_id: AccountId,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub tx_hash: TxHash,
}

#[derive(Debug, Deserialize)]
pub struct IdentityQuery {
    pub address: Option<Address>,
}

#[derive(Debug, Serialize)]
pub struct IdentityResponse {
    pub address: Option<Address>,
    #[serde(flatten)]
    pub state: crate::identity::IdentityState,
    pub has_digital_id: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubnetsResponse {
    pub subnets: Vec<SubnetSummary>,
    pub current: Option<SubnetInfo>,
    pub status: ConnectionStatus,
    pub loading: bool,
}

#[derive(Debug, Serialize)]
pub struct CurrentSubnetResponse {
    pub current: Option<SubnetInfo>,
    pub status: ConnectionStatus,
}

#[derive(Debug, Deserialize)]
pub struct SelectSubnetRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SubnetStatsQuery {
    pub network: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlotResponse {
    #[serde(flatten)]
    pub plot: PlotInfo,
    pub is_owner: bool,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub new_owner: Address,
}

#[derive(Debug, Serialize)]
pub struct ContractsResponse {
    pub addresses: ContractAddresses,
    pub account_registry: Resolution,
    pub digital_id: Resolution,
    pub plot_registry: Resolution,
}

#[derive(Debug, Serialize)]
pub struct RefreshContractsResponse {
    pub loaded: bool,
    pub addresses: ContractAddresses,
}
