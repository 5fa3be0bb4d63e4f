use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use super::types::*;
use crate::{
    chain::{Address, IdentityProfile, NewAccount},
    contracts::ContractKind,
    error::ServiceError,
    manager::{ClientManager, SessionView},
    notify::Notice,
    session::WalletSession,
    subnet::SubnetInfo,
};

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// Session

pub async fn get_session_handler(State(manager): State<Arc<ClientManager>>) -> Json<SessionView> {
    Json(manager.session_view().await)
}

pub async fn connect_handler(
    State(manager): State<Arc<ClientManager>>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<SessionView>, ServiceError> {
    if req.address.is_zero() {
        return Err(ServiceError::InvalidInput(
            "cannot connect the zero address".to_string(),
        ));
    }
    let session = if req.can_sign {
        WalletSession::signing(req.address)
    } else {
        WalletSession::read_only(req.address)
    };
    Ok(Json(manager.connect(session).await))
}

pub async fn disconnect_handler(State(manager): State<Arc<ClientManager>>) -> Json<SessionView> {
    manager.disconnect().await;
    Json(manager.session_view().await)
}

// Accounts

pub async fn list_accounts_handler(
    State(manager): State<Arc<ClientManager>>,
) -> Json<AccountsResponse> {
    let snapshot = manager.load_accounts().await;
    Json(AccountsResponse {
        snapshot,
        loading: manager.accounts.is_loading(),
        has_contract: manager.accounts.has_contract().await,
    })
}

pub async fn create_account_handler(
    State(manager): State<Arc<ClientManager>>,
    Json(req): Json<NewAccount>,
) -> Result<Json<CreateAccountResponse>, ServiceError> {
    let account_id = manager.create_account(req).await?;
    Ok(Json(CreateAccountResponse { account_id }))
}

pub async fn update_account_handler(
    State(manager): State<Arc<ClientManager>>,
    Path(id): Path<u64>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<TransactionResponse>, ServiceError> {
    let tx_hash = manager
        .update_account(id, &req.name, &req.description)
        .await?;
    Ok(Json(TransactionResponse { tx_hash }))
}

pub async fn deactivate_account_handler(
    State(manager): State<Arc<ClientManager>>,
    Path(id): Path<u64>,
) -> Result<Json<TransactionResponse>, ServiceError> {
    let tx_hash = manager.deactivate_account(id).await?;
    Ok(Json(TransactionResponse { tx_hash }))
}

// Identity

async fn identity_response(manager: &ClientManager, address: Option<Address>) -> IdentityResponse {
    let target = address.or(manager.session().await.address);
    let state = manager.check_digital_id(address).await;
    IdentityResponse {
        address: target,
        has_digital_id: state.identity().is_some(),
        state,
        error: manager.identity.last_error().await,
    }
}

pub async fn check_identity_handler(
    State(manager): State<Arc<ClientManager>>,
    Query(query): Query<IdentityQuery>,
) -> Json<IdentityResponse> {
    Json(identity_response(&manager, query.address).await)
}

pub async fn identity_by_address_handler(
    State(manager): State<Arc<ClientManager>>,
    Path(address): Path<String>,
) -> Result<Json<IdentityResponse>, ServiceError> {
    let address: Address = address
        .parse()
        .map_err(|e| ServiceError::InvalidInput(format!("{}", e)))?;
    Ok(Json(identity_response(&manager, Some(address)).await))
}

pub async fn register_identity_handler(
    State(manager): State<Arc<ClientManager>>,
    Json(req): Json<IdentityProfile>,
) -> Result<Json<TransactionResponse>, ServiceError> {
    let tx_hash = manager.register_digital_id(req).await?;
    Ok(Json(TransactionResponse { tx_hash }))
}

pub async fn deactivate_identity_handler(
    State(manager): State<Arc<ClientManager>>,
) -> Result<Json<TransactionResponse>, ServiceError> {
    let tx_hash = manager.deactivate_digital_id().await?;
    Ok(Json(TransactionResponse { tx_hash }))
}

// Subnets

pub async fn list_subnets_handler(State(manager): State<Arc<ClientManager>>) -> Json<SubnetsResponse> {
    let subnets = manager.subnet.load_subnets().await;
    Json(SubnetsResponse {
        subnets,
        current: manager.subnet.current_subnet().await,
        status: manager.subnet.status().await,
        loading: manager.subnet.is_loading(),
    })
}

pub async fn current_subnet_handler(
    State(manager): State<Arc<ClientManager>>,
) -> Json<CurrentSubnetResponse> {
    Json(CurrentSubnetResponse {
        current: manager.subnet.current_subnet().await,
        status: manager.subnet.status().await,
    })
}

pub async fn select_subnet_handler(
    State(manager): State<Arc<ClientManager>>,
    Json(req): Json<SelectSubnetRequest>,
) -> Result<Json<SubnetInfo>, ServiceError> {
    if req.name.trim().is_empty() {
        return Err(ServiceError::InvalidInput("subnet name is required".to_string()));
    }
    let info = manager.subnet.select_subnet(req.name.trim()).await?;
    Ok(Json(info))
}

pub async fn refresh_subnet_handler(
    State(manager): State<Arc<ClientManager>>,
) -> Result<Json<CurrentSubnetResponse>, ServiceError> {
    let current = manager.subnet.refresh_subnet_info().await?;
    Ok(Json(CurrentSubnetResponse {
        current,
        status: manager.subnet.status().await,
    }))
}

pub async fn subnet_stats_handler(
    State(manager): State<Arc<ClientManager>>,
    Path(name): Path<String>,
    Query(query): Query<SubnetStatsQuery>,
) -> Result<Json<Value>, ServiceError> {
    let stats = manager
        .subnet_stats(&name, query.network.as_deref())
        .await?;
    Ok(Json(stats))
}

pub async fn network_status_handler(
    State(manager): State<Arc<ClientManager>>,
) -> Result<Json<Value>, ServiceError> {
    Ok(Json(manager.network_status().await?))
}

// Plots

pub async fn get_plot_handler(
    State(manager): State<Arc<ClientManager>>,
    Path(plot_id): Path<u64>,
) -> Json<PlotResponse> {
    let (plot, is_owner) = manager.plot_info(plot_id).await;
    Json(PlotResponse { plot, is_owner })
}

pub async fn transfer_plot_handler(
    State(manager): State<Arc<ClientManager>>,
    Path(plot_id): Path<u64>,
    Json(req): Json<TransferRequest>,
) -> Result<Json<TransactionResponse>, ServiceError> {
    let tx_hash = manager
        .request_plot_transfer(plot_id, req.new_owner)
        .await?;
    Ok(Json(TransactionResponse { tx_hash }))
}

// Contracts

pub async fn contracts_handler(State(manager): State<Arc<ClientManager>>) -> Json<ContractsResponse> {
    let contracts = &manager.contracts;
    Json(ContractsResponse {
        addresses: contracts.addresses().await,
        account_registry: contracts.resolution(ContractKind::AccountRegistry).await,
        digital_id: contracts.resolution(ContractKind::DigitalId).await,
        plot_registry: contracts.resolution(ContractKind::PlotRegistry).await,
    })
}

pub async fn refresh_contracts_handler(
    State(manager): State<Arc<ClientManager>>,
) -> Json<RefreshContractsResponse> {
    let loaded = manager.refresh_contracts().await;
    Json(RefreshContractsResponse {
        loaded,
        addresses: manager.contract_addresses().await,
    })
}

// Notices

pub async fn notices_handler(State(manager): State<Arc<ClientManager>>) -> Json<Vec<Notice>> {
    Json(manager.notices())
}
