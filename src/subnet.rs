//! Subnet session context
//!
//! Holds the selected subnet and its connection status. A selection saved by
//! an earlier session is shown immediately on startup, unverified, and is
//! then confirmed or invalidated by a live describe lookup.

use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::backend::{SubnetDescription, SubnetDirectory, SubnetSummary};
use crate::busy::{is_busy, Busy};
use crate::config::ClientConfig;
use crate::error::{BackendError, ServiceError};
use crate::notify::Notifier;
use crate::storage::{Storage, SELECTED_SUBNET_KEY};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    #[default]
    Unknown,
}

/// Connection details of a subnet, as persisted under `selected_subnet`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetInfo {
    pub name: String,
    #[serde(default)]
    pub rpc_url: Option<String>,
    #[serde(default)]
    pub blockchain_id: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub status: ConnectionStatus,
}

#[derive(Default)]
struct SubnetState {
    current: Option<SubnetInfo>,
    status: ConnectionStatus,
    available: Vec<SubnetSummary>,
    /// A describe lookup has completed in this process
    confirmed: bool,
}

pub struct SubnetSession {
    directory: Arc<dyn SubnetDirectory>,
    storage: Storage,
    notifier: Arc<dyn Notifier>,
    preferred: String,
    preferred_fragment: String,
    state: RwLock<SubnetState>,
    in_flight: AtomicUsize,
}

impl SubnetSession {
    pub fn new(
        directory: Arc<dyn SubnetDirectory>,
        storage: Storage,
        notifier: Arc<dyn Notifier>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            directory,
            storage,
            notifier,
            preferred: config.preferred_subnet.clone(),
            preferred_fragment: config.preferred_subnet_fragment.to_lowercase(),
            state: RwLock::new(SubnetState::default()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Restore, list, then confirm a restored selection against the backend.
    pub async fn start(&self) {
        self.restore().await;
        self.load_subnets().await;

        let unconfirmed = {
            let state = self.state.read().await;
            state.current.is_some() && !state.confirmed
        };
        if unconfirmed {
            if let Err(e) = self.refresh_subnet_info().await {
                log::warn!("Restored subnet could not be confirmed: {}", e);
            }
        }
    }

    /// Load the last saved selection without verifying it.
    pub async fn restore(&self) -> Option<SubnetInfo> {
        let record = match self.storage.load::<SubnetInfo>(SELECTED_SUBNET_KEY) {
            Ok(record) => record?,
            Err(e) => {
                log::error!("Failed to restore subnet from storage: {}", e);
                return None;
            }
        };

        let info = record.value;
        log::info!(
            "Restored subnet '{}' ({:?}, saved {})",
            info.name,
            info.status,
            record.saved_at
        );
        let mut state = self.state.write().await;
        state.status = info.status;
        state.current = Some(info.clone());
        Some(info)
    }

    /// List available subnets and auto-select one if nothing is selected.
    pub async fn load_subnets(&self) -> Vec<SubnetSummary> {
        let _busy = Busy::enter(&self.in_flight);

        let subnets = match self.directory.list_subnets().await {
            Ok(subnets) => subnets,
            Err(e) => {
                log::error!("Failed to load subnets: {}", e);
                self.state.write().await.available.clear();
                return Vec::new();
            }
        };

        let pick = {
            let mut state = self.state.write().await;
            state.available = subnets.clone();
            if state.current.is_none() {
                preferred_subnet(&subnets, &self.preferred, &self.preferred_fragment)
                    .map(|subnet| subnet.name.clone())
            } else {
                None
            }
        };

        if let Some(name) = pick {
            log::info!("Auto-selecting subnet '{}'", name);
            // Failure is already recorded and notified
            let _ = self.select_subnet(&name).await;
        }

        subnets
    }

    /// Describe `name` and make it the current subnet.
    ///
    /// On failure the status becomes `Disconnected` but the previous
    /// connection info is kept.
    pub async fn select_subnet(&self, name: &str) -> Result<SubnetInfo, ServiceError> {
        let _busy = Busy::enter(&self.in_flight);

        let description = match self.directory.describe_subnet(name).await {
            Ok(description) => description,
            Err(e) => {
                log::error!("Failed to select subnet '{}': {}", name, e);
                self.mark_disconnected().await;
                self.notifier
                    .error(&format!("Error connecting to subnet: {}", e));
                return Err(e.into());
            }
        };

        let info = match connection_info(name, description) {
            Ok(info) => info,
            Err(reason) => {
                log::warn!("Subnet '{}' describe unusable: {}", name, reason);
                self.mark_disconnected().await;
                self.notifier
                    .error(&format!("Failed to connect to {}: {}", name, reason));
                return Err(BackendError::InvalidResponse(reason).into());
            }
        };

        {
            let mut state = self.state.write().await;
            state.current = Some(info.clone());
            state.status = ConnectionStatus::Connected;
            state.confirmed = true;
        }

        if let Err(e) = self.storage.save(SELECTED_SUBNET_KEY, &info) {
            log::warn!("Could not persist selected subnet: {}", e);
        }

        self.notifier.success(&format!("Connected to {}", name));
        Ok(info)
    }

    /// Re-select the current subnet; `Ok(None)` when nothing is selected.
    pub async fn refresh_subnet_info(&self) -> Result<Option<SubnetInfo>, ServiceError> {
        let name = match self.state.read().await.current.as_ref() {
            Some(info) => info.name.clone(),
            None => return Ok(None),
        };
        self.select_subnet(&name).await.map(Some)
    }

    async fn mark_disconnected(&self) {
        let mut state = self.state.write().await;
        state.status = ConnectionStatus::Disconnected;
        state.confirmed = true;
    }

    pub async fn current_subnet(&self) -> Option<SubnetInfo> {
        self.state.read().await.current.clone()
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.state.read().await.status
    }

    pub async fn available_subnets(&self) -> Vec<SubnetSummary> {
        self.state.read().await.available.clone()
    }

    pub fn is_loading(&self) -> bool {
        is_busy(&self.in_flight)
    }
}

/// Exact name, then case-insensitive fragment, then the first listed.
pub fn preferred_subnet<'a>(
    subnets: &'a [SubnetSummary],
    preferred: &str,
    fragment: &str,
) -> Option<&'a SubnetSummary> {
    let fragment = fragment.to_lowercase();
    subnets
        .iter()
        .find(|subnet| subnet.name == preferred)
        .or_else(|| {
            subnets
                .iter()
                .find(|subnet| !fragment.is_empty() && subnet.name.to_lowercase().contains(&fragment))
        })
        .or_else(|| subnets.first())
}

fn connection_info(name: &str, description: SubnetDescription) -> Result<SubnetInfo, String> {
    if !description.success {
        return Err(description
            .error
            .unwrap_or_else(|| "describe reported failure".to_string()));
    }
    let parsed = description
        .parsed
        .ok_or_else(|| "describe response has no parsed details".to_string())?;

    Ok(SubnetInfo {
        name: name.to_string(),
        rpc_url: parsed.rpc_url(),
        blockchain_id: parsed.avalanche_blockchain_id,
        subnet_id: parsed.avalanche_subnet_id,
        status: ConnectionStatus::Connected,
    })
}
