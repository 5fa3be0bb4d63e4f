//! Contract address directory
//!
//! Built once by the manager and shared by reference with every service that
//! talks to a contract. Addresses come from configuration and the storage
//! cache at construction; anything still missing is discovered by
//! [`ContractDirectory::initialize`], which runs its sources at most once until
//! [`ContractDirectory::refresh`] resets it.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};

use crate::chain::Address;
use crate::config::ClientConfig;
use crate::error::ServiceError;
use crate::storage::{Storage, CONTRACT_ADDRESSES_KEY};
use crate::timeout::with_timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractKind {
    AccountRegistry,
    DigitalId,
    PlotRegistry,
    Land,
    Treasury,
}

impl ContractKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::AccountRegistry => "Account Registry",
            Self::DigitalId => "Digital ID",
            Self::PlotRegistry => "Plot Registry",
            Self::Land => "Land",
            Self::Treasury => "Treasury",
        }
    }
}

/// Where a contract address stands after seeding and discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "address", rename_all = "snake_case")]
pub enum Resolution {
    /// Not known yet and discovery has not run
    Unresolved,
    Resolved(Address),
    /// Discovery ran and found nothing
    Unavailable,
}

impl Resolution {
    pub fn address(self) -> Option<Address> {
        match self {
            Self::Resolved(address) => Some(address),
            _ => None,
        }
    }
}

/// Address table in the backend's JSON shape. Empty strings read as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAddresses {
    #[serde(default, with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub account_registry: Option<Address>,
    #[serde(
        rename = "digitalID",
        default,
        with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub digital_id: Option<Address>,
    #[serde(default, with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub plot_registry: Option<Address>,
    #[serde(default, with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub land: Option<Address>,
    #[serde(default, with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub treasury: Option<Address>,
}

impl ContractAddresses {
    pub fn get(&self, kind: ContractKind) -> Option<Address> {
        match kind {
            ContractKind::AccountRegistry => self.account_registry,
            ContractKind::DigitalId => self.digital_id,
            ContractKind::PlotRegistry => self.plot_registry,
            ContractKind::Land => self.land,
            ContractKind::Treasury => self.treasury,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.account_registry.is_none()
            && self.digital_id.is_none()
            && self.plot_registry.is_none()
            && self.land.is_none()
            && self.treasury.is_none()
    }

    /// Overlay every address present in `other`.
    pub fn merge(&mut self, other: &ContractAddresses) {
        self.account_registry = other.account_registry.or(self.account_registry);
        self.digital_id = other.digital_id.or(self.digital_id);
        self.plot_registry = other.plot_registry.or(self.plot_registry);
        self.land = other.land.or(self.land);
        self.treasury = other.treasury.or(self.treasury);
    }

    /// Parse a flat table or one nested under `addresses`.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Object(mut map) if map.get("addresses").is_some_and(Value::is_object) => {
                let nested = map.remove("addresses").unwrap_or(Value::Null);
                serde_json::from_value(nested)
            }
            other => serde_json::from_value(other),
        }
    }
}

mod empty_as_none {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<Address>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(address) => serializer.collect_str(address),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Address>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => text.parse().map(Some).map_err(serde::de::Error::custom),
        }
    }
}

/// One place contract addresses can be discovered from.
#[async_trait]
pub trait AddressSource: Send + Sync {
    fn name(&self) -> String;

    /// Deadline applied to [`AddressSource::fetch`]
    fn deadline(&self) -> Duration;

    /// `Ok(None)` when the source answered but had nothing to offer.
    async fn fetch(&self) -> Result<Option<ContractAddresses>, ServiceError>;
}

/// Address table published as a JSON file next to the dashboard assets.
pub struct FileAddressSource {
    path: PathBuf,
    deadline: Duration,
}

impl FileAddressSource {
    pub fn new(path: impl Into<PathBuf>, deadline: Duration) -> Self {
        Self {
            path: path.into(),
            deadline,
        }
    }
}

#[async_trait]
impl AddressSource for FileAddressSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn fetch(&self) -> Result<Option<ContractAddresses>, ServiceError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ServiceError::Storage(e.into())),
        };
        let value: Value = serde_json::from_str(&contents)
            .map_err(|e| ServiceError::Storage(e.into()))?;
        let addresses =
            ContractAddresses::from_json(value).map_err(|e| ServiceError::Storage(e.into()))?;
        Ok((!addresses.is_empty()).then_some(addresses))
    }
}

pub struct ContractDirectory {
    addresses: RwLock<ContractAddresses>,
    /// Set once discovery has run
    attempted: Mutex<bool>,
    sources: Vec<Arc<dyn AddressSource>>,
    storage: Storage,
    fallback_registry: Option<Address>,
}

impl ContractDirectory {
    /// Seed from configuration, then the storage cache, then the registry fallback.
    pub fn new(config: &ClientConfig, storage: Storage, sources: Vec<Arc<dyn AddressSource>>) -> Self {
        let configured = &config.contracts;
        let mut seed = ContractAddresses {
            account_registry: configured.account_registry,
            digital_id: configured.digital_id,
            plot_registry: configured.plot_registry,
            land: configured.land,
            treasury: configured.treasury,
        };

        match storage.load::<ContractAddresses>(CONTRACT_ADDRESSES_KEY) {
            Ok(Some(cached)) if !cached.value.is_empty() => {
                log::debug!("Seeding contract addresses from cache ({})", cached.saved_at);
                seed.merge(&cached.value);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Ignoring unreadable contract address cache: {}", e),
        }

        let fallback_registry = config.fallback_account_registry();
        if seed.account_registry.is_none() {
            seed.account_registry = fallback_registry;
        }

        Self {
            addresses: RwLock::new(seed),
            attempted: Mutex::new(false),
            sources,
            storage,
            fallback_registry,
        }
    }

    pub async fn addresses(&self) -> ContractAddresses {
        self.addresses.read().await.clone()
    }

    /// Current state for `kind` without triggering discovery; waits for an
    /// attempt already in flight.
    pub async fn resolution(&self, kind: ContractKind) -> Resolution {
        let attempted = *self.attempted.lock().await;
        match self.addresses.read().await.get(kind) {
            Some(address) => Resolution::Resolved(address),
            None if attempted => Resolution::Unavailable,
            None => Resolution::Unresolved,
        }
    }

    /// Address for `kind`, running discovery once if it is still unresolved.
    pub async fn resolve(&self, kind: ContractKind) -> Resolution {
        match self.resolution(kind).await {
            Resolution::Unresolved => {
                self.initialize().await;
                self.resolution(kind).await
            }
            settled => settled,
        }
    }

    /// Run discovery unless it already ran. Concurrent callers wait for the
    /// attempt in flight. Returns whether a source supplied addresses.
    pub async fn initialize(&self) -> bool {
        let mut attempted = self.attempted.lock().await;
        if *attempted {
            return false;
        }
        *attempted = true;
        self.discover().await
    }

    /// Forget the previous attempt and discover again.
    pub async fn refresh(&self) -> bool {
        let mut attempted = self.attempted.lock().await;
        *attempted = true;
        self.discover().await
    }

    async fn discover(&self) -> bool {
        for source in &self.sources {
            let name = source.name();
            match with_timeout(source.deadline(), source.fetch()).await {
                Ok(Ok(Some(found))) => {
                    log::info!("✓ Contract addresses loaded from {}", name);
                    self.adopt(&found).await;
                    return true;
                }
                Ok(Ok(None)) => log::debug!("No contract addresses at {}", name),
                Ok(Err(e)) => log::debug!("Address source {} unavailable: {}", name, e),
                Err(timeout) => log::debug!("Address source {}: {}", name, timeout),
            }
        }

        // Last resort: whatever a previous session cached
        match self.storage.load::<ContractAddresses>(CONTRACT_ADDRESSES_KEY) {
            Ok(Some(cached)) if !cached.value.is_empty() => {
                log::info!("✓ Contract addresses loaded from cache");
                self.addresses.write().await.merge(&cached.value);
                return true;
            }
            Ok(_) => {}
            Err(e) => log::warn!("Could not read contract address cache: {}", e),
        }

        log::debug!("Contract addresses not found; some features need backend configuration");
        false
    }

    async fn adopt(&self, found: &ContractAddresses) {
        let mut addresses = self.addresses.write().await;
        addresses.merge(found);
        if addresses.account_registry.is_none() {
            addresses.account_registry = self.fallback_registry;
        }
        if let Err(e) = self.storage.save(CONTRACT_ADDRESSES_KEY, found) {
            log::warn!("Could not cache contract addresses: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_backend_shape_with_empty_strings() {
        let addresses = ContractAddresses::from_json(json!({
            "accountRegistry": "0x3E95B28Fa95426F2bA996528bDa7457871e03C70",
            "digitalID": "",
            "csnToken": "0x868306CeD3bb5Aa8fBc4BD8fA2727484cDfE1D89",
        }))
        .unwrap();
        assert!(addresses.account_registry.is_some());
        assert!(addresses.digital_id.is_none());
        assert!(addresses.land.is_none());
    }

    #[test]
    fn test_parses_nested_table() {
        let addresses = ContractAddresses::from_json(json!({
            "network": "local",
            "addresses": { "land": "0x0000000000000000000000000000000000000001" },
        }))
        .unwrap();
        assert_eq!(
            addresses.land.map(|a| a.to_string()),
            Some("0x0000000000000000000000000000000000000001".to_string())
        );
    }

    #[test]
    fn test_merge_keeps_existing_when_other_is_absent() {
        let land: Address = "0x0000000000000000000000000000000000000001".parse().unwrap();
        let id: Address = "0x0000000000000000000000000000000000000002".parse().unwrap();
        let mut base = ContractAddresses {
            land: Some(land),
            ..Default::default()
        };
        base.merge(&ContractAddresses {
            digital_id: Some(id),
            ..Default::default()
        });
        assert_eq!(base.land, Some(land));
        assert_eq!(base.digital_id, Some(id));
    }
}
