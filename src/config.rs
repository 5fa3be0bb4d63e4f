/// Client configuration from environment variables
///
/// Points the client at the dashboard backend and the subnet's EVM RPC
/// endpoint. Contract addresses set here seed the contract directory;
/// anything left unset is discovered at runtime.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::chain::Address;

/// Account registry address used when neither env nor discovery provides one
pub const FALLBACK_ACCOUNT_REGISTRY: &str = "0x3E95B28Fa95426F2bA996528bDa7457871e03C70";

/// Funded deployer account on the local subnet
pub const DEFAULT_MAIN_FUNDED_ACCOUNT: &str = "0x7852031cbD4b980457962D30D11e7CC684109fEa";

pub const DEFAULT_PREFERRED_SUBNET: &str = "ChaosStarNetwork";

/// Deadlines applied to every guarded read
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub account_ids: Duration,
    pub primary_account: Duration,
    pub account_record: Duration,
    pub code_probe: Duration,
    pub identity_lookup: Duration,
    pub plot_lookup: Duration,
    pub backend_addresses: Duration,
    pub address_files: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            account_ids: Duration::from_secs(10),
            primary_account: Duration::from_secs(5),
            account_record: Duration::from_secs(5),
            code_probe: Duration::from_secs(5),
            identity_lookup: Duration::from_secs(10),
            plot_lookup: Duration::from_secs(5),
            backend_addresses: Duration::from_secs(5),
            address_files: Duration::from_secs(3),
        }
    }
}

/// Contract addresses configured up front (all optional)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfiguredAddresses {
    pub account_registry: Option<Address>,
    pub digital_id: Option<Address>,
    pub plot_registry: Option<Address>,
    pub land: Option<Address>,
    pub treasury: Option<Address>,
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Dashboard backend base URL
    pub api_url: String,
    /// EVM JSON-RPC endpoint of the subnet
    pub rpc_url: String,
    /// Directory for persisted client records
    pub storage_dir: PathBuf,
    /// Directory holding `addresses.json` / `deployments/addresses.json`
    pub addresses_dir: PathBuf,
    pub contracts: ConfiguredAddresses,
    /// Connected address that gets the "Main Funded Account" label
    pub main_funded_account: Address,
    /// Subnet auto-selected when nothing is selected yet
    pub preferred_subnet: String,
    /// Case-insensitive fallback match when the preferred name is missing
    pub preferred_subnet_fragment: String,
    pub bind_address: String,
    pub receipt_poll_attempts: u32,
    pub receipt_poll_interval: Duration,
    pub timeouts: Timeouts,
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `API_URL`: backend base URL (default `http://localhost:5001`)
    /// - `RPC_URL`: subnet RPC endpoint (default `http://127.0.0.1:9650/ext/bc/C/rpc`)
    /// - `STORAGE_DIR`: persisted record directory (default `./.chaos-star`)
    /// - `ADDRESSES_DIR`: address file directory (default `./public`)
    /// - `ACCOUNT_REGISTRY_ADDRESS`, `DIGITAL_ID_ADDRESS`, `PLOT_REGISTRY_ADDRESS`,
    ///   `LAND_ADDRESS`, `TREASURY_ADDRESS`: optional contract addresses
    /// - `MAIN_FUNDED_ACCOUNT`: funded deployer address
    /// - `PREFERRED_SUBNET`: subnet to auto-select (default `ChaosStarNetwork`)
    /// - `BIND_ADDRESS`: HTTP listen address (default `0.0.0.0:5002`)
    /// - `RECEIPT_POLL_ATTEMPTS`, `RECEIPT_POLL_INTERVAL_MS`: receipt polling
    ///
    /// # Examples
    ///
    /// ```bash
    /// API_URL=http://localhost:5001 PREFERRED_SUBNET=MySubnet cargo run
    /// ```
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = env::var("API_URL").unwrap_or(defaults.api_url);
        log::info!("📡 Backend API URL: {}", api_url);

        let rpc_url = env::var("RPC_URL").unwrap_or(defaults.rpc_url);
        log::info!("🔗 RPC URL: {}", rpc_url);

        let storage_dir = env::var("STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage_dir);
        let addresses_dir = env::var("ADDRESSES_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.addresses_dir);

        let contracts = ConfiguredAddresses {
            account_registry: address_var("ACCOUNT_REGISTRY_ADDRESS"),
            digital_id: address_var("DIGITAL_ID_ADDRESS"),
            plot_registry: address_var("PLOT_REGISTRY_ADDRESS"),
            land: address_var("LAND_ADDRESS"),
            treasury: address_var("TREASURY_ADDRESS"),
        };

        let main_funded_account =
            address_var("MAIN_FUNDED_ACCOUNT").unwrap_or(defaults.main_funded_account);

        let preferred_subnet = env::var("PREFERRED_SUBNET")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(defaults.preferred_subnet);
        log::info!("🌐 Preferred subnet: {}", preferred_subnet);

        let bind_address = env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address);

        let receipt_poll_attempts = env::var("RECEIPT_POLL_ATTEMPTS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(defaults.receipt_poll_attempts);
        let receipt_poll_interval = env::var("RECEIPT_POLL_INTERVAL_MS")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.receipt_poll_interval);

        Self {
            api_url,
            rpc_url,
            storage_dir,
            addresses_dir,
            contracts,
            main_funded_account,
            preferred_subnet,
            preferred_subnet_fragment: defaults.preferred_subnet_fragment,
            bind_address,
            receipt_poll_attempts,
            receipt_poll_interval,
            timeouts: defaults.timeouts,
        }
    }

    /// Account registry address used when nothing else resolves one
    pub fn fallback_account_registry(&self) -> Option<Address> {
        FALLBACK_ACCOUNT_REGISTRY.parse().ok()
    }
}

fn address_var(name: &str) -> Option<Address> {
    let raw = env::var(name).ok()?;
    if raw.trim().is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(address) => Some(address),
        Err(e) => {
            log::warn!("⚠️  Ignoring {}: {}", name, e);
            None
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5001".to_string(),
            rpc_url: "http://127.0.0.1:9650/ext/bc/C/rpc".to_string(),
            storage_dir: PathBuf::from("./.chaos-star"),
            addresses_dir: PathBuf::from("./public"),
            contracts: ConfiguredAddresses::default(),
            main_funded_account: DEFAULT_MAIN_FUNDED_ACCOUNT
                .parse()
                .unwrap_or(Address::ZERO),
            preferred_subnet: DEFAULT_PREFERRED_SUBNET.to_string(),
            preferred_subnet_fragment: "chaos".to_string(),
            bind_address: "0.0.0.0:5002".to_string(),
            receipt_poll_attempts: 60,
            receipt_poll_interval: Duration::from_secs(2),
            timeouts: Timeouts::default(),
        }
    }
}
