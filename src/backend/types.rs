use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::contracts::ContractAddresses;

/// `GET /avalanche-info/subnets`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubnetList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub subnets: Vec<SubnetSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubnetSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Remaining CLI fields, passed through untouched
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl SubnetSummary {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: None,
            details: Map::new(),
        }
    }
}

/// `GET /avalanche-info/subnet/{name}/describe`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubnetDescription {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub subnet_name: Option<String>,
    #[serde(default)]
    pub parsed: Option<ParsedDescription>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParsedDescription {
    #[serde(default)]
    pub rpc_urls: Option<RpcUrls>,
    #[serde(default)]
    pub wallet_connection: Option<WalletConnection>,
    #[serde(default)]
    pub avalanche_blockchain_id: Option<String>,
    #[serde(default)]
    pub avalanche_subnet_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RpcUrls {
    #[serde(default)]
    pub localhost: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConnection {
    #[serde(default)]
    pub network_rpc_url: Option<String>,
}

impl ParsedDescription {
    /// Local endpoint first, then the general network endpoint.
    pub fn rpc_url(&self) -> Option<String> {
        let local = self
            .rpc_urls
            .as_ref()
            .and_then(|urls| urls.localhost.as_deref());
        let network = self
            .wallet_connection
            .as_ref()
            .and_then(|conn| conn.network_rpc_url.as_deref());
        local
            .filter(|url| !url.is_empty())
            .or(network.filter(|url| !url.is_empty()))
            .map(str::to_string)
    }
}

/// `GET /contracts/addresses`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressesResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub addresses: Option<ContractAddresses>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rpc_url_prefers_localhost() {
        let description: SubnetDescription = serde_json::from_value(json!({
            "success": true,
            "subnet_name": "ChaosStarNetwork",
            "parsed": {
                "rpc_urls": { "localhost": "http://127.0.0.1:9650/ext/bc/abc/rpc" },
                "wallet_connection": { "network_rpc_url": "http://10.0.0.5:9650/ext/bc/abc/rpc" },
                "avalanche_blockchain_id": "abc",
                "avalanche_subnet_id": "def"
            }
        }))
        .unwrap();
        let parsed = description.parsed.unwrap();
        assert_eq!(
            parsed.rpc_url().as_deref(),
            Some("http://127.0.0.1:9650/ext/bc/abc/rpc")
        );
    }

    #[test]
    fn test_rpc_url_falls_back_to_network_endpoint() {
        let parsed: ParsedDescription = serde_json::from_value(json!({
            "rpc_urls": { "localhost": "" },
            "wallet_connection": { "network_rpc_url": "http://10.0.0.5:9650/rpc" }
        }))
        .unwrap();
        assert_eq!(parsed.rpc_url().as_deref(), Some("http://10.0.0.5:9650/rpc"));
    }

    #[test]
    fn test_subnet_summary_keeps_extra_fields() {
        let list: SubnetList = serde_json::from_value(json!({
            "success": true,
            "subnets": [{ "name": "ChaosStarNetwork", "status": "deployed", "vm": "subnet-evm" }]
        }))
        .unwrap();
        assert_eq!(list.subnets[0].name, "ChaosStarNetwork");
        assert_eq!(list.subnets[0].details.get("vm"), Some(&json!("subnet-evm")));
    }
}
