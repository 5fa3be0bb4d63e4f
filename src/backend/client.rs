use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::types::{AddressesResponse, SubnetDescription, SubnetList, SubnetSummary};
use crate::contracts::{AddressSource, ContractAddresses};
use crate::error::{BackendError, ServiceError};

/// Subnet listing and description lookups.
#[async_trait]
pub trait SubnetDirectory: Send + Sync {
    async fn list_subnets(&self) -> Result<Vec<SubnetSummary>, BackendError>;

    async fn describe_subnet(&self, name: &str) -> Result<SubnetDescription, BackendError>;
}

/// HTTP client for the dashboard backend.
pub struct BackendClient {
    client: reqwest::Client,
    base_url: reqwest::Url,
    address_deadline: Duration,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, BackendError> {
        let base_url = reqwest::Url::parse(base_url)
            .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(BackendError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
            address_deadline: Duration::from_secs(5),
        })
    }

    pub fn with_address_deadline(mut self, deadline: Duration) -> Self {
        self.address_deadline = deadline;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Network status passthrough
    pub async fn network_status(&self) -> Result<Value, BackendError> {
        self.get_json(&["avalanche-info", "network", "status"], &[])
            .await
    }

    /// Subnet analytics passthrough; `network` is forwarded as a query parameter.
    pub async fn subnet_stats(&self, name: &str, network: Option<&str>) -> Result<Value, BackendError> {
        let query: Vec<(&str, &str)> = network.map(|n| ("network", n)).into_iter().collect();
        self.get_json(&["avalanche-info", "subnet", name, "stats"], &query)
            .await
    }

    pub async fn contract_addresses(&self) -> Result<Option<ContractAddresses>, BackendError> {
        let response: AddressesResponse = self.get_json(&["contracts", "addresses"], &[]).await?;
        if !response.success {
            return Ok(None);
        }
        Ok(response.addresses.filter(|addresses| !addresses.is_empty()))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<reqwest::Url, BackendError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, BackendError> {
        let url = self.endpoint(segments)?;
        log::debug!("GET {}", url);

        let response = self.client.get(url.clone()).query(query).send().await?;

        if !response.status().is_success() {
            return Err(BackendError::Status {
                endpoint: url.path().to_string(),
                status: response.status().as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("{}: {}", url.path(), e)))
    }
}

#[async_trait]
impl SubnetDirectory for BackendClient {
    async fn list_subnets(&self) -> Result<Vec<SubnetSummary>, BackendError> {
        let list: SubnetList = self.get_json(&["avalanche-info", "subnets"], &[]).await?;
        Ok(list.subnets)
    }

    async fn describe_subnet(&self, name: &str) -> Result<SubnetDescription, BackendError> {
        self.get_json(&["avalanche-info", "subnet", name, "describe"], &[])
            .await
    }
}

#[async_trait]
impl AddressSource for BackendClient {
    fn name(&self) -> String {
        format!("backend {}", self.base_url)
    }

    fn deadline(&self) -> Duration {
        self.address_deadline
    }

    async fn fetch(&self) -> Result<Option<ContractAddresses>, ServiceError> {
        Ok(self.contract_addresses().await?)
    }
}
