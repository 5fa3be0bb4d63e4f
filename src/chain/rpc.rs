//! JSON-RPC 2.0 transport to an EVM node

use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

use super::abi;
use super::types::{Address, LogEntry, TxHash, TxReceipt, TxStatus, B256};
use crate::error::{ChainError, DecodeError};

#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, ChainError> {
        let raw = self
            .call_str(
                "eth_call",
                json!([{ "to": to.to_string(), "data": to_hex(data) }, "latest"]),
            )
            .await?;
        parse_blob(&raw)
    }

    pub async fn get_code(&self, address: Address) -> Result<Vec<u8>, ChainError> {
        let raw = self
            .call_str("eth_getCode", json!([address.to_string(), "latest"]))
            .await?;
        parse_blob(&raw)
    }

    /// Submit a transaction signed by the node-managed key of `from`.
    pub async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
    ) -> Result<TxHash, ChainError> {
        let raw = self
            .call_str(
                "eth_sendTransaction",
                json!([{
                    "from": from.to_string(),
                    "to": to.to_string(),
                    "data": to_hex(data),
                }]),
            )
            .await?;
        Ok(TxHash(raw))
    }

    /// `None` while the transaction is still pending.
    pub async fn get_transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TxReceipt>, ChainError> {
        let value = self
            .call("eth_getTransactionReceipt", json!([hash.0]))
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        let receipt: RpcReceipt = serde_json::from_value(value)
            .map_err(|e| ChainError::Decode(DecodeError::malformed(e.to_string())))?;
        receipt.into_receipt(hash).map(Some)
    }

    async fn call_str(&self, method: &str, params: Value) -> Result<String, ChainError> {
        match self.call(method, params).await? {
            Value::String(raw) => Ok(raw),
            other => Err(ChainError::Decode(DecodeError::malformed(format!(
                "{} returned non-string result: {}",
                method, other
            )))),
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        log::debug!("RPC {} -> {}", method, self.url);

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainError::Transport(format!("{} failed: {}", method, e)))?;

        if !response.status().is_success() {
            return Err(ChainError::Transport(format!(
                "{} returned HTTP {}",
                method,
                response.status()
            )));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|e| ChainError::Transport(format!("{} response unreadable: {}", method, e)))?;

        if let Some(error) = envelope.error {
            return Err(error.into_chain_error());
        }

        Ok(envelope.result.unwrap_or(Value::Null))
    }
}

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl RpcErrorObject {
    fn into_chain_error(self) -> ChainError {
        let reason = self
            .data
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|raw| parse_blob(raw).ok())
            .and_then(|bytes| abi::decode_revert_reason(&bytes))
            .or_else(|| {
                self.message
                    .strip_prefix("execution reverted: ")
                    .map(str::to_string)
            });
        ChainError::Rpc {
            code: self.code,
            message: self.message,
            reason,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
    #[serde(default)]
    logs: Vec<RpcLog>,
}

#[derive(Deserialize)]
struct RpcLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    #[serde(default)]
    data: String,
}

impl RpcReceipt {
    fn into_receipt(self, hash: &TxHash) -> Result<TxReceipt, ChainError> {
        let status = match self.status.as_deref().map(parse_quantity).transpose()? {
            Some(1) => TxStatus::Success,
            _ => TxStatus::Reverted,
        };
        let block_number = self
            .block_number
            .as_deref()
            .map(parse_quantity)
            .transpose()?;
        let logs = self
            .logs
            .into_iter()
            .map(RpcLog::into_entry)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TxReceipt {
            hash: hash.clone(),
            status,
            block_number,
            logs,
        })
    }
}

impl RpcLog {
    fn into_entry(self) -> Result<LogEntry, ChainError> {
        let address = self.address.parse::<Address>().map_err(|e| {
            ChainError::Decode(DecodeError::malformed(format!(
                "log address '{}': {}",
                self.address, e
            )))
        })?;
        let topics = self
            .topics
            .iter()
            .map(|topic| {
                let bytes = parse_blob(topic)?;
                if bytes.len() != 32 {
                    return Err(ChainError::Decode(DecodeError::malformed(
                        "topic is not 32 bytes",
                    )));
                }
                Ok(B256::from_slice(&bytes))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let data = if self.data.is_empty() {
            Vec::new()
        } else {
            parse_blob(&self.data)?
        };
        Ok(LogEntry {
            address,
            topics,
            data,
        })
    }
}

pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn parse_blob(raw: &str) -> Result<Vec<u8>, ChainError> {
    let digits = raw
        .trim()
        .strip_prefix("0x")
        .ok_or_else(|| DecodeError::malformed(format!("'{}' is not 0x-prefixed", raw)))?;
    hex::decode(digits).map_err(|e| ChainError::Decode(DecodeError::malformed(e.to_string())))
}

fn parse_quantity(raw: &str) -> Result<u64, ChainError> {
    let digits = raw
        .trim()
        .strip_prefix("0x")
        .ok_or_else(|| DecodeError::malformed(format!("'{}' is not 0x-prefixed", raw)))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::Decode(DecodeError::malformed(e.to_string())))
}
