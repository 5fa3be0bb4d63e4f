//! Error types for Chaos Star client operations
//!
//! Read paths swallow "resource does not exist yet" failures into empty or
//! absent results; write paths always surface one of these errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::chain::TxHash;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Wallet not connected: {0}")]
    NotConnected(String),

    #[error("Contract unavailable: {0}")]
    ContractUnavailable(String),

    #[error("Contract call timeout after {}ms", .0.as_millis())]
    CallTimeout(Duration),

    #[error("Transaction failed: {hash}")]
    TransactionFailed { hash: TxHash },

    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ServiceError {
    /// Human-readable failure text for a notification.
    ///
    /// Prefers the contract's revert reason, then the error's own message, then
    /// the caller-supplied fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        if let Self::Chain(chain) = self {
            if let Some(reason) = chain.reason() {
                return reason.to_string();
            }
        }
        let message = self.to_string();
        if message.trim().is_empty() {
            fallback.to_string()
        } else {
            message
        }
    }
}

/// Failures reported by the JSON-RPC node or while talking to it.
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        /// Decoded `Error(string)` revert payload, when the node returned one
        reason: Option<String>,
    },

    #[error("Undecodable response: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transaction {hash} not included after {attempts} attempts")]
    NotIncluded { hash: TxHash, attempts: u32 },
}

impl ChainError {
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Rpc { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    /// True when the node answered but the payload carries no usable value.
    pub fn is_decode_absent(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Typed signal for an empty or malformed ABI payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty response")]
    Empty,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("value does not fit in 64 bits")]
    Overflow,
}

impl DecodeError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),

    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match self {
            ServiceError::NotConnected(_) => StatusCode::UNAUTHORIZED,
            ServiceError::ContractUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::CallTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::TransactionFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Backend(_) | ServiceError::Chain(_) => StatusCode::BAD_GATEWAY,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.user_message("Request failed"),
        }));

        (status, body).into_response()
    }
}
