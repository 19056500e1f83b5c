//! Request/response channel to the SFU.

pub mod http;

use async_trait::async_trait;
use relaycall_contracts::{Method, RpcFault, RpcResponse};
use serde_json::Value;
use thiserror::Error;

use crate::identity::SessionIdentity;

/// Transport that carries one call to the SFU and returns its envelope.
///
/// Concurrent calls may complete in any order.
#[async_trait]
pub trait RpcClient: Send + Sync {
    async fn call(&self, method: Method, params: Vec<String>) -> Result<RpcResponse, RpcError>;
}

/// The call never produced a response envelope.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("failed to build http client: {0}")]
    Setup(#[source] reqwest::Error),

    #[error("{method} request failed: {source}")]
    Request {
        method: Method,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} returned http status {status}")]
    Status { method: Method, status: u16 },

    #[error("{method} response could not be decoded: {source}")]
    Decode {
        method: Method,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} transport unavailable: {reason}")]
    Unavailable { method: Method, reason: String },
}

/// Error reported inside a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SfuFault {
    /// The SFU dropped this participant; every handle it issued is gone.
    #[error("{username} not known to the sfu")]
    UnknownSession { username: String },

    #[error("{0}")]
    Rejected(String),
}

impl SfuFault {
    /// The SFU has no error codes for this; it reports `<username> not found in <room>`.
    pub fn classify(fault: &RpcFault, identity: &SessionIdentity) -> Self {
        let message = fault.message();
        let forgotten = [identity.encoded_username(), identity.username()]
            .iter()
            .any(|username| message.contains(&format!("{username} not found in")));

        if forgotten {
            SfuFault::UnknownSession {
                username: identity.username().to_owned(),
            }
        } else {
            SfuFault::Rejected(fault.to_string())
        }
    }
}

/// Splits an envelope into its payload or a classified fault.
pub fn interpret(
    response: RpcResponse,
    identity: &SessionIdentity,
) -> Result<Option<Value>, SfuFault> {
    match response.error {
        Some(fault) => Err(SfuFault::classify(&fault, identity)),
        None => Ok(response.data),
    }
}
