use std::time::Duration;

use async_trait::async_trait;
use relaycall_contracts::{Method, RpcRequest, RpcResponse};
use tracing::debug;
use uuid::Uuid;

use super::{RpcClient, RpcError};

/// JSON-RPC over HTTP POST, one request per call.
#[derive(Debug, Clone)]
pub struct HttpRpcClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpRpcClient {
    /// Client posting to `endpoint`; `timeout` bounds each whole request.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RpcError::Setup)?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl RpcClient for HttpRpcClient {
    async fn call(&self, method: Method, params: Vec<String>) -> Result<RpcResponse, RpcError> {
        let request = RpcRequest {
            id: Uuid::new_v4().to_string(),
            method,
            params,
        };
        debug!(%method, id = %request.id, "sending rpc request");

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|source| RpcError::Request { method, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Status {
                method,
                status: status.as_u16(),
            });
        }

        response
            .json::<RpcResponse>()
            .await
            .map_err(|source| RpcError::Decode { method, source })
    }
}
