use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Remote procedures exposed by the SFU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Turn,
    Publish,
    Subscribe,
    Answer,
    Trickle,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Turn => "turn",
            Method::Publish => "publish",
            Method::Subscribe => "subscribe",
            Method::Answer => "answer",
            Method::Trickle => "trickle",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body posted to the SFU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub id: String,
    pub method: Method,
    pub params: Vec<String>,
}

/// Response envelope. Either side may be absent; the SFU sets `error` when
/// the call was rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcFault>,
}

impl RpcResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn fault(message: impl Into<String>) -> Self {
        Self {
            error: Some(RpcFault::Message(message.into())),
            ..Self::default()
        }
    }

    /// Empty acknowledgement.
    pub fn ack() -> Self {
        Self::default()
    }
}

/// Error reported by the SFU, either as a bare string or a JSON-RPC style
/// object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcFault {
    Message(String),
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i64>,
        message: String,
    },
}

impl RpcFault {
    pub fn message(&self) -> &str {
        match self {
            RpcFault::Message(message) => message,
            RpcFault::Detailed { message, .. } => message,
        }
    }
}

impl fmt::Display for RpcFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcFault::Detailed {
                code: Some(code),
                message,
            } => write!(f, "{message} (code {code})"),
            _ => f.write_str(self.message()),
        }
    }
}
