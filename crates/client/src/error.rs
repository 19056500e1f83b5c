use relaycall_contracts::Method;
use thiserror::Error;

use crate::media::PeerError;
use crate::rpc::{RpcError, SfuFault};

/// Failure of one negotiation step.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("rpc transport failure: {0}")]
    Transport(#[from] RpcError),

    #[error("ice configuration could not be resolved: {0}")]
    ConfigResolutionFailed(#[source] RpcError),

    #[error("protocol mismatch: {0}")]
    ProtocolMismatch(String),

    /// The SFU no longer knows this participant. Recovered by restarting the
    /// whole negotiation chain.
    #[error("session {username} is no longer known to the sfu")]
    SessionStale { username: String },

    #[error("sfu rejected {method}: {message}")]
    Remote { method: Method, message: String },

    #[error("local audio unavailable: {0}")]
    PermissionDenied(String),

    #[error("peer connection error: {0}")]
    Peer(#[source] PeerError),

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl NegotiationError {
    pub(crate) fn from_fault(method: Method, fault: SfuFault) -> Self {
        match fault {
            SfuFault::UnknownSession { username } => NegotiationError::SessionStale { username },
            SfuFault::Rejected(message) => NegotiationError::Remote { method, message },
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, NegotiationError::SessionStale { .. })
    }
}

impl From<PeerError> for NegotiationError {
    fn from(err: PeerError) -> Self {
        match err {
            PeerError::PermissionDenied(reason) => NegotiationError::PermissionDenied(reason),
            other => NegotiationError::Peer(other),
        }
    }
}
