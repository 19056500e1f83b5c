use std::sync::Arc;

use relaycall_contracts::{
    IceCandidate, IceServer, Method, PublishReply, SessionDescription, SubscribeReply,
    TrackHandle,
};
use serde_json::Value;
use tracing::warn;

use crate::error::NegotiationError;
use crate::identity::SessionIdentity;
use crate::rpc::{self, RpcClient, RpcError};

/// Typed view of the SFU's procedures for one participant in one room.
///
/// Room and username are percent-encoded once and sent that way on every call.
#[derive(Clone)]
pub struct Signaling {
    rpc: Arc<dyn RpcClient>,
    identity: SessionIdentity,
    room: String,
    encoded_room: String,
}

impl Signaling {
    /// Encodes `room` for the wire.
    pub fn new(rpc: Arc<dyn RpcClient>, identity: SessionIdentity, room: impl Into<String>) -> Self {
        let room = room.into();
        let encoded_room = urlencoding::encode(&room).into_owned();
        Self {
            rpc,
            identity,
            room,
            encoded_room,
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// TURN credentials. Anything that is not a server list counts as none.
    pub async fn turn(&self) -> Result<Vec<IceServer>, RpcError> {
        let response = self
            .rpc
            .call(Method::Turn, vec![self.identity.encoded_username().to_owned()])
            .await?;

        let data = match rpc::interpret(response, &self.identity) {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(Vec::new()),
            Err(fault) => {
                warn!(error = %fault, "turn call rejected, continuing without relay servers");
                return Ok(Vec::new());
            }
        };

        match serde_json::from_value::<Vec<IceServer>>(data) {
            Ok(servers) => Ok(servers),
            Err(err) => {
                warn!(error = %err, "ignoring malformed turn server list");
                Ok(Vec::new())
            }
        }
    }

    /// Sends the local offer; the reply carries the SFU's answer and the
    /// handle of the published track.
    pub async fn publish(&self, offer: &SessionDescription) -> Result<PublishReply, NegotiationError> {
        let params = vec![
            self.encoded_room.clone(),
            self.identity.encoded_username().to_owned(),
            offer.to_json()?,
        ];
        let data = self
            .call(Method::Publish, params)
            .await?
            .ok_or_else(|| NegotiationError::ProtocolMismatch("publish returned no data".into()))?;

        serde_json::from_value(data).map_err(|err| {
            NegotiationError::ProtocolMismatch(format!("malformed publish reply: {err}"))
        })
    }

    /// Pending remote offer (or other descriptor) for `track`, if any.
    pub async fn subscribe(
        &self,
        track: &TrackHandle,
    ) -> Result<Option<SessionDescription>, NegotiationError> {
        let params = vec![
            self.encoded_room.clone(),
            self.identity.encoded_username().to_owned(),
            track.to_string(),
        ];
        let Some(data) = self.call(Method::Subscribe, params).await? else {
            return Ok(None);
        };

        let reply: SubscribeReply = serde_json::from_value(data).map_err(|err| {
            NegotiationError::ProtocolMismatch(format!("malformed subscribe reply: {err}"))
        })?;

        match reply.jsep.as_deref() {
            None | Some("") => Ok(None),
            Some(jsep) => parse_jsep(Method::Subscribe, jsep).map(Some),
        }
    }

    /// Delivers the local answer to an offer received for `track`.
    pub async fn answer(
        &self,
        track: &TrackHandle,
        answer: &SessionDescription,
    ) -> Result<(), NegotiationError> {
        let params = vec![
            self.encoded_room.clone(),
            self.identity.encoded_username().to_owned(),
            track.to_string(),
            answer.to_json()?,
        ];
        self.call(Method::Answer, params).await.map(drop)
    }

    /// Relays one local candidate. `None` is sent as `null`.
    pub async fn trickle(
        &self,
        track: &TrackHandle,
        candidate: Option<&IceCandidate>,
    ) -> Result<(), NegotiationError> {
        let params = vec![
            self.encoded_room.clone(),
            self.identity.encoded_username().to_owned(),
            track.to_string(),
            IceCandidate::encode(candidate),
        ];
        self.call(Method::Trickle, params).await.map(drop)
    }

    async fn call(
        &self,
        method: Method,
        params: Vec<String>,
    ) -> Result<Option<Value>, NegotiationError> {
        let response = self.rpc.call(method, params).await?;
        rpc::interpret(response, &self.identity)
            .map_err(|fault| NegotiationError::from_fault(method, fault))
    }
}

pub(crate) fn parse_jsep(method: Method, jsep: &str) -> Result<SessionDescription, NegotiationError> {
    SessionDescription::from_json(jsep).map_err(|err| {
        NegotiationError::ProtocolMismatch(format!("malformed {method} descriptor: {err}"))
    })
}
