//! Client-side negotiator for publishing an audio session to an SFU over its
//! JSON-RPC signaling surface.
//!
//! The [`Call`] facade drives the whole chain: ICE configuration, peer session,
//! publish, ICE trickling and the subscribe poll loop that restarts the chain
//! when the SFU forgets the participant.

pub mod call;
pub mod controller;
pub mod error;
pub mod ice;
pub mod identity;
pub mod media;
pub mod publish;
pub mod rpc;
pub mod signaling;
pub mod subscribe;
pub mod trickle;

pub use call::{Call, CallEvent, CallSettings};
pub use controller::{PeerSession, PeerSessionController};
pub use error::NegotiationError;
pub use ice::{IceConfigResolver, IceConfiguration, IceTransportPolicy};
pub use identity::{SessionIdentity, encode_username};
pub use media::webrtc::WebRtcBackend;
pub use media::{LocalAudioTrack, MediaBackend, MediaStream, PeerConnection, PeerError};
pub use relaycall_contracts as contracts;
pub use rpc::http::HttpRpcClient;
pub use rpc::{RpcClient, RpcError, SfuFault};
pub use signaling::Signaling;
