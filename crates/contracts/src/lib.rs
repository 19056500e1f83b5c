//! Wire types shared between the relaycall negotiator and the SFU's JSON-RPC
//! surface.

pub mod rpc;
pub mod signaling;

pub use rpc::{Method, RpcFault, RpcRequest, RpcResponse};
pub use signaling::{
    IceCandidate, IceServer, PublishReply, SdpType, SessionDescription, SubscribeReply,
    TrackHandle,
};
