use relaycall_contracts::{IceCandidate, TrackHandle};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::media::IceCandidateHandler;
use crate::signaling::Signaling;

/// Forwards local ICE candidates for one published track.
///
/// Every candidate is sent on its own detached task; nothing is batched,
/// acknowledged or retried.
#[derive(Clone)]
pub struct TrickleRelay {
    signaling: Signaling,
    track: TrackHandle,
    runtime: Handle,
}

impl TrickleRelay {
    /// Must be called from within a tokio runtime.
    pub fn new(signaling: Signaling, track: TrackHandle) -> Self {
        Self {
            signaling,
            track,
            runtime: Handle::current(),
        }
    }

    /// Sends one candidate without waiting for the SFU.
    pub fn relay(&self, candidate: Option<IceCandidate>) -> JoinHandle<()> {
        let relay = self.clone();
        self.runtime.spawn(async move {
            match relay.signaling.trickle(&relay.track, candidate.as_ref()).await {
                Ok(()) => debug!(track = %relay.track, "relayed ice candidate"),
                Err(err) => warn!(track = %relay.track, error = %err, "dropped ice candidate"),
            }
        })
    }

    /// Callback form for [`PeerConnection::on_ice_candidate`](crate::PeerConnection::on_ice_candidate).
    pub fn into_handler(self) -> IceCandidateHandler {
        Box::new(move |candidate: Option<IceCandidate>| {
            self.relay(candidate);
        })
    }
}
