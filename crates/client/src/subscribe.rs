use std::sync::Arc;
use std::time::Duration;

use relaycall_contracts::{SdpType, TrackHandle};
use tracing::{debug, info, warn};

use crate::controller::{PeerSession, PeerSessionController};
use crate::error::NegotiationError;
use crate::signaling::Signaling;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Why a subscribe loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// Its session is no longer the active one.
    Superseded,
    /// The SFU forgot the participant; the session was closed and the chain
    /// needs a restart.
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Poll {
    Idle,
    Answered,
    Stale,
}

/// Polls the SFU for offers to answer on behalf of one peer session.
pub struct SubscribeLoop {
    signaling: Signaling,
    controller: Arc<PeerSessionController>,
    session: Arc<PeerSession>,
    track: TrackHandle,
    interval: Duration,
}

impl SubscribeLoop {
    pub fn new(
        signaling: Signaling,
        controller: Arc<PeerSessionController>,
        session: Arc<PeerSession>,
        track: TrackHandle,
        interval: Duration,
    ) -> Self {
        Self {
            signaling,
            controller,
            session,
            track,
            interval,
        }
    }

    /// Iterations never overlap. An iteration already running when the
    /// session is torn down completes; only the next one is suppressed.
    pub async fn run(self) -> LoopExit {
        let generation = self.session.generation();
        info!(generation, track = %self.track, "subscribe loop started");

        loop {
            match self.poll_once().await {
                Ok(Poll::Stale) => {
                    warn!(generation, track = %self.track, "sfu lost this session, closing it");
                    self.controller.stop_generation(generation).await;
                    return LoopExit::Stale;
                }
                Ok(Poll::Answered) => debug!(generation, "answered remote offer"),
                Ok(Poll::Idle) => {}
                Err(err) => warn!(generation, error = %err, "subscribe iteration failed"),
            }

            if !self.controller.is_current(generation) {
                break;
            }
            tokio::time::sleep(self.interval).await;
            if !self.controller.is_current(generation) {
                break;
            }
        }

        debug!(generation, track = %self.track, "subscribe loop superseded");
        LoopExit::Superseded
    }

    async fn poll_once(&self) -> Result<Poll, NegotiationError> {
        let description = match self.signaling.subscribe(&self.track).await {
            Ok(Some(description)) => description,
            Ok(None) => return Ok(Poll::Idle),
            Err(err) if err.is_stale() => return Ok(Poll::Stale),
            Err(err) => return Err(err),
        };

        if description.sdp_type != SdpType::Offer {
            debug!(sdp_type = ?description.sdp_type, "ignoring non-offer from subscribe");
            return Ok(Poll::Idle);
        }

        let peer = self.session.peer();
        peer.set_remote_description(description).await?;
        let answer = peer.create_answer().await?;
        peer.set_local_description(answer.clone()).await?;

        match self.signaling.answer(&self.track, &answer).await {
            Ok(()) => Ok(Poll::Answered),
            Err(err) if err.is_stale() => Ok(Poll::Stale),
            Err(err) => {
                warn!(track = %self.track, error = %err, "answer was not delivered");
                Ok(Poll::Answered)
            }
        }
    }
}
