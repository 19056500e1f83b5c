use relaycall_contracts::{Method, SdpType, TrackHandle};
use tracing::{debug, info};

use crate::controller::PeerSession;
use crate::error::NegotiationError;
use crate::signaling::{Signaling, parse_jsep};
use crate::trickle::TrickleRelay;

/// Publishes the session's local audio and binds the track handle the SFU
/// assigns to it.
///
/// The offer is committed as the local description before it is sent. Once
/// the SFU's answer is applied, local candidates start trickling for the new
/// handle. Nothing is retried.
pub async fn publish(
    signaling: &Signaling,
    session: &PeerSession,
) -> Result<TrackHandle, NegotiationError> {
    let peer = session.peer();
    let generation = session.generation();

    // Local description must be in place before the SFU sees the offer
    let offer = peer.create_offer().await?;
    peer.set_local_description(offer.clone()).await?;
    let local = peer.local_description().await.unwrap_or(offer);
    debug!(generation, "local offer committed");

    let reply = signaling.publish(&local).await?;
    let jsep = parse_jsep(Method::Publish, &reply.jsep)?;
    if jsep.sdp_type != SdpType::Answer {
        return Err(NegotiationError::ProtocolMismatch(format!(
            "publish returned {:?} instead of an answer",
            jsep.sdp_type
        )));
    }

    // Bind before trickling so candidates carry the new handle
    peer.set_remote_description(jsep).await?;
    session.bind_track(reply.track.clone());
    peer.on_ice_candidate(TrickleRelay::new(signaling.clone(), reply.track.clone()).into_handler());

    info!(generation, track = %reply.track, room = signaling.room(), "published local audio");
    Ok(reply.track)
}
