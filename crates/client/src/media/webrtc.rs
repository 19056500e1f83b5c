use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use relaycall_contracts::{IceCandidate, SdpType, SessionDescription};
use tracing::{debug, info, warn};
use uuid::Uuid;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MediaEngine};
use webrtc::api::{API, APIBuilder};
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::ice_transport_policy::RTCIceTransportPolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

use super::{IceCandidateHandler, LocalAudioTrack, MediaBackend, MediaStream, PeerConnection, PeerError};
use crate::ice::{IceConfiguration, IceTransportPolicy};

type SampleTracks = Arc<Mutex<HashMap<String, Arc<TrackLocalStaticSample>>>>;

/// Media backend on top of webrtc-rs.
///
/// Local audio is an Opus sample track; the embedder feeds encoded audio with
/// [`WebRtcBackend::write_sample`].
pub struct WebRtcBackend {
    api: API,
    tracks: SampleTracks,
}

impl WebRtcBackend {
    pub fn new() -> Result<Self, PeerError> {
        // Register default codecs (includes Opus)
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let api = APIBuilder::new().with_media_engine(media_engine).build();

        Ok(Self {
            api,
            tracks: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn sample_track(&self, track_id: &str) -> Option<Arc<TrackLocalStaticSample>> {
        self.tracks.lock().get(track_id).cloned()
    }

    /// Writes one encoded sample; muted tracks drop it.
    pub async fn write_sample(&self, track: &LocalAudioTrack, sample: &Sample) -> Result<(), PeerError> {
        if !track.is_enabled() {
            return Ok(());
        }
        let local = self.sample_track(track.id()).ok_or(PeerError::Closed)?;
        local.write_sample(sample).await?;
        Ok(())
    }
}

#[async_trait]
impl MediaBackend for WebRtcBackend {
    async fn acquire_audio(&self) -> Result<MediaStream, PeerError> {
        let stream_id = format!("relaycall-{}", Uuid::new_v4());
        let track_id = Uuid::new_v4().to_string();

        let sample_track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            track_id.clone(),
            stream_id.clone(),
        ));
        self.tracks.lock().insert(track_id.clone(), sample_track);

        debug!(stream = %stream_id, track = %track_id, "created local audio track");
        Ok(MediaStream::new(stream_id, vec![LocalAudioTrack::new(track_id)]))
    }

    async fn create_peer(
        &self,
        configuration: &IceConfiguration,
    ) -> Result<Arc<dyn PeerConnection>, PeerError> {
        let config = rtc_configuration(configuration);
        let connection = Arc::new(self.api.new_peer_connection(config).await?);

        // Log only; teardown is driven by the controller
        connection.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            Box::pin(async move {
                info!("peer connection state: {}", state);
            })
        }));

        Ok(Arc::new(WebRtcPeer {
            connection,
            tracks: Arc::clone(&self.tracks),
            senders: Mutex::new(HashMap::new()),
        }))
    }

    async fn release_audio(&self, stream: &MediaStream) {
        let mut tracks = self.tracks.lock();
        for track in stream.audio_tracks() {
            tracks.remove(track.id());
        }
        debug!(stream = stream.id(), "released local audio");
    }
}

fn rtc_configuration(configuration: &IceConfiguration) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: configuration
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect(),
        ice_transport_policy: match configuration.ice_transport_policy {
            IceTransportPolicy::Relay => RTCIceTransportPolicy::Relay,
            IceTransportPolicy::All => RTCIceTransportPolicy::All,
        },
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

struct WebRtcPeer {
    connection: Arc<RTCPeerConnection>,
    tracks: SampleTracks,
    senders: Mutex<HashMap<String, Arc<RTCRtpSender>>>,
}

#[async_trait]
impl PeerConnection for WebRtcPeer {
    async fn create_offer(&self) -> Result<SessionDescription, PeerError> {
        from_rtc(self.connection.create_offer(None).await?)
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        from_rtc(self.connection.create_answer(None).await?)
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), PeerError> {
        self.connection
            .set_local_description(to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        self.connection
            .set_remote_description(to_rtc(description)?)
            .await?;
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        let description = self.connection.local_description().await?;
        from_rtc(description).ok()
    }

    fn on_ice_candidate(&self, handler: IceCandidateHandler) {
        let handler = Arc::new(handler);
        self.connection
            .on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
                let handler = Arc::clone(&handler);
                Box::pin(async move {
                    let Some(candidate) = candidate else {
                        handler(None);
                        return;
                    };
                    let encoded = candidate
                        .to_json()
                        .map_err(|err| err.to_string())
                        .and_then(|init| serde_json::to_value(init).map_err(|err| err.to_string()));
                    match encoded {
                        Ok(value) => handler(Some(IceCandidate::new(value))),
                        Err(err) => warn!(error = %err, "failed to encode local ice candidate"),
                    }
                })
            }));
    }

    async fn add_stream(&self, stream: &MediaStream) -> Result<(), PeerError> {
        for track in stream.audio_tracks() {
            let local = self.tracks.lock().get(track.id()).cloned().ok_or_else(|| {
                PeerError::Rejected(format!("unknown local track {}", track.id()))
            })?;

            let sender = self
                .connection
                .add_track(local as Arc<dyn TrackLocal + Send + Sync>)
                .await?;
            self.senders.lock().insert(track.id().to_owned(), sender);
        }
        Ok(())
    }

    async fn remove_stream(&self, stream: &MediaStream) -> Result<(), PeerError> {
        for track in stream.audio_tracks() {
            self.tracks.lock().remove(track.id());
            let sender = self.senders.lock().remove(track.id());
            if let Some(sender) = sender {
                self.connection.remove_track(&sender).await?;
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.connection.close().await?;
        Ok(())
    }
}

fn from_rtc(description: RTCSessionDescription) -> Result<SessionDescription, PeerError> {
    let sdp_type = match description.sdp_type {
        RTCSdpType::Offer => SdpType::Offer,
        RTCSdpType::Answer => SdpType::Answer,
        RTCSdpType::Pranswer => SdpType::Pranswer,
        RTCSdpType::Rollback => SdpType::Rollback,
        RTCSdpType::Unspecified => {
            return Err(PeerError::Rejected("session description without a type".into()));
        }
    };
    Ok(SessionDescription {
        sdp_type,
        sdp: description.sdp,
    })
}

fn to_rtc(description: SessionDescription) -> Result<RTCSessionDescription, PeerError> {
    match description.sdp_type {
        SdpType::Offer => Ok(RTCSessionDescription::offer(description.sdp)?),
        SdpType::Answer => Ok(RTCSessionDescription::answer(description.sdp)?),
        other => Err(PeerError::Rejected(format!(
            "unsupported session description type {other:?}"
        ))),
    }
}
