//! Seam between the negotiator and the media engine that actually runs the
//! peer connection.

pub mod webrtc;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use relaycall_contracts::{IceCandidate, SessionDescription};
use thiserror::Error;

use crate::ice::IceConfiguration;

/// Callback for locally discovered candidates; `None` ends gathering.
pub type IceCandidateHandler = Box<dyn Fn(Option<IceCandidate>) + Send + Sync>;

#[derive(Debug, Error)]
pub enum PeerError {
    #[error("audio capture was refused: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    WebRtc(#[from] ::webrtc::Error),

    #[error("{0}")]
    Rejected(String),

    #[error("peer connection is closed")]
    Closed,
}

/// One peer connection towards the SFU.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, PeerError>;

    async fn create_answer(&self) -> Result<SessionDescription, PeerError>;

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), PeerError>;

    async fn set_remote_description(&self, description: SessionDescription)
    -> Result<(), PeerError>;

    async fn local_description(&self) -> Option<SessionDescription>;

    /// Replaces any previously registered handler.
    fn on_ice_candidate(&self, handler: IceCandidateHandler);

    async fn add_stream(&self, stream: &MediaStream) -> Result<(), PeerError>;

    async fn remove_stream(&self, stream: &MediaStream) -> Result<(), PeerError>;

    async fn close(&self) -> Result<(), PeerError>;
}

/// Source of local audio and factory for peer connections.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Audio-only local stream.
    async fn acquire_audio(&self) -> Result<MediaStream, PeerError>;

    async fn create_peer(
        &self,
        configuration: &IceConfiguration,
    ) -> Result<Arc<dyn PeerConnection>, PeerError>;

    /// Frees a stream that never made it into a session.
    async fn release_audio(&self, _stream: &MediaStream) {}
}

/// Local audio track. Clones share the `enabled` flag.
#[derive(Debug, Clone)]
pub struct LocalAudioTrack {
    id: String,
    enabled: Arc<AtomicBool>,
}

impl LocalAudioTrack {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    audio_tracks: Vec<LocalAudioTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, audio_tracks: Vec<LocalAudioTrack>) -> Self {
        Self {
            id: id.into(),
            audio_tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn audio_tracks(&self) -> &[LocalAudioTrack] {
        &self.audio_tracks
    }
}
