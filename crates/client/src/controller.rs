use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use relaycall_contracts::TrackHandle;
use tracing::{info, warn};

use crate::error::NegotiationError;
use crate::ice::IceConfiguration;
use crate::media::{MediaBackend, MediaStream, PeerConnection};

/// One live peer connection with its local audio attached.
///
/// Negotiators receive it by reference; the track handle it carries is only
/// meaningful while `generation` is the controller's active generation.
pub struct PeerSession {
    generation: u64,
    peer: Arc<dyn PeerConnection>,
    stream: MediaStream,
    track: Mutex<Option<TrackHandle>>,
}

impl PeerSession {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn peer(&self) -> &Arc<dyn PeerConnection> {
        &self.peer
    }

    pub fn stream(&self) -> &MediaStream {
        &self.stream
    }

    pub fn track(&self) -> Option<TrackHandle> {
        self.track.lock().clone()
    }

    pub(crate) fn bind_track(&self, track: TrackHandle) {
        *self.track.lock() = Some(track);
    }
}

/// Owns the single active [`PeerSession`].
pub struct PeerSessionController {
    backend: Arc<dyn MediaBackend>,
    active: Mutex<Option<Arc<PeerSession>>>,
    lifecycle: tokio::sync::Mutex<()>,
    generations: AtomicU64,
}

impl PeerSessionController {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            active: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            generations: AtomicU64::new(0),
        }
    }

    /// Tears down any active session, then builds a new one with local audio
    /// attached.
    pub async fn start(
        &self,
        configuration: &IceConfiguration,
    ) -> Result<Arc<PeerSession>, NegotiationError> {
        let _lifecycle = self.lifecycle.lock().await;
        self.teardown().await;

        let stream = self.backend.acquire_audio().await?;
        let peer = match self.backend.create_peer(configuration).await {
            Ok(peer) => peer,
            Err(err) => {
                self.backend.release_audio(&stream).await;
                return Err(err.into());
            }
        };
        if let Err(err) = peer.add_stream(&stream).await {
            // Partially attached tracks go with the peer.
            if let Err(detach_err) = peer.remove_stream(&stream).await {
                warn!(error = %detach_err, "failed to detach audio from half-built peer connection");
            }
            if let Err(close_err) = peer.close().await {
                warn!(error = %close_err, "failed to close half-built peer connection");
            }
            self.backend.release_audio(&stream).await;
            return Err(err.into());
        }

        let generation = self.generations.fetch_add(1, Ordering::AcqRel) + 1;
        let session = Arc::new(PeerSession {
            generation,
            peer,
            stream,
            track: Mutex::new(None),
        });
        *self.active.lock() = Some(Arc::clone(&session));

        info!(generation, "peer session active");
        Ok(session)
    }

    /// No-op when idle.
    pub async fn stop(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.teardown().await;
    }

    /// Stops the session only if `generation` is still the active one.
    pub async fn stop_generation(&self, generation: u64) -> bool {
        let _lifecycle = self.lifecycle.lock().await;
        if !self.is_current(generation) {
            return false;
        }
        self.teardown().await;
        true
    }

    /// Whether `generation` is the active session.
    pub fn is_current(&self, generation: u64) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|session| session.generation == generation)
    }

    /// The active session, if any.
    pub fn active(&self) -> Option<Arc<PeerSession>> {
        self.active.lock().clone()
    }

    /// Flips every local audio track and returns whether the session is now
    /// muted, or `None` without an active session.
    pub fn toggle_mute(&self) -> Option<bool> {
        let session = self.active()?;
        let mut muted = false;
        for track in session.stream.audio_tracks() {
            let enabled = !track.is_enabled();
            info!(track = track.id(), "{} local track", if enabled { "unmuting" } else { "muting" });
            track.set_enabled(enabled);
            muted = !enabled;
        }
        Some(muted)
    }

    /// Drops the active session without closing it, so that nothing keeps
    /// polling on its behalf.
    pub(crate) fn abandon(&self) {
        if let Some(session) = self.active.lock().take() {
            warn!(generation = session.generation, "abandoning peer session without teardown");
        }
    }

    async fn teardown(&self) {
        let session = self.active.lock().take();
        let Some(session) = session else {
            return;
        };

        if let Err(err) = session.peer.remove_stream(&session.stream).await {
            warn!(generation = session.generation, error = %err, "failed to detach local audio");
        }
        if let Err(err) = session.peer.close().await {
            warn!(generation = session.generation, error = %err, "failed to close peer connection");
        }
        session.track.lock().take();

        info!(generation = session.generation, "peer session closed");
    }
}
