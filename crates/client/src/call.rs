use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use relaycall_contracts::TrackHandle;
use tokio::sync::{Mutex, broadcast, mpsc};
use tracing::{error, info};

use crate::controller::PeerSessionController;
use crate::error::NegotiationError;
use crate::ice::{IceConfigResolver, IceTransportPolicy};
use crate::identity::SessionIdentity;
use crate::media::MediaBackend;
use crate::publish::publish;
use crate::rpc::RpcClient;
use crate::signaling::Signaling;
use crate::subscribe::{DEFAULT_POLL_INTERVAL, LoopExit, SubscribeLoop};

#[derive(Debug, Clone)]
pub struct CallSettings {
    pub room: String,
    pub ice_policy: IceTransportPolicy,
    pub poll_interval: Duration,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            room: "test".to_owned(),
            ice_policy: IceTransportPolicy::Relay,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Lifecycle notifications for the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Published { generation: u64, track: TrackHandle },
    Restarting { generation: u64 },
    RestartFailed { reason: String },
    Ended,
}

/// Audio call towards one SFU room.
///
/// `start` runs the negotiation chain once and returns its outcome. When the
/// SFU later reports the session as unknown, the chain is rerun in the
/// background; outcomes of those reruns are only reported as [`CallEvent`]s.
pub struct Call {
    inner: Arc<CallInner>,
}

struct CallInner {
    signaling: Signaling,
    resolver: IceConfigResolver,
    controller: Arc<PeerSessionController>,
    poll_interval: Duration,
    joined: AtomicBool,
    chain: Mutex<()>,
    restarts: mpsc::UnboundedSender<u64>,
    events: broadcast::Sender<CallEvent>,
}

impl Call {
    /// Must be called from within a tokio runtime.
    pub fn new(
        settings: CallSettings,
        identity: SessionIdentity,
        rpc: Arc<dyn RpcClient>,
        backend: Arc<dyn MediaBackend>,
    ) -> Self {
        let (restarts, restart_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(32);

        let inner = Arc::new(CallInner {
            signaling: Signaling::new(rpc, identity, settings.room),
            resolver: IceConfigResolver::new(settings.ice_policy),
            controller: Arc::new(PeerSessionController::new(backend)),
            poll_interval: settings.poll_interval,
            joined: AtomicBool::new(false),
            chain: Mutex::new(()),
            restarts,
            events,
        });

        tokio::spawn(supervise(Arc::downgrade(&inner), restart_rx));
        Self { inner }
    }

    /// Identity used for every negotiation of this call.
    pub fn identity(&self) -> &SessionIdentity {
        self.inner.signaling.identity()
    }

    /// Joins the room. Any active session is replaced.
    pub async fn start(&self) -> Result<TrackHandle, NegotiationError> {
        self.inner.joined.store(true, Ordering::Release);
        let _chain = self.inner.chain.lock().await;
        self.inner.negotiate().await
    }

    /// Leaves the room. No-op when not joined.
    pub async fn stop(&self) {
        let was_joined = self.inner.joined.swap(false, Ordering::AcqRel);
        let _chain = self.inner.chain.lock().await;
        self.inner.controller.stop().await;
        if was_joined {
            info!(room = self.inner.signaling.room(), "left call");
            let _ = self.inner.events.send(CallEvent::Ended);
        }
    }

    /// Flips mute on the local audio; `None` when not in a call.
    pub fn toggle_mute(&self) -> Option<bool> {
        self.inner.controller.toggle_mute()
    }

    /// Handle of the currently published track.
    pub fn track(&self) -> Option<TrackHandle> {
        self.inner.controller.active()?.track()
    }

    /// Whether a peer session is currently up.
    pub fn is_active(&self) -> bool {
        self.inner.controller.active().is_some()
    }

    /// Subscribes to lifecycle events emitted from now on.
    pub fn events(&self) -> broadcast::Receiver<CallEvent> {
        self.inner.events.subscribe()
    }
}

impl Drop for Call {
    fn drop(&mut self) {
        self.inner.controller.abandon();
    }
}

impl CallInner {
    /// Runs the chain once. Callers hold `chain`.
    async fn negotiate(&self) -> Result<TrackHandle, NegotiationError> {
        let configuration = self.resolver.resolve(&self.signaling).await?;
        let session = self.controller.start(&configuration).await?;
        let generation = session.generation();

        let track = match publish(&self.signaling, &session).await {
            Ok(track) => track,
            Err(err) => {
                self.controller.stop_generation(generation).await;
                return Err(err);
            }
        };

        let subscribe = SubscribeLoop::new(
            self.signaling.clone(),
            Arc::clone(&self.controller),
            session,
            track.clone(),
            self.poll_interval,
        );
        let restarts = self.restarts.clone();
        tokio::spawn(async move {
            if subscribe.run().await == LoopExit::Stale {
                let _ = restarts.send(generation);
            }
        });

        let _ = self.events.send(CallEvent::Published {
            generation,
            track: track.clone(),
        });
        Ok(track)
    }

    /// Decides under `chain`, so a user join that is still negotiating is
    /// seen as the newer session rather than a missing one.
    async fn restart(&self, generation: u64) {
        let _chain = self.chain.lock().await;

        if !self.joined.load(Ordering::Acquire) {
            info!(generation, "call was left, not restarting");
            return;
        }
        if self.controller.active().is_some() {
            info!(generation, "session already replaced, not restarting");
            return;
        }

        info!(generation, "restarting negotiation");
        let _ = self.events.send(CallEvent::Restarting { generation });
        if let Err(err) = self.negotiate().await {
            error!(generation, error = %err, "restart failed");
            let _ = self.events.send(CallEvent::RestartFailed {
                reason: err.to_string(),
            });
        }
    }
}

/// Reruns the negotiation chain for sessions the SFU reported as stale, one
/// request at a time.
async fn supervise(inner: Weak<CallInner>, mut restart_rx: mpsc::UnboundedReceiver<u64>) {
    while let Some(generation) = restart_rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };

        inner.restart(generation).await;
    }
}
