#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use relaycall_client::contracts::{
    IceCandidate, Method, RpcResponse, SessionDescription, TrackHandle,
};
use relaycall_client::media::IceCandidateHandler;
use relaycall_client::{
    Call, CallSettings, IceConfiguration, IceTransportPolicy, LocalAudioTrack, MediaBackend,
    MediaStream, PeerConnection, PeerError, RpcClient, RpcError, SessionIdentity,
};
use serde_json::{Value, json};
use uuid::Uuid;

pub const ROOM: &str = "test";
pub const USERNAME: &str = "u1:bmF0aXZl";
pub const ENCODED_USERNAME: &str = "u1%3AbmF0aXZl";

/// Ordered record of everything the fakes observed.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.lock().iter().position(|e| e == entry)
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub params: Vec<String>,
}

enum Reply {
    Respond(RpcResponse),
    Delayed(Duration, RpcResponse),
    Fail(String),
}

/// Scripted SFU. Unscripted calls get a per-method default.
pub struct FakeRpc {
    log: Log,
    calls: Mutex<Vec<RecordedCall>>,
    scripts: Mutex<HashMap<Method, VecDeque<Reply>>>,
}

impl FakeRpc {
    pub fn new(log: Log) -> Arc<Self> {
        Arc::new(Self {
            log,
            calls: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
        })
    }

    pub fn respond(&self, method: Method, response: RpcResponse) {
        self.push(method, Reply::Respond(response));
    }

    /// Answers with `response` once `delay` has passed.
    pub fn respond_after(&self, method: Method, delay: Duration, response: RpcResponse) {
        self.push(method, Reply::Delayed(delay, response));
    }

    pub fn fail(&self, method: Method, reason: &str) {
        self.push(method, Reply::Fail(reason.to_owned()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, method: Method) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.method == method)
            .cloned()
            .collect()
    }

    pub fn count(&self, method: Method) -> usize {
        self.calls_for(method).len()
    }

    fn push(&self, method: Method, reply: Reply) {
        self.scripts.lock().entry(method).or_default().push_back(reply);
    }

    fn default_reply(method: Method) -> RpcResponse {
        match method {
            Method::Turn => RpcResponse::ok(json!([])),
            Method::Publish => RpcResponse::fault("publish not scripted"),
            Method::Subscribe | Method::Answer | Method::Trickle => RpcResponse::ack(),
        }
    }
}

#[async_trait]
impl RpcClient for FakeRpc {
    async fn call(&self, method: Method, params: Vec<String>) -> Result<RpcResponse, RpcError> {
        self.log.push(format!("rpc:{method}"));
        self.calls.lock().push(RecordedCall { method, params });

        let scripted = self
            .scripts
            .lock()
            .get_mut(&method)
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Delayed(delay, response)) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Some(Reply::Fail(reason)) => Err(RpcError::Unavailable { method, reason }),
            None => Ok(Self::default_reply(method)),
        }
    }
}

pub struct FakePeer {
    pub index: usize,
    log: Log,
    local: Mutex<Option<SessionDescription>>,
    remote: Mutex<Vec<SessionDescription>>,
    handler: Mutex<Option<Arc<IceCandidateHandler>>>,
    streams: Mutex<Vec<String>>,
    closed: AtomicBool,
    reject_streams: bool,
}

impl FakePeer {
    fn entry(&self, what: &str) -> String {
        format!("peer{}:{what}", self.index)
    }

    pub fn remote_descriptions(&self) -> Vec<SessionDescription> {
        self.remote.lock().clone()
    }

    pub fn attached_streams(&self) -> Vec<String> {
        self.streams.lock().clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn has_candidate_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Simulates local candidate discovery.
    pub fn discover(&self, candidate: Option<Value>) {
        let handler = self.handler.lock().clone().expect("no candidate handler registered");
        handler(candidate.map(IceCandidate::new));
    }
}

#[async_trait]
impl PeerConnection for FakePeer {
    async fn create_offer(&self) -> Result<SessionDescription, PeerError> {
        Ok(SessionDescription::offer(format!("offer-{}", self.index)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, PeerError> {
        Ok(SessionDescription::answer(format!("answer-{}", self.index)))
    }

    async fn set_local_description(&self, description: SessionDescription) -> Result<(), PeerError> {
        tokio::task::yield_now().await;
        self.log
            .push(self.entry(&format!("set_local:{}", description.sdp)));
        *self.local.lock() = Some(description);
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), PeerError> {
        self.log
            .push(self.entry(&format!("set_remote:{}", description.sdp)));
        self.remote.lock().push(description);
        Ok(())
    }

    async fn local_description(&self) -> Option<SessionDescription> {
        self.local.lock().clone()
    }

    fn on_ice_candidate(&self, handler: IceCandidateHandler) {
        *self.handler.lock() = Some(Arc::new(handler));
    }

    async fn add_stream(&self, stream: &MediaStream) -> Result<(), PeerError> {
        self.streams.lock().push(stream.id().to_owned());
        if self.reject_streams {
            return Err(PeerError::Rejected("no sender for audio".into()));
        }
        Ok(())
    }

    async fn remove_stream(&self, stream: &MediaStream) -> Result<(), PeerError> {
        self.log.push(self.entry("remove_stream"));
        self.streams.lock().retain(|id| id != stream.id());
        Ok(())
    }

    async fn close(&self) -> Result<(), PeerError> {
        self.log.push(self.entry("close"));
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FakeBackend {
    log: Log,
    peers: Mutex<Vec<Arc<FakePeer>>>,
    configurations: Mutex<Vec<IceConfiguration>>,
    tracks: Mutex<Vec<LocalAudioTrack>>,
    released: Mutex<Vec<String>>,
    deny_audio: AtomicBool,
    fail_peers: AtomicBool,
    reject_streams: AtomicBool,
    streams: AtomicUsize,
}

impl FakeBackend {
    pub fn new(log: Log) -> Arc<Self> {
        Arc::new(Self {
            log,
            peers: Mutex::new(Vec::new()),
            configurations: Mutex::new(Vec::new()),
            tracks: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            deny_audio: AtomicBool::new(false),
            fail_peers: AtomicBool::new(false),
            reject_streams: AtomicBool::new(false),
            streams: AtomicUsize::new(0),
        })
    }

    pub fn deny_audio(&self) {
        self.deny_audio.store(true, Ordering::SeqCst);
    }

    /// Peer creation fails from now on.
    pub fn fail_peers(&self) {
        self.fail_peers.store(true, Ordering::SeqCst);
    }

    /// Peers created from now on refuse to attach local audio.
    pub fn reject_streams(&self) {
        self.reject_streams.store(true, Ordering::SeqCst);
    }

    /// Streams handed back through `release_audio`.
    pub fn released(&self) -> Vec<String> {
        self.released.lock().clone()
    }

    pub fn peers(&self) -> Vec<Arc<FakePeer>> {
        self.peers.lock().clone()
    }

    pub fn peer(&self, index: usize) -> Arc<FakePeer> {
        self.peers.lock()[index - 1].clone()
    }

    pub fn configurations(&self) -> Vec<IceConfiguration> {
        self.configurations.lock().clone()
    }

    pub fn tracks(&self) -> Vec<LocalAudioTrack> {
        self.tracks.lock().clone()
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    async fn acquire_audio(&self) -> Result<MediaStream, PeerError> {
        if self.deny_audio.load(Ordering::SeqCst) {
            return Err(PeerError::PermissionDenied("microphone blocked".into()));
        }
        let n = self.streams.fetch_add(1, Ordering::SeqCst) + 1;
        let track = LocalAudioTrack::new(format!("audio-{n}"));
        self.tracks.lock().push(track.clone());
        Ok(MediaStream::new(format!("stream-{n}"), vec![track]))
    }

    async fn create_peer(
        &self,
        configuration: &IceConfiguration,
    ) -> Result<Arc<dyn PeerConnection>, PeerError> {
        self.configurations.lock().push(configuration.clone());
        if self.fail_peers.load(Ordering::SeqCst) {
            return Err(PeerError::Rejected("peer connection factory unavailable".into()));
        }
        let mut peers = self.peers.lock();
        let peer = Arc::new(FakePeer {
            index: peers.len() + 1,
            log: self.log.clone(),
            local: Mutex::new(None),
            remote: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
            streams: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            reject_streams: self.reject_streams.load(Ordering::SeqCst),
        });
        peers.push(Arc::clone(&peer));
        Ok(peer)
    }

    async fn release_audio(&self, stream: &MediaStream) {
        self.log.push(format!("release:{}", stream.id()));
        self.released.lock().push(stream.id().to_owned());
    }
}

pub struct Harness {
    pub log: Log,
    pub rpc: Arc<FakeRpc>,
    pub backend: Arc<FakeBackend>,
    pub call: Call,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(IceTransportPolicy::Relay)
    }

    pub fn with_policy(ice_policy: IceTransportPolicy) -> Self {
        let log = Log::default();
        let rpc = FakeRpc::new(log.clone());
        let backend = FakeBackend::new(log.clone());
        let settings = CallSettings {
            room: ROOM.to_owned(),
            ice_policy,
            poll_interval: Duration::from_millis(3000),
        };
        let call = Call::new(
            settings,
            identity(),
            rpc.clone(),
            backend.clone(),
        );
        Self {
            log,
            rpc,
            backend,
            call,
        }
    }

    /// Scripts a successful publish answered for `track`.
    pub fn accept_publish(&self, track: &str) {
        self.rpc.respond(Method::Publish, publish_reply(track));
    }

    pub fn subscribes_for(&self, track: &str) -> usize {
        self.rpc
            .calls_for(Method::Subscribe)
            .iter()
            .filter(|call| call.params[2] == track)
            .count()
    }
}

pub fn identity() -> SessionIdentity {
    SessionIdentity::with_username(Uuid::nil(), USERNAME)
}

pub fn two_turn_servers() -> RpcResponse {
    RpcResponse::ok(json!([
        {"urls": "turn:turn1.example.org:443", "username": "a", "credential": "x"},
        {"urls": ["turn:turn2.example.org:443"], "username": "b", "credential": "y"}
    ]))
}

pub fn publish_reply(track: &str) -> RpcResponse {
    let jsep = SessionDescription::answer("sfu-answer").to_json().unwrap();
    RpcResponse::ok(json!({"jsep": jsep, "track": TrackHandle::new(track)}))
}

pub fn subscribe_offer(sdp: &str) -> RpcResponse {
    let jsep = SessionDescription::offer(sdp).to_json().unwrap();
    RpcResponse::ok(json!({"jsep": jsep}))
}

/// Polls `check` on virtual time until it holds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

/// Lets virtual time run for `duration`.
pub async fn idle_for(duration: Duration) {
    tokio::time::sleep(duration).await;
}
