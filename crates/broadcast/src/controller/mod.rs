//! Signaling controller: the negotiation state machine
//!
//! All asynchronous completions funnel into one event queue and are processed
//! strictly in arrival order, so handler logic never observes interleaved
//! state. The controller announces readiness once local media is up, answers
//! a remote `ready` with an offer, and applies the remote answer and
//! candidates as they arrive. Unexpected or malformed traffic is logged and
//! dropped, never fatal.

mod events;

pub use events::{ControllerEvent, EVENT_QUEUE_DEPTH};

use crate::config::BroadcastConfig;
use crate::media::{LocalMediaStream, MediaSource};
use crate::peer::{PeerSession, PeerSessionFactory, RemoteTrackInfo};
use crate::signaling::{IceCandidateInit, SessionDescription, SignalChannel, SignalPayload};
use crate::Error;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Negotiation progress, advanced only by [`SignalingController::process`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Not yet connected to the relay
    Idle,

    /// Channel open, waiting for local media acquisition
    AwaitingLocalMedia,

    /// Local media ready and `ready` announced, waiting for a peer
    AnnouncedReady,

    /// An offer is out, waiting for the remote answer
    Negotiating,

    /// Remote answer applied
    Connected,
}

/// Drives one broadcast: channel, local media, and a single peer session
pub struct SignalingController {
    config: BroadcastConfig,
    state: ControllerState,
    channel: Arc<dyn SignalChannel>,
    media: Arc<dyn MediaSource>,
    sessions: Arc<dyn PeerSessionFactory>,
    session: Option<Arc<dyn PeerSession>>,
    local_stream: Option<LocalMediaStream>,
    remote_tracks: Vec<RemoteTrackInfo>,
    events_tx: mpsc::Sender<ControllerEvent>,
    events_rx: mpsc::Receiver<ControllerEvent>,
}

impl SignalingController {
    /// Assemble a controller over its collaborators
    ///
    /// # Arguments
    ///
    /// * `config` - Broadcast configuration, already validated
    /// * `channel` - Connected message channel to the relay
    /// * `media` - Local media source
    /// * `sessions` - Peer session factory
    /// * `events_tx` - Send half of the event queue (shared with the channel)
    /// * `events_rx` - Receive half of the event queue
    pub fn new(
        config: BroadcastConfig,
        channel: Arc<dyn SignalChannel>,
        media: Arc<dyn MediaSource>,
        sessions: Arc<dyn PeerSessionFactory>,
        events_tx: mpsc::Sender<ControllerEvent>,
        events_rx: mpsc::Receiver<ControllerEvent>,
    ) -> Self {
        Self {
            config,
            state: ControllerState::Idle,
            channel,
            media,
            sessions,
            session: None,
            local_stream: None,
            remote_tracks: Vec::new(),
            events_tx,
            events_rx,
        }
    }

    /// Current negotiation state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Remote tracks observed so far
    pub fn remote_tracks(&self) -> &[RemoteTrackInfo] {
        &self.remote_tracks
    }

    /// Process queued events until the channel closes
    pub async fn run(&mut self) {
        info!("Signaling controller running as {}", self.config.role);
        while let Some(event) = self.events_rx.recv().await {
            let closed = matches!(event, ControllerEvent::ChannelClosed);
            self.process(event).await;
            if closed {
                break;
            }
        }
        info!("Signaling controller stopped");
    }

    /// Apply one event to the state machine
    ///
    /// Exposed separately from [`run`](Self::run) so tests can step the
    /// machine deterministically.
    pub async fn process(&mut self, event: ControllerEvent) {
        debug!("Processing {} event in state {:?}", event.name(), self.state);
        match event {
            ControllerEvent::ChannelOpened => self.on_channel_opened(),
            ControllerEvent::ChannelClosed => self.on_channel_closed().await,
            ControllerEvent::MediaReady(stream) => self.on_media_ready(stream).await,
            ControllerEvent::MediaFailed(reason) => {
                error!("Local media acquisition failed: {}", reason);
                self.state = ControllerState::Idle;
            }
            ControllerEvent::Signal(payload) => self.on_signal(payload).await,
            ControllerEvent::LocalCandidate(candidate) => {
                self.on_local_candidate(candidate).await
            }
            ControllerEvent::RemoteTrack(info) => {
                info!("Remote {} track {} attached", info.kind, info.track_id);
                self.remote_tracks.push(info);
            }
        }
    }

    fn on_channel_opened(&mut self) {
        self.state = ControllerState::AwaitingLocalMedia;
        let media = Arc::clone(&self.media);
        let constraints = self.config.media.clone();
        let events = self.events_tx.clone();
        // Acquisition may block on device access; run it off the event loop
        // and report back through the queue.
        tokio::spawn(async move {
            let event = match media.acquire(&constraints).await {
                Ok(stream) => ControllerEvent::MediaReady(stream),
                Err(e) => ControllerEvent::MediaFailed(e.to_string()),
            };
            let _ = events.send(event).await;
        });
    }

    async fn on_media_ready(&mut self, stream: LocalMediaStream) {
        info!(
            "Local media ready: stream {} with {} tracks",
            stream.stream_id(),
            stream.tracks().len()
        );
        self.local_stream = Some(stream);
        if let Err(e) = self.channel.send(SignalPayload::Ready).await {
            error!("Failed to announce readiness: {}", e);
            return;
        }
        self.state = ControllerState::AnnouncedReady;
    }

    async fn on_signal(&mut self, payload: SignalPayload) {
        match payload {
            SignalPayload::Ready => self.on_remote_ready().await,
            SignalPayload::Answer { sdp } => self.on_remote_answer(sdp).await,
            SignalPayload::Candidate { candidate } => self.on_remote_candidate(candidate).await,
            SignalPayload::Offer { .. } => {
                // This endpoint always initiates. A remote offer means the
                // peer also thinks it is the initiator.
                warn!("Ignoring unexpected remote offer");
            }
            SignalPayload::Unknown => {
                debug!("Ignoring signal with unrecognized type");
            }
        }
    }

    async fn on_remote_ready(&mut self) {
        if self.session.is_some() {
            let err = Error::DuplicateSession(
                "peer announced ready while a session is live".to_string(),
            );
            warn!("Ignoring remote ready: {}", err);
            return;
        }
        let Some(stream) = self.local_stream.as_ref() else {
            warn!("Peer announced ready before local media was acquired, ignoring");
            return;
        };

        let session = match self.sessions.create(stream, self.events_tx.clone()).await {
            Ok(session) => session,
            Err(e) => {
                error!("Failed to create peer session: {}", e);
                return;
            }
        };

        let offer = match session.create_offer().await {
            Ok(offer) => offer,
            Err(e) => {
                error!("Failed to create offer: {}", e);
                let _ = session.close().await;
                return;
            }
        };

        if let Err(e) = self.channel.send(offer.into()).await {
            error!("Failed to send offer: {}", e);
            let _ = session.close().await;
            return;
        }

        info!("Offer sent, awaiting answer");
        self.session = Some(session);
        self.state = ControllerState::Negotiating;
    }

    async fn on_remote_answer(&mut self, sdp: String) {
        let Some(session) = self.session.as_ref() else {
            warn!("Received answer with no active session, dropping");
            return;
        };
        match session
            .apply_remote_description(SessionDescription::answer(sdp))
            .await
        {
            Ok(()) => {
                info!("Remote answer applied, negotiation complete");
                self.state = ControllerState::Connected;
            }
            Err(e) => {
                warn!("Dropping unusable remote answer: {}", e);
            }
        }
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidateInit) {
        let Some(session) = self.session.as_ref() else {
            warn!("Received candidate with no active session, dropping");
            return;
        };
        if let Err(e) = session.add_remote_candidate(candidate).await {
            warn!("Dropping unusable remote candidate: {}", e);
        }
    }

    async fn on_local_candidate(&mut self, candidate: IceCandidateInit) {
        if self.session.is_none() {
            debug!("Local candidate after session teardown, dropping");
            return;
        }
        if let Err(e) = self
            .channel
            .send(SignalPayload::Candidate { candidate })
            .await
        {
            warn!("Failed to forward local candidate: {}", e);
        }
    }

    async fn on_channel_closed(&mut self) {
        info!("Signaling channel closed, tearing down");
        if let Some(session) = self.session.take() {
            if let Err(e) = session.close().await {
                warn!("Error closing peer session: {}", e);
            }
        }
        self.local_stream = None;
        self.state = ControllerState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaConstraints;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    struct MockChannel {
        sent: Mutex<Vec<SignalPayload>>,
    }

    impl MockChannel {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<SignalPayload> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SignalChannel for MockChannel {
        async fn send(&self, payload: SignalPayload) -> Result<()> {
            self.sent.lock().unwrap().push(payload);
            Ok(())
        }
    }

    struct MockMedia {
        fail: bool,
    }

    #[async_trait]
    impl MediaSource for MockMedia {
        async fn acquire(&self, _constraints: &MediaConstraints) -> Result<LocalMediaStream> {
            if self.fail {
                Err(Error::MediaAcquisition("device denied".to_string()))
            } else {
                Ok(LocalMediaStream::new("mock-stream"))
            }
        }
    }

    struct MockSession {
        closed: AtomicUsize,
        answers: AtomicUsize,
        candidates: AtomicUsize,
    }

    #[async_trait]
    impl PeerSession for MockSession {
        async fn create_offer(&self) -> Result<SessionDescription> {
            Ok(SessionDescription::offer("v=0\r\nmock".to_string()))
        }

        async fn apply_remote_description(&self, _desc: SessionDescription) -> Result<()> {
            self.answers.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn add_remote_candidate(&self, _candidate: IceCandidateInit) -> Result<()> {
            self.candidates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct MockFactory {
        created: AtomicUsize,
        last: Mutex<Option<Arc<MockSession>>>,
    }

    impl MockFactory {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                created: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }

        fn last(&self) -> Arc<MockSession> {
            self.last.lock().unwrap().clone().unwrap()
        }
    }

    #[async_trait]
    impl PeerSessionFactory for MockFactory {
        async fn create(
            &self,
            _stream: &LocalMediaStream,
            _events: mpsc::Sender<ControllerEvent>,
        ) -> Result<Arc<dyn PeerSession>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            let session = Arc::new(MockSession {
                closed: AtomicUsize::new(0),
                answers: AtomicUsize::new(0),
                candidates: AtomicUsize::new(0),
            });
            *self.last.lock().unwrap() = Some(Arc::clone(&session));
            Ok(session)
        }
    }

    fn controller(
        channel: Arc<MockChannel>,
        factory: Arc<MockFactory>,
        media_fails: bool,
    ) -> SignalingController {
        let (tx, rx) = ControllerEvent::queue();
        SignalingController::new(
            BroadcastConfig::default(),
            channel,
            Arc::new(MockMedia { fail: media_fails }),
            factory,
            tx,
            rx,
        )
    }

    /// Step the controller until the spawned acquisition task reports back
    async fn open_with_media(controller: &mut SignalingController) {
        controller.process(ControllerEvent::ChannelOpened).await;
        assert_eq!(controller.state(), ControllerState::AwaitingLocalMedia);
        // Acquisition runs on a spawned task; pull its completion event.
        sleep(Duration::from_millis(20)).await;
        let event = controller.events_rx.recv().await.unwrap();
        controller.process(event).await;
    }

    #[tokio::test]
    async fn test_ready_announced_once_media_is_up() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), factory, false);

        open_with_media(&mut ctl).await;

        assert_eq!(ctl.state(), ControllerState::AnnouncedReady);
        assert_eq!(channel.sent(), vec![SignalPayload::Ready]);
    }

    #[tokio::test]
    async fn test_media_failure_returns_to_idle() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), factory, true);

        open_with_media(&mut ctl).await;

        assert_eq!(ctl.state(), ControllerState::Idle);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_remote_ready_produces_one_offer() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        open_with_media(&mut ctl).await;
        ctl.process(ControllerEvent::Signal(SignalPayload::Ready))
            .await;

        assert_eq!(ctl.state(), ControllerState::Negotiating);
        assert_eq!(factory.created(), 1);
        let sent = channel.sent();
        assert_eq!(sent.len(), 2);
        assert!(matches!(sent[1], SignalPayload::Offer { .. }));
    }

    #[tokio::test]
    async fn test_duplicate_remote_ready_is_ignored() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        open_with_media(&mut ctl).await;
        ctl.process(ControllerEvent::Signal(SignalPayload::Ready))
            .await;
        ctl.process(ControllerEvent::Signal(SignalPayload::Ready))
            .await;

        assert_eq!(factory.created(), 1);
        assert_eq!(channel.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_remote_ready_before_local_media_is_dropped() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        ctl.process(ControllerEvent::ChannelOpened).await;
        ctl.process(ControllerEvent::Signal(SignalPayload::Ready))
            .await;

        assert_eq!(factory.created(), 0);
        assert!(channel.sent().is_empty());
    }

    #[tokio::test]
    async fn test_answer_then_candidate_completes_negotiation() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        open_with_media(&mut ctl).await;
        ctl.process(ControllerEvent::Signal(SignalPayload::Ready))
            .await;
        ctl.process(ControllerEvent::Signal(SignalPayload::Answer {
            sdp: "v=0\r\nanswer".to_string(),
        }))
        .await;

        assert_eq!(ctl.state(), ControllerState::Connected);
        let session = factory.last();
        assert_eq!(session.answers.load(Ordering::SeqCst), 1);

        ctl.process(ControllerEvent::Signal(SignalPayload::Candidate {
            candidate: IceCandidateInit {
                candidate: "candidate:1 1 udp 1 192.0.2.1 1 typ host".to_string(),
                ..Default::default()
            },
        }))
        .await;
        assert_eq!(session.candidates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_answer_without_session_is_dropped() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        open_with_media(&mut ctl).await;
        ctl.process(ControllerEvent::Signal(SignalPayload::Answer {
            sdp: "v=0\r\n".to_string(),
        }))
        .await;

        assert_eq!(ctl.state(), ControllerState::AnnouncedReady);
    }

    #[tokio::test]
    async fn test_unexpected_offer_is_dropped() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        open_with_media(&mut ctl).await;
        ctl.process(ControllerEvent::Signal(SignalPayload::Offer {
            sdp: "v=0\r\n".to_string(),
        }))
        .await;

        assert_eq!(ctl.state(), ControllerState::AnnouncedReady);
        assert_eq!(factory.created(), 0);
    }

    #[tokio::test]
    async fn test_local_candidate_forwarded_during_session() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        open_with_media(&mut ctl).await;
        ctl.process(ControllerEvent::Signal(SignalPayload::Ready))
            .await;
        ctl.process(ControllerEvent::LocalCandidate(IceCandidateInit {
            candidate: "candidate:1 1 udp 1 192.0.2.1 1 typ host".to_string(),
            ..Default::default()
        }))
        .await;

        let sent = channel.sent();
        assert!(matches!(sent.last(), Some(SignalPayload::Candidate { .. })));
    }

    #[tokio::test]
    async fn test_local_candidate_without_session_is_dropped() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        open_with_media(&mut ctl).await;
        ctl.process(ControllerEvent::LocalCandidate(IceCandidateInit::default()))
            .await;

        assert_eq!(channel.sent(), vec![SignalPayload::Ready]);
    }

    #[tokio::test]
    async fn test_channel_closed_tears_down_session() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        open_with_media(&mut ctl).await;
        ctl.process(ControllerEvent::Signal(SignalPayload::Ready))
            .await;
        ctl.process(ControllerEvent::ChannelClosed).await;

        assert_eq!(ctl.state(), ControllerState::Idle);
        assert_eq!(factory.last().closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remote_track_is_recorded() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        ctl.process(ControllerEvent::RemoteTrack(RemoteTrackInfo {
            track_id: "remote-1".to_string(),
            kind: "video".to_string(),
            ssrc: 42,
        }))
        .await;

        assert_eq!(ctl.remote_tracks().len(), 1);
        assert_eq!(ctl.remote_tracks()[0].kind, "video");
    }

    #[tokio::test]
    async fn test_run_stops_on_channel_closed() {
        let channel = MockChannel::new();
        let factory = MockFactory::new();
        let mut ctl = controller(Arc::clone(&channel), Arc::clone(&factory), false);

        let tx = ctl.events_tx.clone();
        tx.send(ControllerEvent::ChannelClosed).await.unwrap();
        ctl.run().await;

        assert_eq!(ctl.state(), ControllerState::Idle);
    }
}
