//! Peer session: wrapper around one peer-to-peer connection

mod session;

pub use session::{WebRtcPeerSession, WebRtcSessionFactory};

use crate::controller::ControllerEvent;
use crate::media::LocalMediaStream;
use crate::signaling::{IceCandidateInit, SessionDescription};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Description of a remote track surfaced to the rendering collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrackInfo {
    /// Remote track identifier
    pub track_id: String,

    /// Track kind ("audio" or "video")
    pub kind: String,

    /// RTP synchronization source
    pub ssrc: u32,
}

/// One peer-to-peer connection
///
/// Negotiation errors are recoverable: a malformed or out-of-order
/// description or candidate is reported to the caller, which logs and drops
/// the offending message.
#[async_trait]
pub trait PeerSession: Send + Sync {
    /// Generate an offer, committing it as the local description first
    ///
    /// The returned description is already set locally; it is safe to
    /// transmit as soon as this returns.
    async fn create_offer(&self) -> crate::Result<SessionDescription>;

    /// Apply a remote offer or answer
    async fn apply_remote_description(&self, desc: SessionDescription) -> crate::Result<()>;

    /// Apply a remote network candidate
    async fn add_remote_candidate(&self, candidate: IceCandidateInit) -> crate::Result<()>;

    /// Tear down the underlying connection
    async fn close(&self) -> crate::Result<()>;
}

/// Constructs peer sessions with local tracks attached
#[async_trait]
pub trait PeerSessionFactory: Send + Sync {
    /// Create a session and attach every track of the local stream
    ///
    /// Fails (reported, not fatal) if the stream has no tracks. Local
    /// candidates and remote tracks discovered by the session are posted
    /// into `events`.
    async fn create(
        &self,
        stream: &LocalMediaStream,
        events: mpsc::Sender<ControllerEvent>,
    ) -> crate::Result<Arc<dyn PeerSession>>;
}
