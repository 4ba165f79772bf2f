//! Peer-to-peer broadcast client
//!
//! Connects to a signaling relay over WebSocket, acquires local media, and
//! negotiates a single WebRTC session with the first peer that announces
//! itself. All asynchronous completions are serialized through one event
//! queue, so the negotiation state machine never observes interleaved
//! callbacks.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   text frames   ┌──────────────────┐
//! │ WebSocketChannel│◄───────────────►│  signaling relay │
//! └───────┬────────┘                  └──────────────────┘
//!         │ ControllerEvent
//!         ▼
//! ┌────────────────────┐  acquire   ┌──────────────┐
//! │ SignalingController │──────────►│  MediaSource │
//! │  (event queue)      │           └──────────────┘
//! └───────┬────────────┘
//!         │ offer / answer / candidates
//!         ▼
//! ┌────────────────────┐
//! │  WebRtcPeerSession  │
//! └────────────────────┘
//! ```
//!
//! The controller owns the state machine; the channel, media source, and
//! peer session are collaborators behind traits so each can be replaced in
//! tests.

pub mod config;
pub mod controller;
pub mod error;
pub mod media;
pub mod peer;
pub mod signaling;

pub use config::{BroadcastConfig, PeerRole, TurnServerConfig};
pub use controller::{ControllerEvent, ControllerState, SignalingController};
pub use error::{Error, Result};
pub use media::{LocalMediaStream, MediaConstraints, MediaSource, SyntheticSource};
pub use peer::{
    PeerSession, PeerSessionFactory, RemoteTrackInfo, WebRtcPeerSession, WebRtcSessionFactory,
};
pub use signaling::{
    IceCandidateInit, SdpKind, SessionDescription, SignalChannel, SignalEnvelope, SignalPayload,
    WebSocketChannel,
};

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
