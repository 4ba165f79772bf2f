//! Controller event queue types
//!
//! Every asynchronous completion in the system — channel lifecycle, inbound
//! signals, media acquisition, peer session callbacks — is posted as one
//! [`ControllerEvent`] into a single queue and processed strictly in order.

use crate::media::LocalMediaStream;
use crate::peer::RemoteTrackInfo;
use crate::signaling::{IceCandidateInit, SignalPayload};
use tokio::sync::mpsc;

/// Default depth of the controller event queue
pub const EVENT_QUEUE_DEPTH: usize = 64;

/// One unit of work for the signaling controller
#[derive(Debug)]
pub enum ControllerEvent {
    /// The message channel finished connecting
    ChannelOpened,

    /// The message channel closed or failed
    ChannelClosed,

    /// A decoded signal payload arrived from the relay
    Signal(SignalPayload),

    /// Local media acquisition completed
    MediaReady(LocalMediaStream),

    /// Local media acquisition failed
    MediaFailed(String),

    /// The peer session discovered a local network candidate
    LocalCandidate(IceCandidateInit),

    /// Remote media arrived on the peer session
    RemoteTrack(RemoteTrackInfo),
}

impl ControllerEvent {
    /// Event name for logging
    pub fn name(&self) -> &'static str {
        match self {
            ControllerEvent::ChannelOpened => "channel_opened",
            ControllerEvent::ChannelClosed => "channel_closed",
            ControllerEvent::Signal(_) => "signal",
            ControllerEvent::MediaReady(_) => "media_ready",
            ControllerEvent::MediaFailed(_) => "media_failed",
            ControllerEvent::LocalCandidate(_) => "local_candidate",
            ControllerEvent::RemoteTrack(_) => "remote_track",
        }
    }

    /// Create the controller event queue
    pub fn queue() -> (mpsc::Sender<ControllerEvent>, mpsc::Receiver<ControllerEvent>) {
        mpsc::channel(EVENT_QUEUE_DEPTH)
    }
}
