//! Local media capture seam
//!
//! Capture itself is an external collaborator; this module defines the
//! constraint types, the stream handle the controller attaches to a peer
//! session, and the [`MediaSource`] trait behind which real capture lives.
//! [`SyntheticSource`] provides placeholder tracks for the demo binary.

mod source;

pub use source::SyntheticSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Capture constraints requested from the media source
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaConstraints {
    /// Capture an audio track
    pub audio: bool,

    /// Capture a video track
    pub video: bool,

    /// Requested video width in pixels
    pub width: u32,

    /// Requested video height in pixels
    pub height: u32,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        // The browser client requested a 350x350 capture surface.
        Self {
            audio: true,
            video: true,
            width: 350,
            height: 350,
        }
    }
}

/// A bundle of local tracks acquired from the media source
///
/// The stream is shared, not owned, by the peer session that transmits it;
/// the media source remains the owner of the underlying capture.
#[derive(Clone)]
pub struct LocalMediaStream {
    stream_id: String,
    tracks: Vec<Arc<TrackLocalStaticSample>>,
}

impl LocalMediaStream {
    /// Create an empty stream with the given identifier
    pub fn new(stream_id: &str) -> Self {
        Self {
            stream_id: stream_id.to_string(),
            tracks: Vec::new(),
        }
    }

    /// Add a track to the stream
    pub fn with_track(mut self, track: Arc<TrackLocalStaticSample>) -> Self {
        self.tracks.push(track);
        self
    }

    /// Stream identifier
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Tracks to attach to a peer session
    pub fn tracks(&self) -> &[Arc<TrackLocalStaticSample>] {
        &self.tracks
    }

    /// Whether the stream carries no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl std::fmt::Debug for LocalMediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalMediaStream")
            .field("stream_id", &self.stream_id)
            .field("tracks", &self.tracks.len())
            .finish()
    }
}

/// Media capture provider
///
/// Acquisition is asynchronous and may fail (permission denied, no device);
/// failures are reported to the controller, which halts the session attempt
/// without retrying.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Acquire a local stream satisfying the constraints
    async fn acquire(&self, constraints: &MediaConstraints) -> crate::Result<LocalMediaStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::api::media_engine::MIME_TYPE_OPUS;
    use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;

    #[test]
    fn test_default_constraints_match_legacy_client() {
        let constraints = MediaConstraints::default();
        assert!(constraints.audio);
        assert!(constraints.video);
        assert_eq!(constraints.width, 350);
        assert_eq!(constraints.height, 350);
    }

    #[test]
    fn test_stream_track_accounting() {
        let stream = LocalMediaStream::new("stream-1");
        assert!(stream.is_empty());

        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            "audio".to_owned(),
            "stream-1".to_owned(),
        ));
        let stream = stream.with_track(track);
        assert!(!stream.is_empty());
        assert_eq!(stream.tracks().len(), 1);
        assert_eq!(stream.stream_id(), "stream-1");
    }
}
