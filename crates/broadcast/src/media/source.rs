//! Synthetic media source
//!
//! Stands in for real capture in the demo binary: produces Opus/VP8 sample
//! tracks and keeps the audio track alive with silence frames so the peer
//! connection negotiates and transmits something. Applications with real
//! capture implement [`MediaSource`](super::MediaSource) themselves and write
//! encoded samples to the tracks.

use super::{LocalMediaStream, MediaConstraints, MediaSource};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::media::Sample;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;

/// Opus DTX silence frame, 20ms
const OPUS_SILENCE: [u8; 3] = [0xf8, 0xff, 0xfe];

/// Media source producing synthetic placeholder tracks
pub struct SyntheticSource;

impl SyntheticSource {
    /// Create a new synthetic source
    pub fn new() -> Self {
        Self
    }

    fn audio_track(stream_id: &str) -> Arc<TrackLocalStaticSample> {
        Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                ..Default::default()
            },
            "audio".to_owned(),
            stream_id.to_owned(),
        ))
    }

    fn video_track(stream_id: &str) -> Arc<TrackLocalStaticSample> {
        Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
            "video".to_owned(),
            stream_id.to_owned(),
        ))
    }

    /// Feed 20ms Opus silence frames until the track is dropped
    fn spawn_silence_feeder(track: Weak<TrackLocalStaticSample>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(20));
            loop {
                ticker.tick().await;
                let track = match track.upgrade() {
                    Some(t) => t,
                    None => break,
                };
                let sample = Sample {
                    data: Bytes::from_static(&OPUS_SILENCE),
                    duration: Duration::from_millis(20),
                    ..Default::default()
                };
                if let Err(e) = track.write_sample(&sample).await {
                    debug!("Silence feeder stopping: {}", e);
                    break;
                }
            }
        });
    }
}

impl Default for SyntheticSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for SyntheticSource {
    async fn acquire(&self, constraints: &MediaConstraints) -> Result<LocalMediaStream> {
        if !constraints.audio && !constraints.video {
            return Err(Error::MediaAcquisition(
                "constraints request no tracks".to_string(),
            ));
        }

        let stream_id = format!("lectern-{}", uuid::Uuid::new_v4());
        let mut stream = LocalMediaStream::new(&stream_id);

        if constraints.audio {
            let track = Self::audio_track(&stream_id);
            Self::spawn_silence_feeder(Arc::downgrade(&track));
            stream = stream.with_track(track);
        }

        if constraints.video {
            // The video track is attached but idle until the application
            // writes encoded frames; capture is an external collaborator.
            stream = stream.with_track(Self::video_track(&stream_id));
        }

        debug!(
            "Acquired synthetic stream {} ({} tracks)",
            stream.stream_id(),
            stream.tracks().len()
        );

        Ok(stream)
    }
}
