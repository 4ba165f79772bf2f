//! WebRTC peer session implementation

use super::{PeerSession, PeerSessionFactory, RemoteTrackInfo};
use crate::config::BroadcastConfig;
use crate::controller::ControllerEvent;
use crate::media::LocalMediaStream;
use crate::signaling::{IceCandidateInit, SdpKind, SessionDescription};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::track::track_local::TrackLocal;

impl From<RTCIceCandidateInit> for IceCandidateInit {
    fn from(init: RTCIceCandidateInit) -> Self {
        Self {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_m_line_index: init.sdp_mline_index,
            username_fragment: init.username_fragment,
        }
    }
}

impl From<IceCandidateInit> for RTCIceCandidateInit {
    fn from(init: IceCandidateInit) -> Self {
        Self {
            candidate: init.candidate,
            sdp_mid: init.sdp_mid,
            sdp_mline_index: init.sdp_m_line_index,
            username_fragment: init.username_fragment,
        }
    }
}

/// Peer session backed by a webrtc-rs `RTCPeerConnection`
pub struct WebRtcPeerSession {
    /// Unique identifier for log correlation
    session_id: String,

    /// Underlying peer connection
    peer_connection: Arc<RTCPeerConnection>,
}

impl WebRtcPeerSession {
    /// Construct the connection, attach local tracks, and wire callbacks
    async fn connect(
        config: &BroadcastConfig,
        stream: &LocalMediaStream,
        events: mpsc::Sender<ControllerEvent>,
    ) -> Result<Self> {
        if stream.is_empty() {
            return Err(Error::MediaAcquisition(
                "local stream has no tracks to attach".to_string(),
            ));
        }

        let session_id = uuid::Uuid::new_v4().to_string();

        info!(
            "Creating peer session {} ({} local tracks)",
            session_id,
            stream.tracks().len()
        );

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| Error::WebRtc(format!("Failed to register codecs: {}", e)))?;

        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine)
                .map_err(|e| Error::WebRtc(format!("Failed to register interceptors: {}", e)))?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        // The ICE server list may be empty; host candidates still work on a
        // flat network, which is what the legacy client relied on.
        let ice_servers: Vec<RTCIceServer> = config
            .stun_servers
            .iter()
            .map(|url| RTCIceServer {
                urls: vec![url.clone()],
                ..Default::default()
            })
            .chain(config.turn_servers.iter().map(|turn| RTCIceServer {
                urls: vec![turn.url.clone()],
                username: turn.username.clone(),
                credential: turn.credential.clone(),
                ..Default::default()
            }))
            .collect();

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .map_err(|e| Error::WebRtc(format!("Failed to create peer connection: {}", e)))?,
        );

        for track in stream.tracks() {
            peer_connection
                .add_track(Arc::clone(track) as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| Error::WebRtc(format!("Failed to attach local track: {}", e)))?;
        }

        if config.forward_local_candidates {
            let candidate_events = events.clone();
            let candidate_session = session_id.clone();
            peer_connection.on_ice_candidate(Box::new(
                move |candidate: Option<RTCIceCandidate>| {
                    let events = candidate_events.clone();
                    let session_id = candidate_session.clone();
                    Box::pin(async move {
                        match candidate {
                            Some(candidate) => match candidate.to_json() {
                                Ok(init) => {
                                    debug!(
                                        "Session {} discovered local candidate: {}",
                                        session_id, init.candidate
                                    );
                                    let _ = events
                                        .send(ControllerEvent::LocalCandidate(init.into()))
                                        .await;
                                }
                                Err(e) => {
                                    warn!("Failed to serialize local candidate: {}", e);
                                }
                            },
                            None => {
                                debug!("Session {} finished gathering candidates", session_id);
                            }
                        }
                    })
                },
            ));
        } else {
            debug!(
                "Session {} candidate forwarding disabled by configuration",
                session_id
            );
        }

        let track_events = events;
        let track_session = session_id.clone();
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let events = track_events.clone();
            let session_id = track_session.clone();
            Box::pin(async move {
                let track_info = RemoteTrackInfo {
                    track_id: track.id(),
                    kind: track.kind().to_string(),
                    ssrc: track.ssrc(),
                };
                info!(
                    "Session {} received remote {} track {}",
                    session_id, track_info.kind, track_info.track_id
                );
                let _ = events.send(ControllerEvent::RemoteTrack(track_info)).await;
            })
        }));

        let state_session = session_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |state: RTCPeerConnectionState| {
                let session_id = state_session.clone();
                Box::pin(async move {
                    debug!("Session {} connection state: {}", session_id, state);
                })
            },
        ));

        Ok(Self {
            session_id,
            peer_connection,
        })
    }

    /// Session identifier
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[async_trait]
impl PeerSession for WebRtcPeerSession {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to create offer: {}", e)))?;

        // Commit the local description before handing the offer back: the
        // caller may transmit what it receives immediately.
        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set local description: {}", e)))?;

        let local_desc = self
            .peer_connection
            .local_description()
            .await
            .ok_or_else(|| {
                Error::Negotiation("No local description after setting offer".to_string())
            })?;

        debug!("Session {} created offer", self.session_id);

        Ok(SessionDescription::offer(local_desc.sdp))
    }

    async fn apply_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let remote = match desc.kind {
            SdpKind::Offer => RTCSessionDescription::offer(desc.sdp)
                .map_err(|e| Error::Negotiation(format!("Malformed remote offer: {}", e)))?,
            SdpKind::Answer => RTCSessionDescription::answer(desc.sdp)
                .map_err(|e| Error::Negotiation(format!("Malformed remote answer: {}", e)))?,
        };

        self.peer_connection
            .set_remote_description(remote)
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to set remote description: {}", e)))?;

        debug!("Session {} applied remote description", self.session_id);

        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidateInit) -> Result<()> {
        self.peer_connection
            .add_ice_candidate(candidate.into())
            .await
            .map_err(|e| Error::Negotiation(format!("Failed to add remote candidate: {}", e)))?;

        debug!("Session {} added remote candidate", self.session_id);

        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .map_err(|e| Error::WebRtc(format!("Failed to close peer connection: {}", e)))
    }
}

/// Factory producing [`WebRtcPeerSession`]s from the broadcast configuration
pub struct WebRtcSessionFactory {
    config: BroadcastConfig,
}

impl WebRtcSessionFactory {
    /// Create a factory for the given configuration
    pub fn new(config: BroadcastConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PeerSessionFactory for WebRtcSessionFactory {
    async fn create(
        &self,
        stream: &LocalMediaStream,
        events: mpsc::Sender<ControllerEvent>,
    ) -> Result<Arc<dyn PeerSession>> {
        let session = WebRtcPeerSession::connect(&self.config, stream, events).await?;
        Ok(Arc::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MediaConstraints, MediaSource, SyntheticSource};

    #[test]
    fn test_candidate_init_conversion_round_trip() {
        let init = IceCandidateInit {
            candidate: "candidate:1 1 udp 2122260223 192.0.2.1 57532 typ host".to_string(),
            sdp_mid: Some("0".to_string()),
            sdp_m_line_index: Some(0),
            username_fragment: Some("frag".to_string()),
        };
        let rtc: RTCIceCandidateInit = init.clone().into();
        assert_eq!(rtc.sdp_mline_index, Some(0));
        let back: IceCandidateInit = rtc.into();
        assert_eq!(init, back);
    }

    #[tokio::test]
    async fn test_create_rejects_empty_stream() {
        let factory = WebRtcSessionFactory::new(BroadcastConfig::default());
        let (events, _rx) = ControllerEvent::queue();
        let stream = LocalMediaStream::new("empty");
        let Err(err) = factory.create(&stream, events).await else {
            panic!("empty stream must not produce a session");
        };
        assert!(matches!(err, Error::MediaAcquisition(_)));
    }

    #[tokio::test]
    async fn test_offer_is_committed_before_return() {
        let factory = WebRtcSessionFactory::new(BroadcastConfig::default());
        let (events, _rx) = ControllerEvent::queue();
        let stream = SyntheticSource::new()
            .acquire(&MediaConstraints::default())
            .await
            .unwrap();
        let session = factory.create(&stream, events).await.unwrap();

        let offer = session.create_offer().await.unwrap();
        assert_eq!(offer.kind, SdpKind::Offer);
        assert!(offer.sdp.starts_with("v=0"));
    }

    #[tokio::test]
    async fn test_answer_without_offer_is_recoverable() {
        let factory = WebRtcSessionFactory::new(BroadcastConfig::default());
        let (events, _rx) = ControllerEvent::queue();
        let stream = SyntheticSource::new()
            .acquire(&MediaConstraints::default())
            .await
            .unwrap();
        let session = factory.create(&stream, events).await.unwrap();

        // An answer with no prior local offer is out of order.
        let err = session
            .apply_remote_description(SessionDescription::answer("v=0\r\n".to_string()))
            .await
            .unwrap_err();
        assert!(err.is_negotiation_error());
    }

    #[tokio::test]
    async fn test_candidate_before_remote_description_is_recoverable() {
        let factory = WebRtcSessionFactory::new(BroadcastConfig::default());
        let (events, _rx) = ControllerEvent::queue();
        let stream = SyntheticSource::new()
            .acquire(&MediaConstraints::default())
            .await
            .unwrap();
        let session = factory.create(&stream, events).await.unwrap();

        let err = session
            .add_remote_candidate(IceCandidateInit {
                candidate: "candidate:1 1 udp 2122260223 192.0.2.1 57532 typ host".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.is_negotiation_error());
    }
}
