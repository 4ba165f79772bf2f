//! Signal envelope wire types
//!
//! The relay exchanges single JSON text frames of the shape
//! `{"data": {"type": "ready" | "offer" | "answer" | "candidate", ...}}`.
//! The payload tag doubles as the SDP type for offers and answers, and ICE
//! candidate fields use the browser's camelCase names.

use serde::{Deserialize, Serialize};

/// Wire message: one payload per envelope, exists only in transit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignalEnvelope {
    /// The signal payload
    pub data: SignalPayload,
}

impl SignalEnvelope {
    /// Wrap a payload for transmission
    pub fn new(data: SignalPayload) -> Self {
        Self { data }
    }

    /// Serialize to a single JSON text frame
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(|e| {
            crate::Error::Serialization(format!("Failed to serialize signal envelope: {}", e))
        })
    }

    /// Parse from a JSON text frame
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            crate::Error::Serialization(format!("Failed to deserialize signal envelope: {}", e))
        })
    }
}

/// Signal payload variants
///
/// Unknown tags deserialize to [`SignalPayload::Unknown`] rather than failing,
/// so an unrecognized message is logged and ignored instead of dropping the
/// whole frame as malformed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalPayload {
    /// Sender has local media ready
    Ready,

    /// SDP offer
    Offer {
        /// Offer SDP
        sdp: String,
    },

    /// SDP answer
    Answer {
        /// Answer SDP
        sdp: String,
    },

    /// One discovered network candidate
    Candidate {
        /// Candidate description
        candidate: IceCandidateInit,
    },

    /// Unrecognized payload tag (never sent, only received)
    #[serde(other)]
    Unknown,
}

impl SignalPayload {
    /// Get the payload tag for logging
    pub fn tag(&self) -> &'static str {
        match self {
            SignalPayload::Ready => "ready",
            SignalPayload::Offer { .. } => "offer",
            SignalPayload::Answer { .. } => "answer",
            SignalPayload::Candidate { .. } => "candidate",
            SignalPayload::Unknown => "unknown",
        }
    }
}

/// SDP description kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    /// Offer half of the negotiation handshake
    Offer,
    /// Answer half of the negotiation handshake
    Answer,
}

/// Opaque session description produced and consumed by the peer session
///
/// The controller never inspects the SDP contents, only the kind when
/// wrapping it as an `offer` or `answer` payload.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDescription {
    /// Whether this is the offer or answer half of the handshake
    pub kind: SdpKind,
    /// Raw SDP text
    pub sdp: String,
}

impl SessionDescription {
    /// Create an offer description
    pub fn offer(sdp: String) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp,
        }
    }

    /// Create an answer description
    pub fn answer(sdp: String) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp,
        }
    }
}

impl From<SessionDescription> for SignalPayload {
    fn from(desc: SessionDescription) -> Self {
        match desc.kind {
            SdpKind::Offer => SignalPayload::Offer { sdp: desc.sdp },
            SdpKind::Answer => SignalPayload::Answer { sdp: desc.sdp },
        }
    }
}

/// One network candidate, serialized with the browser's field names
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidateInit {
    /// Candidate a-line
    pub candidate: String,

    /// Media stream identification tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,

    /// Index of the media description this candidate belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,

    /// ICE username fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}
