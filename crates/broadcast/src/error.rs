//! Error types for the broadcast client

/// Result type alias using the broadcast Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while signaling or negotiating a peer session
///
/// Nothing here is fatal to the host process: every failure degrades to a
/// logged, dropped event at the controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration parameter
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Message channel failed to open, send, or parse
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local media could not be acquired (permission denied, no device, no tracks)
    #[error("Media acquisition error: {0}")]
    MediaAcquisition(String),

    /// Malformed or out-of-order description or candidate
    #[error("Negotiation error: {0}")]
    Negotiation(String),

    /// A `ready` signal arrived while a peer session already exists
    #[error("Duplicate session: {0}")]
    DuplicateSession(String),

    /// Serialization/deserialization error on the wire protocol
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// WebRTC library error
    #[error("WebRTC error: {0}")]
    WebRtc(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is recoverable by logging and dropping the event
    ///
    /// Only configuration errors abort a broadcast attempt before it starts;
    /// everything else is recovered locally.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::InvalidConfig(_))
    }

    /// Check if this error came from the signaling transport
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Serialization(_))
    }

    /// Check if this error came from peer negotiation
    pub fn is_negotiation_error(&self) -> bool {
        matches!(
            self,
            Error::Negotiation(_) | Error::DuplicateSession(_) | Error::WebRtc(_)
        )
    }
}
