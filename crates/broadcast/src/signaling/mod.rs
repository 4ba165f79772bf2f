//! Signaling: wire protocol and the relay message channel

mod channel;
mod protocol;

pub use channel::{decode_frame, SignalChannel, WebSocketChannel};
pub use protocol::{
    IceCandidateInit, SdpKind, SessionDescription, SignalEnvelope, SignalPayload,
};
