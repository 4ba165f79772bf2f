//! WebSocket message channel to the signaling relay
//!
//! The channel owns the socket: a writer task drains an outbound queue and a
//! reader task decodes inbound text frames into signal payloads, posting them
//! into the controller's event queue. Parse failures are logged and dropped —
//! a malformed frame never closes the channel or reaches the controller.

use crate::controller::ControllerEvent;
use crate::signaling::protocol::{SignalEnvelope, SignalPayload};
use crate::{Error, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Outbound queue depth between `send` callers and the writer task
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Send half of the bidirectional message channel
///
/// The controller holds this to serialize outgoing peer session events back
/// onto the relay. Send failures are recoverable: the caller logs and drops.
#[async_trait]
pub trait SignalChannel: Send + Sync {
    /// Wrap a payload in an envelope and transmit it as one text frame
    async fn send(&self, payload: SignalPayload) -> Result<()>;
}

/// WebSocket implementation of the message channel
pub struct WebSocketChannel {
    outbound: mpsc::Sender<Message>,
}

impl WebSocketChannel {
    /// Connect to the relay endpoint and start the reader/writer tasks
    ///
    /// Posts `ChannelOpened` once the handshake completes and `ChannelClosed`
    /// exactly once when the socket ends, for any reason.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full relay URL including the route (ws:// or wss://)
    /// * `events` - Controller event queue for inbound traffic
    pub async fn connect(
        endpoint: &str,
        events: mpsc::Sender<ControllerEvent>,
    ) -> Result<Self> {
        let (ws_stream, _response) = connect_async(endpoint)
            .await
            .map_err(|e| Error::Transport(format!("Failed to connect to {}: {}", endpoint, e)))?;

        info!("Signaling channel connected to {}", endpoint);

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (outbound, mut outbound_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE_DEPTH);

        // Announce the channel before the reader starts so no inbound signal
        // can be queued ahead of the open event.
        if events.send(ControllerEvent::ChannelOpened).await.is_err() {
            return Err(Error::Transport(
                "Controller event queue closed before channel opened".to_string(),
            ));
        }

        // Writer task: drain the outbound queue onto the socket
        tokio::spawn(async move {
            while let Some(msg) = outbound_rx.recv().await {
                if let Err(e) = ws_tx.send(msg).await {
                    error!("Failed to send signaling frame: {}", e);
                    break;
                }
            }
            debug!("Signaling writer task exited");
        });

        // Reader task: decode frames and post events
        let reader_events = events.clone();
        let pong_tx = outbound.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_rx.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Some(payload) = decode_frame(&text) {
                            if reader_events
                                .send(ControllerEvent::Signal(payload))
                                .await
                                .is_err()
                            {
                                debug!("Controller queue closed, stopping reader");
                                break;
                            }
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        let _ = pong_tx.send(Message::Pong(data)).await;
                    }
                    Ok(Message::Close(_)) => {
                        info!("Signaling channel closed by relay");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("Signaling channel error: {}", e);
                        break;
                    }
                }
            }
            let _ = reader_events.send(ControllerEvent::ChannelClosed).await;
            debug!("Signaling reader task exited");
        });

        Ok(Self { outbound })
    }
}

#[async_trait]
impl SignalChannel for WebSocketChannel {
    async fn send(&self, payload: SignalPayload) -> Result<()> {
        let frame = SignalEnvelope::new(payload).to_json()?;
        self.outbound
            .send(Message::Text(frame))
            .await
            .map_err(|_| Error::Transport("signaling channel is not open".to_string()))
    }
}

/// Decode one inbound text frame into a signal payload
///
/// Returns `None` for undecodable frames, which are logged and dropped.
pub fn decode_frame(text: &str) -> Option<SignalPayload> {
    match SignalEnvelope::from_json(text) {
        Ok(envelope) => Some(envelope.data),
        Err(e) => {
            warn!("Dropping undecodable signaling frame: {}", e);
            None
        }
    }
}
