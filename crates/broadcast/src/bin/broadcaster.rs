//! Broadcast client binary
//!
//! Connects to the signaling relay, announces readiness once synthetic local
//! media is up, and negotiates with the first peer that announces itself.
//! Runs until the relay closes the channel or Ctrl+C.

use clap::{Parser, ValueEnum};
use lectern_broadcast::{
    BroadcastConfig, ControllerEvent, MediaConstraints, PeerRole, SignalingController,
    SyntheticSource, TurnServerConfig, WebRtcSessionFactory, WebSocketChannel,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Broadcaster,
    Viewer,
}

impl From<RoleArg> for PeerRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Broadcaster => PeerRole::Broadcaster,
            RoleArg::Viewer => PeerRole::Viewer,
        }
    }
}

/// Parse `url,username,credential` into a TURN server configuration
fn parse_turn_server(value: &str) -> Result<TurnServerConfig, String> {
    let parts: Vec<&str> = value.splitn(3, ',').collect();
    match parts.as_slice() {
        [url, username, credential] => Ok(TurnServerConfig {
            url: url.to_string(),
            username: username.to_string(),
            credential: credential.to_string(),
        }),
        _ => Err(format!(
            "expected url,username,credential but got {value:?}"
        )),
    }
}

#[derive(Parser, Debug)]
#[command(name = "broadcaster", about = "Peer-to-peer broadcast client", version)]
struct Args {
    /// Signaling relay base URL
    #[arg(long, env = "LECTERN_SIGNALING_URL", default_value = "ws://localhost:8000")]
    signaling_url: String,

    /// Relay route name for this endpoint
    #[arg(long, env = "LECTERN_ROUTE", default_value = "broadcaster")]
    route: String,

    /// Local role
    #[arg(long, env = "LECTERN_ROLE", value_enum, default_value = "broadcaster")]
    role: RoleArg,

    /// STUN server URL (repeatable)
    #[arg(long = "stun-server", env = "LECTERN_STUN_SERVERS", value_delimiter = ',')]
    stun_servers: Vec<String>,

    /// TURN server as url,username,credential (repeatable)
    #[arg(long = "turn-server", value_parser = parse_turn_server)]
    turn_servers: Vec<TurnServerConfig>,

    /// Forward locally discovered ICE candidates to the peer
    #[arg(
        long,
        env = "LECTERN_FORWARD_CANDIDATES",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    forward_candidates: bool,

    /// Include an audio track
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    audio: bool,

    /// Include a video track
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    video: bool,

    /// Requested video width
    #[arg(long, default_value_t = 350)]
    width: u32,

    /// Requested video height
    #[arg(long, default_value_t = 350)]
    height: u32,
}

impl Args {
    fn into_config(self) -> BroadcastConfig {
        BroadcastConfig {
            signaling_url: self.signaling_url,
            route: self.route,
            role: self.role.into(),
            stun_servers: self.stun_servers,
            turn_servers: self.turn_servers,
            forward_local_candidates: self.forward_candidates,
            media: MediaConstraints {
                audio: self.audio,
                video: self.video,
                width: self.width,
                height: self.height,
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    config.validate()?;

    info!(
        "Starting broadcast client v{} as {} against {}",
        lectern_broadcast::version(),
        config.role,
        config.endpoint()
    );

    let (events_tx, events_rx) = ControllerEvent::queue();

    let channel = match WebSocketChannel::connect(&config.endpoint(), events_tx.clone()).await {
        Ok(channel) => Arc::new(channel),
        Err(e) => {
            error!("Failed to connect to signaling relay: {}", e);
            return Err(e.into());
        }
    };

    let media = Arc::new(SyntheticSource::new());
    let sessions = Arc::new(WebRtcSessionFactory::new(config.clone()));

    let mut controller =
        SignalingController::new(config, channel, media, sessions, events_tx, events_rx);

    tokio::select! {
        _ = controller.run() => {
            info!("Broadcast ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
        }
    }

    Ok(())
}
