//! Configuration types for the broadcast client

use crate::media::MediaConstraints;
use serde::{Deserialize, Serialize};

/// Local role of this endpoint, fixed for the process lifetime
///
/// Both roles currently run the same signaling flow (the first `ready`
/// observed triggers the offer); the flag is kept explicit so asymmetric
/// behavior can be added without a config change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerRole {
    /// Captures local media and announces readiness on the broadcaster route
    Broadcaster,
    /// Consumes the broadcast stream
    Viewer,
}

impl std::fmt::Display for PeerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerRole::Broadcaster => write!(f, "broadcaster"),
            PeerRole::Viewer => write!(f, "viewer"),
        }
    }
}

/// TURN server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnServerConfig {
    /// TURN server URL (turn: or turns:)
    pub url: String,

    /// Username for TURN authentication
    pub username: String,

    /// Credential for TURN authentication
    pub credential: String,
}

/// Main configuration for a broadcast attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Signaling relay base URL (ws:// or wss://)
    pub signaling_url: String,

    /// Relay route name associated with this endpoint's role
    pub route: String,

    /// Local role, fixed for the process lifetime
    pub role: PeerRole,

    /// STUN server URLs (may be empty; the browser client negotiated
    /// host candidates with an empty ICE configuration)
    pub stun_servers: Vec<String>,

    /// TURN server configurations (optional)
    pub turn_servers: Vec<TurnServerConfig>,

    /// Forward locally discovered ICE candidates to the remote peer
    ///
    /// Disabling this reproduces the legacy client, which left candidate
    /// forwarding unwired; NAT traversal generally requires it on.
    pub forward_local_candidates: bool,

    /// Local media capture constraints
    pub media: MediaConstraints,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            signaling_url: "ws://localhost:8000".to_string(),
            route: "broadcaster".to_string(),
            role: PeerRole::Broadcaster,
            stun_servers: Vec::new(),
            turn_servers: Vec::new(),
            forward_local_candidates: true,
            media: MediaConstraints::default(),
        }
    }
}

impl BroadcastConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `signaling_url` is not a ws:// or wss:// URL
    /// - `route` is empty
    /// - any STUN URL does not start with `stun:`
    /// - any TURN URL does not start with `turn:` or `turns:`
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if !self.signaling_url.starts_with("ws://") && !self.signaling_url.starts_with("wss://") {
            return Err(Error::InvalidConfig(format!(
                "signaling_url must start with ws:// or wss://, got {}",
                self.signaling_url
            )));
        }

        if self.route.is_empty() {
            return Err(Error::InvalidConfig("route must not be empty".to_string()));
        }

        for url in &self.stun_servers {
            if !url.starts_with("stun:") {
                return Err(Error::InvalidConfig(format!(
                    "STUN URL must start with stun:, got {}",
                    url
                )));
            }
        }

        for turn in &self.turn_servers {
            if !turn.url.starts_with("turn:") && !turn.url.starts_with("turns:") {
                return Err(Error::InvalidConfig(format!(
                    "TURN URL must start with turn: or turns:, got {}",
                    turn.url
                )));
            }
        }

        Ok(())
    }

    /// Full relay endpoint for this configuration's route
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.signaling_url.trim_end_matches('/'),
            self.route
        )
    }

    /// Set the role for this configuration
    pub fn with_role(mut self, role: PeerRole) -> Self {
        self.role = role;
        self
    }

    /// Set the relay route name
    pub fn with_route(mut self, route: &str) -> Self {
        self.route = route.to_string();
        self
    }

    /// Add STUN servers to this configuration
    pub fn with_stun_servers(mut self, stun_servers: Vec<String>) -> Self {
        self.stun_servers = stun_servers;
        self
    }

    /// Add TURN servers to this configuration
    pub fn with_turn_servers(mut self, turn_servers: Vec<TurnServerConfig>) -> Self {
        self.turn_servers = turn_servers;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BroadcastConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.role, PeerRole::Broadcaster);
        assert!(config.forward_local_candidates);
    }

    #[test]
    fn test_invalid_signaling_url_fails() {
        let mut config = BroadcastConfig::default();
        config.signaling_url = "http://localhost:8000".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_route_fails() {
        let mut config = BroadcastConfig::default();
        config.route = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_stun_url_fails() {
        let config = BroadcastConfig::default()
            .with_stun_servers(vec!["turn:stun.example.com".to_string()]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_turn_url_fails() {
        let config = BroadcastConfig::default().with_turn_servers(vec![TurnServerConfig {
            url: "stun:turn.example.com:3478".to_string(),
            username: "user".to_string(),
            credential: "pass".to_string(),
        }]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_joins_route() {
        let config = BroadcastConfig::default();
        assert_eq!(config.endpoint(), "ws://localhost:8000/broadcaster");

        let mut config = BroadcastConfig::default().with_route("viewer");
        config.signaling_url = "wss://relay.example.com/".to_string();
        assert_eq!(config.endpoint(), "wss://relay.example.com/viewer");
    }

    #[test]
    fn test_builder_chain() {
        let config = BroadcastConfig::default()
            .with_role(PeerRole::Viewer)
            .with_route("viewer")
            .with_turn_servers(vec![TurnServerConfig {
                url: "turn:turn.example.com:3478".to_string(),
                username: "user".to_string(),
                credential: "pass".to_string(),
            }]);
        assert!(config.validate().is_ok());
        assert_eq!(config.role, PeerRole::Viewer);
        assert_eq!(config.turn_servers.len(), 1);
    }

    #[test]
    fn test_config_serialization() {
        let config = BroadcastConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: BroadcastConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.signaling_url, deserialized.signaling_url);
        assert_eq!(config.role, deserialized.role);
    }
}
