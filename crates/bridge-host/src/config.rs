//! Bridge configuration
//!
//! Both peers must agree on the shared temporary directory and on each
//! other's ports; everything else is local taste.

use bridge_core::{BridgeError, PeerRole, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Well-known port of peer A
pub const PEER_A_PORT: u16 = 6001;
/// Well-known port of peer B
pub const PEER_B_PORT: u16 = 6000;

/// Configuration shared by the listener, sender, and state machine
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Shared temporary directory holding interchange + envelope files
    pub temp_dir: PathBuf,
    /// Loopback host both peers live on
    pub host: String,
    /// Port peer A listens on
    pub peer_a_port: u16,
    /// Port peer B listens on
    pub peer_b_port: u16,
    /// Timeout for outbound connection attempts (liveness pings included)
    pub connect_timeout: Duration,
    /// Keep interchange/envelope files after a completed round trip
    pub keep_artifacts: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir().join("scene-bridge"),
            host: "127.0.0.1".into(),
            peer_a_port: PEER_A_PORT,
            peer_b_port: PEER_B_PORT,
            connect_timeout: Duration::from_secs(2),
            keep_artifacts: true,
        }
    }
}

impl BridgeConfig {
    /// Config with a custom shared temp directory
    pub fn with_temp_dir(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            ..Default::default()
        }
    }

    /// Listen port of one peer
    pub fn port_for(&self, role: PeerRole) -> u16 {
        match role {
            PeerRole::A => self.peer_a_port,
            PeerRole::B => self.peer_b_port,
        }
    }

    /// `host:port` address of one peer
    pub fn addr_for(&self, role: PeerRole) -> String {
        format!("{}:{}", self.host, self.port_for(role))
    }

    /// Create the shared temp directory if needed
    pub fn ensure_temp_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.temp_dir).map_err(|e| {
            BridgeError::Artifact(format!(
                "Could not create temp dir {}: {}",
                self.temp_dir.display(),
                e
            ))
        })
    }

    /// The shared temp directory
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }
}
