//! Error types for the scene bridge

use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Bridge error taxonomy
///
/// Variants follow where a failure can occur: on the wire, in the persisted
/// artifacts, inside the host scene, or in a host API call. Hard-precondition
/// failures are reported to the peer through the `ERR|...` reply carrying
/// [`BridgeError::reason`]; everything else stays local.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Socket-level failure: bind, connect, read, write
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed frame or reply, oversized frame, bad UTF-8
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Missing or unusable interchange/envelope file
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Scene-consistency failure: object, shading group or light gone
    #[error("Scene error: {0}")]
    Scene(String),

    /// A call into the host scene layer failed
    #[error("Host API error: {0}")]
    HostApi(String),

    /// Envelope or payload (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BridgeError {
    /// The bare reason string, without the taxonomy prefix.
    ///
    /// Used when formatting `ERR|...` replies so the peer sees
    /// `ERR|File not found: ...` rather than `ERR|Artifact error: ...`.
    pub fn reason(&self) -> &str {
        match self {
            BridgeError::Transport(s)
            | BridgeError::Protocol(s)
            | BridgeError::Artifact(s)
            | BridgeError::Scene(s)
            | BridgeError::HostApi(s)
            | BridgeError::Serialization(s) => s,
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}
