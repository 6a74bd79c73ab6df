//! Wire grammar for peer commands and replies
//!
//! ASCII, `|`-delimited, one command and one reply per connection:
//!
//! - `PING` -> `PONG|<free text>`
//! - `IMPORT|<path>` -> `OK|Imported <name>` | `ERR|<reason>`
//! - `REPLACE|<object>` or `REPLACE|<scene>|<object>` ->
//!   `OK|Replaced with <identifier>` | `ERR|<reason>`
//! - anything else -> `ERR|Unknown command: <raw>`
//!
//! Commands are parsed once at the protocol boundary into a closed variant
//! type; handlers match exhaustively instead of re-splitting strings.

use crate::error::{BridgeError, Result};

/// One parsed peer command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Liveness probe
    Ping,
    /// Import the interchange file at `path` (first leg of a transfer)
    Import { path: String },
    /// Replace the original object from return-leg artifacts
    ///
    /// `scene` is absent in the short form `REPLACE|<object>`; the receiver
    /// then falls back to its current scene name.
    Replace {
        scene: Option<String>,
        object: String,
    },
    /// Anything that did not parse; echoed back in the error reply
    Unknown { raw: String },
}

impl Command {
    /// Parse one command line. Never fails: unrecognized input becomes
    /// [`Command::Unknown`] so the dispatcher can answer it explicitly.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let mut parts = trimmed.split('|');
        let word = parts.next().unwrap_or_default().to_ascii_uppercase();
        let rest: Vec<&str> = parts.collect();

        match (word.as_str(), rest.as_slice()) {
            ("PING", _) => Command::Ping,
            ("IMPORT", [path, ..]) if !path.is_empty() => Command::Import {
                // Windows-style separators normalized once, at the boundary
                path: path.replace('\\', "/"),
            },
            ("REPLACE", [object]) if !object.is_empty() => Command::Replace {
                scene: None,
                object: (*object).to_string(),
            },
            ("REPLACE", [scene, object, ..]) if !object.is_empty() => Command::Replace {
                scene: Some((*scene).to_string()),
                object: (*object).to_string(),
            },
            _ => Command::Unknown {
                raw: trimmed.to_string(),
            },
        }
    }

    /// Wire form of the command
    pub fn encode(&self) -> String {
        match self {
            Command::Ping => "PING".to_string(),
            Command::Import { path } => format!("IMPORT|{}", path),
            Command::Replace {
                scene: Some(scene),
                object,
            } => format!("REPLACE|{}|{}", scene, object),
            Command::Replace {
                scene: None,
                object,
            } => format!("REPLACE|{}", object),
            Command::Unknown { raw } => raw.clone(),
        }
    }
}

/// One reply to a peer command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Command succeeded; free-text detail
    Ok(String),
    /// Command failed; reason
    Err(String),
    /// Answer to `PING`
    Pong(String),
}

impl Reply {
    /// Reply for input that did not parse as any command
    pub fn unknown(raw: &str) -> Self {
        Reply::Err(format!("Unknown command: {}", raw))
    }

    /// Wire form of the reply
    pub fn encode(&self) -> String {
        match self {
            Reply::Ok(detail) => format!("OK|{}", detail),
            Reply::Err(reason) => format!("ERR|{}", reason),
            Reply::Pong(detail) => format!("PONG|{}", detail),
        }
    }

    /// Parse a reply line received from a peer
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let (word, rest) = trimmed.split_once('|').unwrap_or((trimmed, ""));
        match word {
            "OK" => Ok(Reply::Ok(rest.to_string())),
            "ERR" => Ok(Reply::Err(rest.to_string())),
            "PONG" => Ok(Reply::Pong(rest.to_string())),
            _ => Err(BridgeError::Protocol(format!(
                "Unparseable reply: {}",
                trimmed
            ))),
        }
    }

    /// Whether the reply reports success (`OK` or `PONG`)
    pub fn is_ok(&self) -> bool {
        !matches!(self, Reply::Err(_))
    }
}
