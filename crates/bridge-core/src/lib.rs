//! # bridge-core
//!
//! Core types for the two-peer scene bridge.
//!
//! This crate provides the foundational types used by both peer processes:
//! - Session keys and deterministic artifact paths
//! - The transfer envelope (side-channel metadata for one transfer)
//! - The wire command/reply grammar
//! - Origin tags attached to imported objects
//! - Error taxonomy

pub mod envelope;
pub mod error;
pub mod protocol;
pub mod session;
pub mod tag;

pub use envelope::{LightLinks, MaterialAssignment, TransferEnvelope};
pub use error::{BridgeError, Result};
pub use protocol::{Command, Reply};
pub use session::{Direction, PeerRole, SessionKey, UNSAVED_SCENE, envelope_path_for};
pub use tag::ObjectTag;
