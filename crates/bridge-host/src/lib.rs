//! # bridge-host
//!
//! Host-side logic of the scene bridge.
//!
//! This crate provides:
//! - `SceneHost`, the interface to one host application's scene
//! - The scene executor (single-owner work queue for scene mutation)
//! - The replace/import state machine
//! - The outbound transfer flow (send, return, ping)
//! - The per-peer command handler table
//! - An in-memory scene host for the demo binary and tests

pub mod config;
pub mod executor;
pub mod handler;
pub mod memory;
pub mod replace;
pub mod scene;
pub mod sender;

pub use config::BridgeConfig;
pub use executor::{SceneExecutor, SceneHandle};
pub use handler::BridgeHandler;
pub use memory::MemoryScene;
pub use replace::{ApplyReport, Step, StepOutcome, TransferOutcome, run_import, run_replace};
pub use scene::{SceneHost, short_name};
pub use sender::{ping_peer, return_to_origin, send_selected};
