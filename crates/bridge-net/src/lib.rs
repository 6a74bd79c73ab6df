//! # bridge-net
//!
//! Wire layer for the scene bridge.
//!
//! This crate provides:
//! - Length-prefixed UTF-8 framing over TCP
//! - The peer listener (persistent accept loop + handler dispatch)
//! - The outbound client (one connection, one command, one reply)

pub mod client;
pub mod framing;
pub mod listener;

pub use client::{ping, send_command};
pub use framing::{MAX_FRAME, read_frame, write_frame};
pub use listener::{CommandHandler, ListenerConfig, PeerListener};
