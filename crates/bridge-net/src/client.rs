//! Outbound side: one connection, one command, one reply
//!
//! No multiplexing and no persistent session; every exchange opens its own
//! TCP connection, synchronously from the caller's perspective. Delivery is
//! a single connection attempt; the caller reports failures locally.

use bridge_core::{BridgeError, Command, Reply, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

use crate::framing::{read_frame, write_frame};

/// Send one command to a peer and wait for its reply.
///
/// `connect_timeout` bounds only the connection attempt; once connected,
/// the reply is awaited without a deadline (the handler on the other side
/// may be mid-import).
pub async fn send_command(addr: &str, command: &Command, connect_timeout: Duration) -> Result<Reply> {
    let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| BridgeError::Transport(format!("Connection timeout to {}", addr)))?
        .map_err(|e| BridgeError::Transport(format!("Could not reach peer on {}: {}", addr, e)))?;

    stream
        .set_nodelay(true)
        .map_err(|e| BridgeError::Transport(format!("Failed to set TCP_NODELAY: {}", e)))?;

    let mut stream = stream;
    let line = command.encode();
    debug!("[-> {}] {}", addr, line);
    write_frame(&mut stream, &line).await?;

    let raw = read_frame(&mut stream).await?;
    debug!("[<- {}] {}", addr, raw);
    Reply::parse(&raw)
}

/// Liveness probe with a short connect timeout
pub async fn ping(addr: &str, connect_timeout: Duration) -> Result<Reply> {
    send_command(addr, &Command::Ping, connect_timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{CommandHandler, ListenerConfig, PeerListener};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct PongHandler;

    #[async_trait]
    impl CommandHandler for PongHandler {
        async fn handle(&self, command: Command) -> Reply {
            match command {
                Command::Ping => Reply::Pong("here".into()),
                other => Reply::Err(format!("unexpected: {:?}", other)),
            }
        }
    }

    #[tokio::test]
    async fn ping_round_trip() {
        let mut listener = PeerListener::new(ListenerConfig::new(0), Arc::new(PongHandler));
        listener.start().await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let reply = ping(&addr, Duration::from_secs(2)).await.unwrap();
        assert_eq!(reply, Reply::Pong("here".into()));
        listener.stop().await;
    }

    #[tokio::test]
    async fn unreachable_peer_reports_transport_error() {
        // Port 1 on loopback is essentially never listening.
        let err = ping("127.0.0.1:1", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Transport(_)));
    }
}
