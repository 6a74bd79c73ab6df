//! Peer listener: persistent accept loop on a well-known loopback port
//!
//! Each connection carries exactly one command frame and one reply frame.
//! The listener never touches scene state itself; it hands the parsed
//! command to a [`CommandHandler`], which is expected to marshal the work
//! onto the scene-owner execution context and return the reply. Handler
//! errors become `ERR|...` replies; nothing a client sends can take the
//! accept loop down.

use async_trait::async_trait;
use bridge_core::{BridgeError, Command, Reply, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::framing::{read_frame, write_frame};

/// Handler table of one peer: maps each parsed command to its reply
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn handle(&self, command: Command) -> Reply;
}

/// Callback fired on every accepted connection (UI "peer seen" indicator)
pub type ConnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Listener bind configuration
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Bind host (loopback only; the channel is unauthenticated)
    pub host: String,
    /// Well-known port of this peer
    pub port: u16,
}

impl ListenerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            host: "127.0.0.1".into(),
            port,
        }
    }
}

enum ListenerState {
    Stopped,
    Listening {
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
        bound: SocketAddr,
    },
}

/// Owned listener state: config, handler table, connection callback, and
/// the running accept loop if any. One instance per host process.
pub struct PeerListener {
    config: ListenerConfig,
    handler: Arc<dyn CommandHandler>,
    on_connect: Option<ConnectCallback>,
    state: ListenerState,
}

impl PeerListener {
    pub fn new(config: ListenerConfig, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            config,
            handler,
            on_connect: None,
            state: ListenerState::Stopped,
        }
    }

    /// Register the connection notification callback
    pub fn set_on_connect(&mut self, callback: impl Fn() + Send + Sync + 'static) {
        self.on_connect = Some(Arc::new(callback));
    }

    /// Whether the accept loop is running
    pub fn is_running(&self) -> bool {
        matches!(self.state, ListenerState::Listening { .. })
    }

    /// Address actually bound, once listening (port 0 resolves here)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            ListenerState::Listening { bound, .. } => Some(*bound),
            ListenerState::Stopped => None,
        }
    }

    /// Start the accept loop. No-op while already listening; on bind
    /// failure the listener stays stopped and the attempt is the only
    /// casualty.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            info!("Listener already running on port {}", self.config.port);
            return Ok(());
        }

        let listener = self.bind()?;
        let bound = listener.local_addr().map_err(|e| {
            BridgeError::Transport(format!("Could not read bound address: {}", e))
        })?;
        info!("Listening on {}", bound);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handler = self.handler.clone();
        let on_connect = self.on_connect.clone();
        let task = tokio::spawn(accept_loop(listener, handler, on_connect, shutdown_rx));

        self.state = ListenerState::Listening {
            shutdown,
            task,
            bound,
        };
        Ok(())
    }

    /// Stop the accept loop and close the socket. Cooperative: an in-flight
    /// connection finishes its reply first.
    pub async fn stop(&mut self) {
        match std::mem::replace(&mut self.state, ListenerState::Stopped) {
            ListenerState::Stopped => {}
            ListenerState::Listening { shutdown, task, .. } => {
                let _ = shutdown.send(true);
                let _ = task.await;
                info!("Listener stopped");
            }
        }
    }

    fn bind(&self) -> Result<TcpListener> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| {
                BridgeError::Transport(format!(
                    "Invalid listen address {}:{}: {}",
                    self.config.host, self.config.port, e
                ))
            })?;

        let socket = TcpSocket::new_v4()
            .map_err(|e| BridgeError::Transport(format!("Could not create socket: {}", e)))?;
        socket
            .set_reuseaddr(true)
            .map_err(|e| BridgeError::Transport(format!("Could not set SO_REUSEADDR: {}", e)))?;
        socket.bind(addr).map_err(|e| {
            error!("Bind to {} failed: {}", addr, e);
            BridgeError::Transport(format!("Bind to {} failed: {}", addr, e))
        })?;
        socket
            .listen(8)
            .map_err(|e| BridgeError::Transport(format!("Listen on {} failed: {}", addr, e)))
    }
}

async fn accept_loop(
    listener: TcpListener,
    handler: Arc<dyn CommandHandler>,
    on_connect: Option<ConnectCallback>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!("Shutdown requested, accept loop exiting");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        debug!("Connection from {}", addr);
                        if let Some(callback) = &on_connect {
                            callback();
                        }
                        let handler = handler.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, handler).await {
                                warn!("Connection from {} failed: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                    }
                }
            }
        }
    }
}

/// One connection: read one frame, dispatch, write one reply, close.
///
/// Decode failures still get an `ERR|...` reply where the connection is
/// intact; transport failures are logged by the caller and dropped.
async fn serve_connection(mut stream: TcpStream, handler: Arc<dyn CommandHandler>) -> Result<()> {
    let reply = match read_frame(&mut stream).await {
        Ok(text) => {
            debug!("Received command: {}", text);
            handler.handle(Command::parse(&text)).await
        }
        Err(e @ BridgeError::Protocol(_)) => {
            warn!("Rejecting malformed frame: {}", e);
            Reply::Err(e.reason().to_string())
        }
        Err(e) => return Err(e),
    };

    write_frame(&mut stream, &reply.encode()).await
}
