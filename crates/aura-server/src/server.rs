//! [`FeedbackServer`] – WebSocket acceptor for feedback clients.
//!
//! Listens on `0.0.0.0:8080` by default (configurable via
//! [`FeedbackServer::with_port`] / [`FeedbackServer::with_host`]). Every
//! accepted connection is upgraded to a WebSocket and handed to
//! [`run_session`] on its own task inside a [`JoinSet`], so that shutdown can
//! cancel all of them at once.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use aura_memory::KnowledgeStore;
use aura_types::AuraError;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_tungstenite::accept_async;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::session::run_session;

/// Default TCP port for the feedback WebSocket server.
pub const DEFAULT_PORT: u16 = 8080;

// ---------------------------------------------------------------------------
// FeedbackServer
// ---------------------------------------------------------------------------

/// Builder for the WebSocket acceptor.
pub struct FeedbackServer {
    store: Arc<KnowledgeStore>,
    host: IpAddr,
    port: u16,
}

impl FeedbackServer {
    /// Create a server backed by `store` on `0.0.0.0:`[`DEFAULT_PORT`].
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self {
            store,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style). `0` picks a free port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Override the listening address (builder-style).
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind the TCP listener without accepting yet.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Bind`] if the listener cannot bind.
    pub async fn bind(self) -> Result<BoundServer, AuraError> {
        let addr = SocketAddr::new(self.host, self.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AuraError::Bind(format!("bind error on {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AuraError::Bind(format!("local address of {addr}: {e}")))?;

        Ok(BoundServer {
            listener,
            local_addr,
            store: self.store,
        })
    }

    /// Bind and serve until `shutdown` becomes `true`.
    ///
    /// # Errors
    ///
    /// Returns [`AuraError::Bind`] if the listener cannot bind.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), AuraError> {
        self.bind().await?.serve(shutdown).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// BoundServer
// ---------------------------------------------------------------------------

/// A listening server, ready to [`serve`][BoundServer::serve].
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    store: Arc<KnowledgeStore>,
}

impl BoundServer {
    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` becomes `true` (or its sender is
    /// dropped), then abort every open session and return.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) {
        info!(addr = %self.local_addr, "feedback server listening");
        let mut sessions = JoinSet::new();

        while !*shutdown.borrow_and_update() {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let store = Arc::clone(&self.store);
                        let span = info_span!("session", session_id = %Uuid::new_v4(), peer = %peer);
                        sessions.spawn(handle_connection(stream, peer, store).instrument(span));
                    }
                    Err(e) => warn!(error = %e, "accept error"),
                },
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        error!(error = %e, "session task panicked");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        let open = sessions.len();
        sessions.shutdown().await;
        info!(open_sessions = open, "feedback server stopped");
    }
}

// ---------------------------------------------------------------------------
// Per-connection handler
// ---------------------------------------------------------------------------

async fn handle_connection(stream: TcpStream, peer: SocketAddr, store: Arc<KnowledgeStore>) {
    info!("client connected");
    let result = match accept_async(stream).await {
        Ok(ws) => run_session(ws, peer, store).await,
        Err(e) => Err(AuraError::Connection(format!("WS handshake from {peer}: {e}"))),
    };

    match result {
        Ok(()) => info!("client disconnected"),
        Err(e) => warn!(error = %e, "session ended"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
