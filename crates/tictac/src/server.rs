//! `StoreServer` builder and accept loop.
//!
//! The server shares one [`MemoryStore`] between every client that
//! connects, which is what lets two players on different machines see the
//! same game document.

use std::sync::Arc;

use tictac_protocol::{Codec, JsonCodec};
use tictac_store::{MemoryStore, StoreConfig};
use tictac_transport::{Transport, WebSocketTransport};

use crate::handler::handle_connection;
use crate::TictacError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) store: MemoryStore,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a store server.
///
/// # Example
///
/// ```rust,no_run
/// use tictac::prelude::*;
///
/// # async fn start() -> Result<(), TictacError> {
/// let server = StoreServer::builder()
///     .bind("0.0.0.0:9001")
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct StoreServerBuilder {
    bind_addr: String,
    store_config: StoreConfig,
}

impl StoreServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:9001".to_string(),
            store_config: StoreConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration of the backing store.
    pub fn store_config(mut self, config: StoreConfig) -> Self {
        self.store_config = config;
        self
    }

    /// Binds the listener and starts the backing store.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<StoreServer<JsonCodec>, TictacError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let state = Arc::new(ServerState {
            store: MemoryStore::spawn(self.store_config),
            codec: JsonCodec,
        });
        Ok(StoreServer { transport, state })
    }
}

impl Default for StoreServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A document store served over WebSocket.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct StoreServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl StoreServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> StoreServerBuilder {
        StoreServerBuilder::new()
    }
}

impl<C: Codec> StoreServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// The store behind the server. Writes made through it reach remote
    /// watchers like any other.
    pub fn store(&self) -> &MemoryStore {
        &self.state.store
    }

    /// Runs the accept loop.
    ///
    /// Spawns a handler task per connection. Runs until the process is
    /// terminated or the task is aborted.
    pub async fn run(mut self) -> Result<(), TictacError> {
        tracing::info!(addr = ?self.local_addr().ok(), "store server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
