//! Async TCP listener using Tokio.
//!
//! Accepts client connections and hands each one to its own
//! [`ConnectionHandler`] task. The accept loop keeps no per-connection state
//! and never waits for a handler to finish.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::cache::ObjectCache;
use crate::proxy::{ConnectionHandler, Proxy};

/// Errors produced by the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// The proxy's listening socket.
///
/// # Examples
///
/// ```rust,no_run
/// use cacheproxy::config::ProxyConfig;
/// use cacheproxy::proxy::Proxy;
/// use cacheproxy::server::Server;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let proxy = Proxy::new(ProxyConfig::default());
///     let server = Server::bind("0.0.0.0:15213", proxy).await?;
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    proxy: Proxy,
}

impl Server {
    /// Binds the server to the given TCP address.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address cannot be bound
    /// (e.g. port already in use, insufficient permissions).
    pub async fn bind(addr: impl AsRef<str>, proxy: Proxy) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.to_owned(),
                source: e,
            })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            proxy,
        })
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The cache shared by every connection this server accepts.
    pub fn cache(&self) -> &Arc<ObjectCache> {
        self.proxy.cache()
    }

    /// Accepts connections until the process is terminated.
    ///
    /// Accept failures are logged and the loop continues; per-connection
    /// failures stay inside their own task.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(address = %self.local_addr, "proxy listening");

        loop {
            let (stream, peer_addr) = match self.listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    error!(error = %e, "failed to accept connection");
                    continue;
                }
            };

            info!(
                host = %peer_addr.ip(),
                port = peer_addr.port(),
                "Accepted connection from"
            );
            let proxy = self.proxy.clone();

            tokio::spawn(async move {
                match ConnectionHandler::from_stream(proxy, stream).run().await {
                    Ok(outcome) => debug!(peer = %peer_addr, ?outcome, "connection done"),
                    Err(e) => warn!(peer = %peer_addr, error = %e, "connection closed with error"),
                }
            });
        }
    }
}
