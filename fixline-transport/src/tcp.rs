/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! TCP initiator and acceptor producing [`MsgTransport`]s.

use crate::config::TransportConfig;
use crate::transport::MsgTransport;
use fixline_core::error::TransportError;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::info;

static NEXT_TRANSPORT_ID: AtomicU32 = AtomicU32::new(1);

/// Returns a process-unique, increasing transport id.
#[must_use]
pub fn next_transport_id() -> u32 {
    NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Opens outbound connections.
#[derive(Debug, Clone)]
pub struct TcpInitiator {
    addr: String,
    config: TransportConfig,
}

impl TcpInitiator {
    /// Creates an initiator for `addr` (e.g. `"127.0.0.1:9878"`).
    #[must_use]
    pub fn new(addr: impl Into<String>, config: TransportConfig) -> Self {
        Self {
            addr: addr.into(),
            config,
        }
    }

    /// Connects and binds a transport to the stream.
    ///
    /// # Errors
    /// Returns `TransportError::Timeout` if the connection is not established
    /// within `timeout`, `TransportError::Io` if it fails, or a configuration
    /// error from [`MsgTransport::new`].
    pub async fn connect(&self, timeout: Duration) -> Result<MsgTransport, TransportError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| TransportError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })??;
        stream.set_nodelay(true)?;
        let id = next_transport_id();
        info!(transport_id = id, addr = %self.addr, "connected");
        MsgTransport::new(id, &self.config, stream)
    }
}

/// Accepts inbound connections.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
    config: TransportConfig,
}

impl TcpAcceptor {
    /// Binds a listener.
    ///
    /// # Errors
    /// Returns `TransportError::Io` if the address cannot be bound.
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, config })
    }

    /// Returns the bound address.
    ///
    /// # Errors
    /// Returns `TransportError::Io` if the address is unavailable.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Waits for the next connection and binds a transport to it.
    ///
    /// # Errors
    /// Returns `TransportError::Io` if accepting fails.
    pub async fn accept(&self) -> Result<(MsgTransport, SocketAddr), TransportError> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        let id = next_transport_id();
        info!(transport_id = id, %peer, "accepted connection");
        Ok((MsgTransport::new(id, &self.config, stream)?, peer))
    }
}
