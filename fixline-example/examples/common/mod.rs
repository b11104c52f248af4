//! Common utilities shared across examples.

#![allow(dead_code)]

use anyhow::Context;
use fixline_core::types::CompId;
use fixline_session::config::{Role, SessionConfig};
use fixline_transport::config::TransportConfig;
use std::env;
use std::time::Duration;

/// Default server port.
pub const DEFAULT_PORT: u16 = 9876;

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Example configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ExampleConfig {
    /// Server hostname.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Sender CompID.
    pub sender_comp_id: String,
    /// Target CompID.
    pub target_comp_id: String,
    /// FIX version string.
    pub begin_string: String,
    /// Wire sub protocol, `ascii` or `fixml`.
    pub protocol: String,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval: u64,
    /// Session role.
    pub role: Role,
}

impl ExampleConfig {
    fn from_env(role: Role, sender: &str, target: &str) -> Self {
        Self {
            host: env::var("FIX_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env::var("FIX_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            sender_comp_id: env::var("FIX_SENDER").unwrap_or_else(|_| sender.to_string()),
            target_comp_id: env::var("FIX_TARGET").unwrap_or_else(|_| target.to_string()),
            begin_string: env::var("FIX_VERSION").unwrap_or_else(|_| "FIX.4.4".to_string()),
            protocol: env::var("FIX_PROTOCOL").unwrap_or_else(|_| "ascii".to_string()),
            heartbeat_interval: env::var("FIX_HEARTBEAT")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(30),
            role,
        }
    }

    /// Creates a new configuration for a client.
    #[must_use]
    pub fn client() -> Self {
        Self::from_env(Role::Initiator, "CLIENT", "SERVER")
    }

    /// Creates a new configuration for a server.
    #[must_use]
    pub fn server() -> Self {
        Self::from_env(Role::Acceptor, "SERVER", "CLIENT")
    }

    /// Returns the socket address string.
    #[must_use]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Builds the session configuration.
    pub fn session(&self) -> anyhow::Result<SessionConfig> {
        Ok(SessionConfig::new(
            comp_id(&self.sender_comp_id)?,
            comp_id(&self.target_comp_id)?,
            self.begin_string.as_str(),
            self.role,
        )
        .with_heartbeat_interval(Duration::from_secs(self.heartbeat_interval)))
    }

    /// Builds the transport configuration.
    pub fn transport(&self) -> anyhow::Result<TransportConfig> {
        Ok(TransportConfig::new(
            self.begin_string.as_str(),
            comp_id(&self.sender_comp_id)?,
            comp_id(&self.target_comp_id)?,
        )
        .with_protocol(self.protocol.as_str()))
    }
}

fn comp_id(value: &str) -> anyhow::Result<CompId> {
    CompId::new(value).with_context(|| format!("invalid CompID '{value}'"))
}

/// Initializes logging for examples.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .try_init();
}
