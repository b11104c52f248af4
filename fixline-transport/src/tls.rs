/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! TLS option loading.
//!
//! The handshake itself is left to whichever TLS stack the application uses;
//! this module only resolves the configured files into PEM text.

use fixline_core::error::TransportError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Secure transport options as written in configuration.
#[derive(Debug, Clone, Default)]
pub struct TlsOptions {
    /// Peer or listen host.
    pub host: String,
    /// Peer or listen port.
    pub port: u16,
    /// Private key file.
    pub key: Option<PathBuf>,
    /// Certificate file; only read together with `key`.
    pub cert: Option<PathBuf>,
    /// CA bundle files.
    pub ca: Vec<PathBuf>,
    /// Handshake timeout.
    pub timeout: Option<Duration>,
    /// TLS session cache timeout.
    pub session_timeout: Option<Duration>,
    /// Extra options passed through to the TLS stack.
    pub extra: BTreeMap<String, String>,
}

/// TLS options with every file read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    /// Peer or listen host.
    pub host: String,
    /// Peer or listen port.
    pub port: u16,
    /// Private key PEM.
    pub key: Option<String>,
    /// Certificate PEM.
    pub cert: Option<String>,
    /// CA PEMs in configuration order.
    pub ca: Vec<String>,
    /// Handshake timeout.
    pub timeout: Option<Duration>,
    /// TLS session cache timeout.
    pub session_timeout: Option<Duration>,
    /// Extra options passed through to the TLS stack.
    pub extra: BTreeMap<String, String>,
}

impl TlsOptions {
    /// Creates options for `host:port` with no key material.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the key and certificate files.
    #[must_use]
    pub fn with_key_pair(mut self, key: impl Into<PathBuf>, cert: impl Into<PathBuf>) -> Self {
        self.key = Some(key.into());
        self.cert = Some(cert.into());
        self
    }

    /// Adds a CA file.
    #[must_use]
    pub fn with_ca(mut self, ca: impl Into<PathBuf>) -> Self {
        self.ca.push(ca.into());
        self
    }

    /// Sets the handshake timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the session cache timeout.
    #[must_use]
    pub const fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = Some(timeout);
        self
    }

    /// Adds a pass-through option; later values override earlier ones.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Reads every configured file.
    ///
    /// # Errors
    /// Returns `TransportError::Io` naming the first file that cannot be read.
    pub async fn load(&self) -> Result<TlsMaterial, TransportError> {
        let (key, cert) = match &self.key {
            Some(key) => {
                let cert = match &self.cert {
                    Some(cert) => Some(read(cert).await?),
                    None => None,
                };
                (Some(read(key).await?), cert)
            }
            None => (None, None),
        };

        let mut ca = Vec::with_capacity(self.ca.len());
        for path in &self.ca {
            ca.push(read(path).await?);
        }

        Ok(TlsMaterial {
            host: self.host.clone(),
            port: self.port,
            key,
            cert,
            ca,
            timeout: self.timeout,
            session_timeout: self.session_timeout,
            extra: self.extra.clone(),
        })
    }
}

async fn read(path: &Path) -> Result<String, TransportError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| TransportError::Io(format!("{}: {e}", path.display())))
}
