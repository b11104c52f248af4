/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Transport configuration.

use fixline_core::error::TransportError;
use fixline_core::types::CompId;
use fixline_tagvalue::delimiter::{PIPE, SOH};
use std::fmt;
use std::str::FromStr;

/// Default upper bound on a single buffered message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Wire framing used on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SubProtocol {
    /// Delimited tag=value framing.
    #[default]
    Ascii,
    /// FIXML element framing.
    Fixml,
}

impl SubProtocol {
    /// Returns the name used in text configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ascii => "ascii",
            Self::Fixml => "fixml",
        }
    }
}

impl FromStr for SubProtocol {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ascii" | "tagvalue" => Ok(Self::Ascii),
            "fixml" => Ok(Self::Fixml),
            other => Err(TransportError::Config(format!(
                "unknown sub protocol '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SubProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of one message transport.
///
/// The protocol is kept as text so it can come straight from a config file;
/// it is validated when a transport is built.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Sub protocol name, `ascii` or `fixml`.
    pub protocol: String,
    /// Wire field delimiter.
    pub delimiter: Option<u8>,
    /// Delimiter shown in log text.
    pub log_delimiter: u8,
    /// Largest message the receiver buffers before failing.
    pub max_message_size: usize,
    /// BeginString stamped on outbound messages.
    pub begin_string: String,
    /// SenderCompID stamped on outbound messages.
    pub sender_comp_id: CompId,
    /// TargetCompID stamped on outbound messages.
    pub target_comp_id: CompId,
    /// Capacity of the outbound byte channel.
    pub write_buffer: usize,
}

impl TransportConfig {
    /// Creates an `ascii` configuration with SOH delimiter.
    ///
    /// # Arguments
    /// * `begin_string` - The FIX version string
    /// * `sender_comp_id` - Our CompID
    /// * `target_comp_id` - The peer's CompID
    #[must_use]
    pub fn new(
        begin_string: impl Into<String>,
        sender_comp_id: CompId,
        target_comp_id: CompId,
    ) -> Self {
        Self {
            protocol: SubProtocol::Ascii.as_str().to_string(),
            delimiter: Some(SOH),
            log_delimiter: PIPE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            begin_string: begin_string.into(),
            sender_comp_id,
            target_comp_id,
            write_buffer: 1024,
        }
    }

    /// Sets the sub protocol name.
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    /// Sets the wire delimiter; `None` leaves the transport unconfigured.
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: Option<u8>) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets the log delimiter.
    #[must_use]
    pub const fn with_log_delimiter(mut self, delimiter: u8) -> Self {
        self.log_delimiter = delimiter;
        self
    }

    /// Sets the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Swaps sender and target, for building the peer side of a connection.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut config = self.clone();
        std::mem::swap(&mut config.sender_comp_id, &mut config.target_comp_id);
        config
    }

    /// Parses the sub protocol and checks the delimiter.
    ///
    /// # Returns
    /// The selected sub protocol and the wire delimiter.
    ///
    /// # Errors
    /// Returns `TransportError::Config` for an unknown protocol or a missing delimiter.
    pub fn resolve(&self) -> Result<(SubProtocol, u8), TransportError> {
        let protocol: SubProtocol = self.protocol.parse()?;
        let delimiter = self
            .delimiter
            .ok_or_else(|| TransportError::Config("no delimiter defined".to_string()))?;
        if delimiter == b'=' {
            return Err(TransportError::Config(
                "delimiter cannot be '='".to_string(),
            ));
        }
        Ok((protocol, delimiter))
    }
}
