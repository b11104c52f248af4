/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixline Transport
//!
//! Message transports for the fixline FIX session engine.
//!
//! This crate provides:
//! - **Codecs**: Tokio codecs for delimited tag=value and FIXML framing
//! - **Transmitter**: Header stamping and outbound sequence allocation
//! - **Transport**: Receiver and writer tasks bound to one duplex stream
//! - **TCP**: Initiator and acceptor producing transports
//! - **TLS options**: Loading of key, certificate and CA files

pub mod codec;
pub mod config;
pub mod fixml;
pub mod tcp;
pub mod tls;
pub mod transmitter;
pub mod transport;

pub use codec::{FixCodec, ReceivedMsg, WireCodec};
pub use config::{SubProtocol, TransportConfig};
pub use fixml::FixmlCodec;
pub use tcp::{TcpAcceptor, TcpInitiator, next_transport_id};
pub use tls::{TlsMaterial, TlsOptions};
pub use transmitter::{Encoded, MsgTransmitter, Replay};
pub use transport::{MsgTransport, TransportEvent};
