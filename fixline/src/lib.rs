/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixline
//!
//! A FIX session engine for Rust.
//!
//! fixline runs the FIX session layer (logon, heartbeats, sequence
//! integrity, gap fill and logout) over any byte-stream connection, using
//! either tag=value or FIXML framing on the wire.
//!
//! ## Features
//!
//! - **Zero-copy parsing**: Field values reference the received buffer
//! - **Pluggable wire format**: tag=value with any delimiter, or FIXML
//! - **Async**: One Tokio task per session, driven by transport events,
//!   timers and handle commands
//! - **Pluggable storage**: Received application messages go to a
//!   [`MessageStore`](store::MessageStore)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fixline::prelude::*;
//!
//! let config = SessionConfig::new(
//!     CompId::new("SENDER").unwrap(),
//!     CompId::new("TARGET").unwrap(),
//!     "FIX.4.4",
//!     Role::Initiator,
//! );
//! let mut session = SessionBuilder::new(config)
//!     .with_application(MyApplication)
//!     .build()?;
//!
//! let wire = TransportConfig::new(
//!     "FIX.4.4",
//!     CompId::new("SENDER").unwrap(),
//!     CompId::new("TARGET").unwrap(),
//! );
//! let transport = TcpInitiator::new(addr, wire)
//!     .connect(Duration::from_secs(5))
//!     .await?;
//! session.run(transport).await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: Fundamental types, message views and error definitions
//! - [`tagvalue`]: Zero-copy tag=value encoding and decoding
//! - [`session`]: Session configuration, state and timers
//! - [`store`]: Message persistence
//! - [`transport`]: Framing codecs and connection handling
//! - [`engine`]: The session state machine

pub mod core {
    //! Core types, message views and error definitions.
    pub use fixline_core::*;
}

pub mod tagvalue {
    //! Zero-copy tag=value encoding and decoding.
    pub use fixline_tagvalue::*;
}

pub mod session {
    //! Session configuration, state and timers.
    pub use fixline_session::*;
}

pub mod store {
    //! Message persistence.
    pub use fixline_store::*;
}

pub mod transport {
    //! Framing codecs and connection handling.
    pub use fixline_transport::*;
}

pub mod engine {
    //! The session state machine.
    pub use fixline_engine::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use fixline_core::{
        CompId, DecodeError, EncodeError, FieldMap, FieldValue, FixError, MsgType, MsgView,
        OwnedMessage, Result, SeqNum, SessionError, StoreError, Timestamp, TransportError,
    };

    // Tag-value encoding
    pub use fixline_tagvalue::{Decoder, Encoder, calculate_checksum};

    // Session
    pub use fixline_session::{Role, SessionConfig, SessionState, StoreFailurePolicy};

    // Store
    pub use fixline_store::{FixMsgStoreRecord, MemoryStore, MessageStore};

    // Transport
    pub use fixline_transport::{
        MsgTransport, SubProtocol, TcpAcceptor, TcpInitiator, TlsOptions, TransportConfig,
    };

    // Engine
    pub use fixline_engine::{
        Application, FixSession, NoOpApplication, SessionBuilder, SessionHandle,
    };
}
