/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixline Core
//!
//! Core types, message views, and error definitions for the fixline FIX session engine.
//!
//! This crate provides the building blocks shared by every fixline crate:
//! - **Error types**: Unified error handling with `thiserror`
//! - **Field types**: `FieldRef`, `FieldValue`, and the ordered `FieldMap`
//! - **Message types**: the zero-copy `MsgView`, `OwnedMessage`, and `MsgType`
//! - **Core types**: `SeqNum`, `Timestamp`, `CompId`
//! - **Tags**: constants for the session-level tags the engine reads and writes
//!
//! ## Zero-Copy Design
//!
//! Inbound messages are exposed as borrowed [`MsgView`]s that live only for one
//! dispatch callback. Outbound messages are described with an owned [`FieldMap`].

pub mod error;
pub mod field;
pub mod message;
pub mod tags;
pub mod types;

pub use error::{
    DecodeError, EncodeError, FixError, Result, SessionError, StoreError, TransportError,
};
pub use field::{FieldMap, FieldRef, FieldValue};
pub use message::{MsgHeader, MsgType, MsgView, OwnedMessage};
pub use types::{CompId, SeqNum, Timestamp};
