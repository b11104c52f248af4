/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixline Engine
//!
//! FIX session state machine for the fixline protocol engine.
//!
//! This crate provides:
//! - **Session**: Handshake, heartbeat, resend and logout handling over one transport
//! - **Application trait**: Callback interface for handling FIX messages
//! - **Handle**: Command channel for sending messages and ending a session
//! - **Builder API**: Fluent configuration for session setup

pub mod application;
pub mod builder;
pub mod handle;
pub mod session;

pub use application::{Application, NoOpApplication};
pub use builder::SessionBuilder;
pub use handle::{SessionCommand, SessionHandle};
pub use session::FixSession;
