/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixline Session
//!
//! FIX session layer building blocks.
//!
//! This crate provides:
//! - **State**: The session lifecycle enum and the per-session state record
//! - **Sequence checks**: Classification of inbound sequence numbers
//! - **Heartbeat handling**: Heartbeat/TestRequest timing
//! - **Configuration**: Session configuration options

pub mod config;
pub mod heartbeat;
pub mod sequence;
pub mod state;

pub use config::{Role, SessionConfig, StoreFailurePolicy};
pub use heartbeat::{HeartbeatAction, HeartbeatManager};
pub use sequence::SequenceResult;
pub use state::{FixSessionState, SessionState, StateChange};
