/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixline Store
//!
//! Persistence of received FIX messages for audit and resend replay.
//!
//! This crate provides:
//! - **MessageStore trait**: Abstract interface for message storage
//! - **FixMsgStoreRecord**: The immutable stored record
//! - **MemoryStore**: In-memory message store for testing and simple use cases

pub mod memory;
pub mod record;
pub mod traits;

pub use memory::MemoryStore;
pub use record::FixMsgStoreRecord;
pub use traits::{MessageStore, StoreState};
