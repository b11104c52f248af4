/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # fixline Tag-Value
//!
//! Zero-copy FIX tag=value encoding and decoding.
//!
//! ## Features
//!
//! - **Zero-copy parsing**: Field values reference the original buffer
//! - **Configurable delimiter**: SOH by default, any single byte allowed
//! - **Framing checks**: BodyLength and CheckSum are verified on decode
//! - **Log rendering**: Delimiter substitution for human-readable logs

pub mod checksum;
pub mod decoder;
pub mod delimiter;
pub mod encoder;

pub use checksum::calculate_checksum;
pub use decoder::Decoder;
pub use delimiter::{PIPE, SOH, to_log_text};
pub use encoder::Encoder;
pub use fixline_core::message::MsgView;
