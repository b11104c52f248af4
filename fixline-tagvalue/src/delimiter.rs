/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Field delimiters and delimiter substitution for log text.
//!
//! The wire delimiter is configurable (SOH by default). Log output usually
//! swaps it for a printable separator; that swap only ever touches a copy of
//! the bytes, never what goes to the transport.

/// SOH (Start of Header) delimiter used in FIX messages.
pub const SOH: u8 = 0x01;

/// Pipe delimiter used for human-readable FIX logs.
pub const PIPE: u8 = b'|';

/// Equals sign delimiter between tag and value.
pub const EQUALS: u8 = b'=';

/// Renders message bytes as text with every `delimiter` replaced by `log_delimiter`.
///
/// # Arguments
/// * `data` - Encoded message bytes
/// * `delimiter` - The wire field delimiter
/// * `log_delimiter` - The delimiter to show in the text
#[must_use]
pub fn to_log_text(data: &[u8], delimiter: u8, log_delimiter: u8) -> String {
    if delimiter == log_delimiter {
        return String::from_utf8_lossy(data).into_owned();
    }
    let swapped: Vec<u8> = data
        .iter()
        .map(|&b| if b == delimiter { log_delimiter } else { b })
        .collect();
    String::from_utf8_lossy(&swapped).into_owned()
}
