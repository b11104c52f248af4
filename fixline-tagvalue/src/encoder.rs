/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIX message encoder.
//!
//! This module provides an encoder for building FIX messages in the
//! tag=value format with a configurable field delimiter.

use crate::checksum::{calculate_checksum, format_checksum};
use crate::delimiter::{EQUALS, SOH};
use bytes::{BufMut, BytesMut};
use fixline_core::error::EncodeError;
use fixline_core::field::FieldValue;
use rust_decimal::Decimal;

/// FIX message encoder.
///
/// The encoder builds FIX messages by appending fields in tag=value format.
/// BeginString, BodyLength and CheckSum are written by [`Encoder::finish`].
#[derive(Debug)]
pub struct Encoder {
    /// Buffer for the message body (between BodyLength and CheckSum).
    body: BytesMut,
    /// The BeginString value (e.g., "FIX.4.4").
    begin_string: String,
    /// Field delimiter.
    delimiter: u8,
}

impl Encoder {
    /// Creates a new encoder with the specified BeginString.
    ///
    /// # Arguments
    /// * `begin_string` - The FIX version string (e.g., "FIX.4.4")
    #[must_use]
    pub fn new(begin_string: impl Into<String>) -> Self {
        Self::with_capacity(begin_string, 256)
    }

    /// Creates a new encoder with pre-allocated capacity.
    ///
    /// # Arguments
    /// * `begin_string` - The FIX version string
    /// * `capacity` - Initial buffer capacity in bytes
    #[must_use]
    pub fn with_capacity(begin_string: impl Into<String>, capacity: usize) -> Self {
        Self {
            body: BytesMut::with_capacity(capacity),
            begin_string: begin_string.into(),
            delimiter: SOH,
        }
    }

    /// Sets the field delimiter.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Returns the configured field delimiter.
    #[inline]
    #[must_use]
    pub const fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Appends a field with a string value.
    #[inline]
    pub fn put_str(&mut self, tag: u32, value: &str) {
        self.put_raw(tag, value.as_bytes());
    }

    /// Appends a field with an integer value.
    #[inline]
    pub fn put_int(&mut self, tag: u32, value: i64) {
        let mut buf = itoa::Buffer::new();
        let s = buf.format(value);
        self.put_raw(tag, s.as_bytes());
    }

    /// Appends a field with an unsigned integer value.
    #[inline]
    pub fn put_uint(&mut self, tag: u32, value: u64) {
        let mut buf = itoa::Buffer::new();
        let s = buf.format(value);
        self.put_raw(tag, s.as_bytes());
    }

    /// Appends a field with a boolean value (Y/N).
    #[inline]
    pub fn put_bool(&mut self, tag: u32, value: bool) {
        self.put_raw(tag, if value { b"Y" } else { b"N" });
    }

    /// Appends a field with a single character value.
    #[inline]
    pub fn put_char(&mut self, tag: u32, value: char) {
        let mut buf = [0u8; 4];
        let s = value.encode_utf8(&mut buf);
        self.put_raw(tag, s.as_bytes());
    }

    /// Appends a field with a decimal value.
    #[inline]
    pub fn put_decimal(&mut self, tag: u32, value: Decimal) {
        self.put_str(tag, &value.normalize().to_string());
    }

    /// Appends a typed field value.
    ///
    /// # Arguments
    /// * `tag` - The field tag number
    /// * `value` - The field value
    ///
    /// # Errors
    /// Returns `EncodeError::DelimiterInValue` if the rendered value contains
    /// the configured delimiter; nothing is appended in that case.
    pub fn put_value(&mut self, tag: u32, value: &FieldValue) -> Result<(), EncodeError> {
        match value {
            FieldValue::String(s) => self.put_checked(tag, s.as_bytes()),
            FieldValue::Data(d) => self.put_checked(tag, d),
            FieldValue::Int(v) => {
                self.put_int(tag, *v);
                Ok(())
            }
            FieldValue::UInt(v) => {
                self.put_uint(tag, *v);
                Ok(())
            }
            FieldValue::Decimal(v) => {
                self.put_decimal(tag, *v);
                Ok(())
            }
            FieldValue::Bool(v) => {
                self.put_bool(tag, *v);
                Ok(())
            }
            FieldValue::Char(c) => {
                let mut buf = [0u8; 4];
                self.put_checked(tag, c.encode_utf8(&mut buf).as_bytes())
            }
        }
    }

    fn put_checked(&mut self, tag: u32, value: &[u8]) -> Result<(), EncodeError> {
        if memchr::memchr(self.delimiter, value).is_some() {
            return Err(EncodeError::DelimiterInValue { tag });
        }
        self.put_raw(tag, value);
        Ok(())
    }

    /// Appends a field with raw bytes.
    ///
    /// The value is written as-is; callers own the guarantee that it does not
    /// contain the delimiter.
    #[inline]
    pub fn put_raw(&mut self, tag: u32, value: &[u8]) {
        let mut tag_buf = itoa::Buffer::new();
        let tag_str = tag_buf.format(tag);

        self.body.put_slice(tag_str.as_bytes());
        self.body.put_u8(EQUALS);
        self.body.put_slice(value);
        self.body.put_u8(self.delimiter);
    }

    /// Finalizes the message and returns the complete encoded bytes.
    ///
    /// Prepends BeginString (8) and BodyLength (9) and appends CheckSum (10).
    #[must_use]
    pub fn finish(self) -> BytesMut {
        let body_len = self.body.len();
        let mut len_buf = itoa::Buffer::new();
        let len_str = len_buf.format(body_len);

        let mut message =
            BytesMut::with_capacity(self.begin_string.len() + len_str.len() + body_len + 16);
        message.put_slice(b"8=");
        message.put_slice(self.begin_string.as_bytes());
        message.put_u8(self.delimiter);
        message.put_slice(b"9=");
        message.put_slice(len_str.as_bytes());
        message.put_u8(self.delimiter);
        message.put_slice(&self.body);

        let checksum = calculate_checksum(&message);
        message.put_slice(b"10=");
        message.put_slice(&format_checksum(checksum));
        message.put_u8(self.delimiter);

        message
    }

    /// Returns the current body length.
    #[inline]
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Clears the encoder for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.body.clear();
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new("FIX.4.4")
    }
}
