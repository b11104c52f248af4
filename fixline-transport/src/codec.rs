/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Tokio codecs for FIX message framing.
//!
//! [`FixCodec`] frames delimited tag=value messages, validating BeginString,
//! BodyLength and CheckSum through the zero-copy decoder. [`WireCodec`]
//! selects between it and the FIXML framing at runtime.

use crate::config::{SubProtocol, TransportConfig};
use crate::fixml::FixmlCodec;
use bytes::{BufMut, Bytes, BytesMut};
use fixline_core::error::{DecodeError, TransportError};
use fixline_core::message::{MsgType, MsgView};
use fixline_tagvalue::Decoder as TagValueDecoder;
use fixline_tagvalue::delimiter::{PIPE, SOH, to_log_text};
use tokio_util::codec::{Decoder, Encoder};

/// One framed inbound message.
///
/// Holds a canonical tag=value buffer; [`ReceivedMsg::view`] borrows it.
#[derive(Debug, Clone)]
pub struct ReceivedMsg {
    msg_type: MsgType,
    buffer: Bytes,
    delimiter: u8,
    wire_len: usize,
    text: String,
}

impl ReceivedMsg {
    /// Creates a received message.
    ///
    /// # Arguments
    /// * `msg_type` - Decoded MsgType
    /// * `buffer` - Validated tag=value bytes
    /// * `delimiter` - Delimiter used in `buffer`
    /// * `wire_len` - Number of bytes consumed from the connection
    /// * `text` - Log form of the message
    #[must_use]
    pub fn new(msg_type: MsgType, buffer: Bytes, delimiter: u8, wire_len: usize, text: String) -> Self {
        Self {
            msg_type,
            buffer,
            delimiter,
            wire_len,
            text,
        }
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Returns a zero-copy view of the message.
    ///
    /// # Errors
    /// Returns a `DecodeError` only if the buffer was not produced by a codec.
    pub fn view(&self) -> Result<MsgView<'_>, DecodeError> {
        TagValueDecoder::new(&self.buffer)
            .with_delimiter(self.delimiter)
            .with_checksum_validation(false)
            .with_length_validation(false)
            .decode()
    }

    /// Returns the tag=value bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Returns the number of bytes read from the connection.
    #[must_use]
    pub const fn wire_len(&self) -> usize {
        self.wire_len
    }

    /// Returns the log form of the message.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Tokio codec for delimited tag=value framing.
#[derive(Debug, Clone)]
pub struct FixCodec {
    /// Maximum message size in bytes.
    max_message_size: usize,
    /// Wire field delimiter.
    delimiter: u8,
    /// Delimiter used in log text.
    log_delimiter: u8,
    /// Whether to validate checksums.
    validate_checksum: bool,
}

impl FixCodec {
    /// Creates a new codec with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_message_size: crate::config::DEFAULT_MAX_MESSAGE_SIZE,
            delimiter: SOH,
            log_delimiter: PIPE,
            validate_checksum: true,
        }
    }

    /// Sets the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Sets the wire and log delimiters.
    #[must_use]
    pub const fn with_delimiters(mut self, delimiter: u8, log_delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self.log_delimiter = log_delimiter;
        self
    }

    /// Sets whether to validate checksums.
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }
}

impl Default for FixCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FixCodec {
    type Item = ReceivedMsg;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let framed = TagValueDecoder::new(&src[..])
            .with_delimiter(self.delimiter)
            .with_checksum_validation(self.validate_checksum)
            .decode()
            .map(|view| (view.len(), view.msg_type().clone()));

        match framed {
            Ok((len, msg_type)) => {
                let buffer = src.split_to(len).freeze();
                let text = to_log_text(&buffer, self.delimiter, self.log_delimiter);
                Ok(Some(ReceivedMsg::new(
                    msg_type,
                    buffer,
                    self.delimiter,
                    len,
                    text,
                )))
            }
            Err(DecodeError::Incomplete) if src.len() > self.max_message_size => {
                Err(DecodeError::MessageTooLarge {
                    size: src.len(),
                    max_size: self.max_message_size,
                }
                .into())
            }
            Err(DecodeError::Incomplete) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(msg) => Ok(Some(msg)),
            None if buf.is_empty() => Ok(None),
            None => Err(DecodeError::Incomplete.into()),
        }
    }
}

impl Encoder<Bytes> for FixCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(&item);
        Ok(())
    }
}

/// Codec selected by the transport's sub protocol.
#[derive(Debug, Clone)]
pub enum WireCodec {
    /// Tag=value framing.
    Ascii(FixCodec),
    /// FIXML framing.
    Fixml(FixmlCodec),
}

impl WireCodec {
    /// Builds the codec for a validated configuration.
    ///
    /// # Errors
    /// Returns `TransportError::Config` if the configuration does not resolve.
    pub fn from_config(config: &TransportConfig) -> Result<Self, TransportError> {
        let (protocol, delimiter) = config.resolve()?;
        Ok(match protocol {
            SubProtocol::Ascii => Self::Ascii(
                FixCodec::new()
                    .with_max_message_size(config.max_message_size)
                    .with_delimiters(delimiter, config.log_delimiter),
            ),
            SubProtocol::Fixml => Self::Fixml(FixmlCodec::new(
                config.begin_string.clone(),
                config.max_message_size,
            )),
        })
    }
}

impl Decoder for WireCodec {
    type Item = ReceivedMsg;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            Self::Ascii(codec) => codec.decode(src),
            Self::Fixml(codec) => codec.decode(src),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            Self::Ascii(codec) => codec.decode_eof(buf),
            Self::Fixml(codec) => codec.decode_eof(buf),
        }
    }
}

impl Encoder<Bytes> for WireCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match self {
            Self::Ascii(codec) => codec.encode(item, dst),
            Self::Fixml(codec) => codec.encode(item, dst),
        }
    }
}
