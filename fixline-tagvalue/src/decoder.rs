/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Zero-copy FIX message decoder.
//!
//! This module parses FIX messages without allocating memory for field values.
//! Fields are accumulated until the `CheckSum(10)` field is reached, at which
//! point the declared `BodyLength(9)` and the checksum are both verified.

use crate::checksum::{calculate_checksum, parse_checksum};
use crate::delimiter::{EQUALS, SOH};
use fixline_core::error::DecodeError;
use fixline_core::field::FieldRef;
use fixline_core::message::{MsgType, MsgView};
use fixline_core::tags;
use memchr::memchr;
use smallvec::SmallVec;

/// Zero-copy FIX message decoder.
///
/// The decoder parses FIX messages from a byte buffer, extracting fields
/// as references to the original data without copying.
#[derive(Debug)]
pub struct Decoder<'a> {
    /// Input buffer.
    input: &'a [u8],
    /// Current position in the buffer.
    offset: usize,
    /// Field delimiter.
    delimiter: u8,
    /// Whether to validate checksums.
    validate_checksum: bool,
    /// Whether to validate the declared body length.
    validate_length: bool,
}

impl<'a> Decoder<'a> {
    /// Creates a new decoder for the given input buffer, using SOH as delimiter.
    ///
    /// # Arguments
    /// * `input` - The FIX message bytes to decode
    #[inline]
    #[must_use]
    pub const fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            offset: 0,
            delimiter: SOH,
            validate_checksum: true,
            validate_length: true,
        }
    }

    /// Sets the field delimiter.
    #[inline]
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sets whether to validate checksums during decoding.
    #[inline]
    #[must_use]
    pub const fn with_checksum_validation(mut self, validate: bool) -> Self {
        self.validate_checksum = validate;
        self
    }

    /// Sets whether to validate the declared body length during decoding.
    #[inline]
    #[must_use]
    pub const fn with_length_validation(mut self, validate: bool) -> Self {
        self.validate_length = validate;
        self
    }

    /// Decodes one complete FIX message starting at the current offset.
    ///
    /// On success the offset is advanced past the trailing delimiter of the
    /// checksum field, so repeated calls walk a buffer of back-to-back messages.
    ///
    /// # Errors
    /// Returns `DecodeError::Incomplete` if the checksum field has not arrived
    /// yet, and a framing error if the message is malformed.
    pub fn decode(&mut self) -> Result<MsgView<'a>, DecodeError> {
        let start_offset = self.offset;

        let begin_string_field = self.next_field()?.ok_or(DecodeError::Incomplete)?;
        if begin_string_field.tag != tags::BEGIN_STRING {
            return Err(DecodeError::InvalidBeginString);
        }
        let begin_string_start = self.position_of(begin_string_field.value) - start_offset;
        let begin_string = begin_string_start..begin_string_start + begin_string_field.value.len();

        let body_length_field = self.next_field()?.ok_or(DecodeError::Incomplete)?;
        if body_length_field.tag != tags::BODY_LENGTH {
            return Err(DecodeError::MissingBodyLength);
        }
        let declared_length: usize = body_length_field
            .as_str()?
            .parse()
            .map_err(|_| DecodeError::InvalidBodyLength)?;

        let body_start = self.offset;

        let msg_type_field = self.next_field()?.ok_or(DecodeError::Incomplete)?;
        if msg_type_field.tag != tags::MSG_TYPE {
            return Err(DecodeError::MissingMsgType);
        }
        let msg_type: MsgType = match msg_type_field.as_str()?.parse() {
            Ok(msg_type) => msg_type,
            Err(never) => match never {},
        };

        let mut fields: SmallVec<[FieldRef<'a>; 32]> = SmallVec::new();
        fields.push(begin_string_field);
        fields.push(body_length_field);
        fields.push(msg_type_field);

        let (checksum_field, checksum_start) = loop {
            let field_start = self.offset;
            let field = self.next_field()?.ok_or(DecodeError::Incomplete)?;
            if field.tag == tags::CHECK_SUM {
                break (field, field_start);
            }
            fields.push(field);
        };

        if self.validate_length {
            let actual = checksum_start - body_start;
            if actual != declared_length {
                return Err(DecodeError::BodyLengthMismatch {
                    declared: declared_length,
                    actual,
                });
            }
        }

        if self.validate_checksum {
            let declared = parse_checksum(checksum_field.value).ok_or_else(|| {
                DecodeError::InvalidFieldValue {
                    tag: tags::CHECK_SUM,
                    reason: "invalid checksum format".to_string(),
                }
            })?;
            let calculated = calculate_checksum(&self.input[start_offset..checksum_start]);
            if calculated != declared {
                return Err(DecodeError::ChecksumMismatch {
                    calculated,
                    declared,
                });
            }
        }
        fields.push(checksum_field);

        Ok(MsgView::new(
            &self.input[start_offset..self.offset],
            begin_string,
            msg_type,
            fields,
        ))
    }

    /// Parses the next field from the buffer.
    ///
    /// # Returns
    /// The next field, or `None` if the buffer ends before the field is complete.
    ///
    /// # Errors
    /// Returns `DecodeError::InvalidTag` if the tag is not a positive integer.
    #[inline]
    pub fn next_field(&mut self) -> Result<Option<FieldRef<'a>>, DecodeError> {
        if self.offset >= self.input.len() {
            return Ok(None);
        }

        let remaining = &self.input[self.offset..];

        let Some(eq_pos) = memchr(EQUALS, remaining) else {
            // a delimiter without '=' means the tag can never complete
            return match memchr(self.delimiter, remaining) {
                Some(pos) => Err(invalid_tag(&remaining[..pos])),
                None => Ok(None),
            };
        };

        let tag_bytes = &remaining[..eq_pos];
        let tag = parse_tag(tag_bytes).ok_or_else(|| invalid_tag(tag_bytes))?;

        let value_start = eq_pos + 1;
        let Some(delim_pos) = memchr(self.delimiter, &remaining[value_start..]) else {
            return Ok(None);
        };
        let value = &remaining[value_start..value_start + delim_pos];

        self.offset += value_start + delim_pos + 1;

        Ok(Some(FieldRef::new(tag, value)))
    }

    /// Returns the current offset in the buffer.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the remaining bytes in the buffer.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.offset..]
    }

    /// Returns true if the buffer has been fully consumed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offset >= self.input.len()
    }

    /// Resets the decoder to the beginning of the buffer.
    #[inline]
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    fn position_of(&self, value: &[u8]) -> usize {
        value.as_ptr() as usize - self.input.as_ptr() as usize
    }
}

fn invalid_tag(bytes: &[u8]) -> DecodeError {
    DecodeError::InvalidTag(String::from_utf8_lossy(bytes).into_owned())
}

/// Parses a tag number from ASCII bytes.
///
/// # Returns
/// The parsed tag number, or `None` if empty, non-numeric, zero or overflowing.
#[inline]
fn parse_tag(bytes: &[u8]) -> Option<u32> {
    if bytes.is_empty() || bytes.len() > 10 {
        return None;
    }

    let mut result: u32 = 0;
    for &b in bytes {
        if !b.is_ascii_digit() {
            return None;
        }
        result = result.checked_mul(10)?.checked_add(u32::from(b - b'0'))?;
    }

    (result > 0).then_some(result)
}
