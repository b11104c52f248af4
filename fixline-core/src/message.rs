/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Message types and views for the FIX protocol.
//!
//! This module provides:
//! - [`MsgView`]: Zero-copy, read-only view into one decoded message buffer
//! - [`OwnedMessage`]: Owned message for storage and cross-task transfer
//! - [`MsgType`]: Enumeration of FIX message types
//! - [`MsgHeader`]: Standard header stamped on an outbound message

use crate::error::DecodeError;
use crate::field::FieldRef;
use crate::tags;
use crate::types::{CompId, SeqNum, Timestamp};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;

/// FIX message types.
///
/// The session-level (administrative) messages are listed first; a handful of
/// application messages commonly exchanged over a session follow. Anything else
/// is carried as `Custom(String)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MsgType {
    /// Heartbeat (0) - Session level.
    #[default]
    Heartbeat,
    /// Test Request (1) - Session level.
    TestRequest,
    /// Resend Request (2) - Session level.
    ResendRequest,
    /// Reject (3) - Session level.
    Reject,
    /// Sequence Reset (4) - Session level.
    SequenceReset,
    /// Logout (5) - Session level.
    Logout,
    /// Logon (A) - Session level.
    Logon,
    /// Advertisement (7).
    Advertisement,
    /// Execution Report (8).
    ExecutionReport,
    /// New Order Single (D).
    NewOrderSingle,
    /// Order Status Request (H).
    OrderStatusRequest,
    /// List Status (N).
    ListStatus,
    /// Quote Request (R).
    QuoteRequest,
    /// Market Data Request (V).
    MarketDataRequest,
    /// Market Data Snapshot/Full Refresh (W).
    MarketDataSnapshotFullRefresh,
    /// Business Message Reject (j).
    BusinessMessageReject,
    /// Cross Order Cancel Request (u).
    CrossOrderCancelRequest,
    /// Trade Capture Report (AE).
    TradeCaptureReport,
    /// Quote Request Reject (AG).
    QuoteRequestReject,
    /// Request For Positions Ack (AO).
    RequestForPositionsAck,
    /// Custom or unknown message type.
    Custom(String),
}

impl std::str::FromStr for MsgType {
    type Err = std::convert::Infallible;

    /// Creates a MsgType from a string value.
    ///
    /// # Arguments
    /// * `s` - The message type string (e.g., "A" for Logon)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "0" => Self::Heartbeat,
            "1" => Self::TestRequest,
            "2" => Self::ResendRequest,
            "3" => Self::Reject,
            "4" => Self::SequenceReset,
            "5" => Self::Logout,
            "A" => Self::Logon,
            "7" => Self::Advertisement,
            "8" => Self::ExecutionReport,
            "D" => Self::NewOrderSingle,
            "H" => Self::OrderStatusRequest,
            "N" => Self::ListStatus,
            "R" => Self::QuoteRequest,
            "V" => Self::MarketDataRequest,
            "W" => Self::MarketDataSnapshotFullRefresh,
            "j" => Self::BusinessMessageReject,
            "u" => Self::CrossOrderCancelRequest,
            "AE" => Self::TradeCaptureReport,
            "AG" => Self::QuoteRequestReject,
            "AO" => Self::RequestForPositionsAck,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl MsgType {
    /// Returns the wire representation of this message type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heartbeat => "0",
            Self::TestRequest => "1",
            Self::ResendRequest => "2",
            Self::Reject => "3",
            Self::SequenceReset => "4",
            Self::Logout => "5",
            Self::Logon => "A",
            Self::Advertisement => "7",
            Self::ExecutionReport => "8",
            Self::NewOrderSingle => "D",
            Self::OrderStatusRequest => "H",
            Self::ListStatus => "N",
            Self::QuoteRequest => "R",
            Self::MarketDataRequest => "V",
            Self::MarketDataSnapshotFullRefresh => "W",
            Self::BusinessMessageReject => "j",
            Self::CrossOrderCancelRequest => "u",
            Self::TradeCaptureReport => "AE",
            Self::QuoteRequestReject => "AG",
            Self::RequestForPositionsAck => "AO",
            Self::Custom(s) => s.as_str(),
        }
    }

    /// Returns true if this is an administrative (session-level) message.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::Heartbeat
                | Self::TestRequest
                | Self::ResendRequest
                | Self::Reject
                | Self::SequenceReset
                | Self::Logout
                | Self::Logon
        )
    }

    /// Returns true if this is an application message.
    #[must_use]
    pub fn is_app(&self) -> bool {
        !self.is_admin()
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zero-copy view into one decoded FIX message.
///
/// A view borrows the buffer it was decoded from, so it cannot outlive the
/// dispatch callback that receives it. Use [`MsgView::to_owned`] to keep a copy.
#[derive(Debug, Clone)]
pub struct MsgView<'a> {
    /// The complete message buffer.
    buffer: &'a [u8],
    /// Range of the BeginString field value.
    begin_string: Range<usize>,
    /// The parsed message type.
    msg_type: MsgType,
    /// Parsed field references in wire order.
    fields: SmallVec<[FieldRef<'a>; 32]>,
}

impl<'a> MsgView<'a> {
    /// Creates a new view from parsed components.
    ///
    /// # Arguments
    /// * `buffer` - The complete message buffer
    /// * `begin_string` - Range of the BeginString value
    /// * `msg_type` - The parsed message type
    /// * `fields` - Parsed field references
    #[must_use]
    pub fn new(
        buffer: &'a [u8],
        begin_string: Range<usize>,
        msg_type: MsgType,
        fields: SmallVec<[FieldRef<'a>; 32]>,
    ) -> Self {
        Self {
            buffer,
            begin_string,
            msg_type,
            fields,
        }
    }

    /// Returns the BeginString value (e.g., "FIX.4.4").
    #[must_use]
    pub fn begin_string(&self) -> &'a str {
        std::str::from_utf8(&self.buffer[self.begin_string.clone()]).unwrap_or("")
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Gets a field by tag number.
    ///
    /// # Returns
    /// The first field with the given tag, or `None` if not found.
    #[must_use]
    pub fn get_field(&self, tag: u32) -> Option<&FieldRef<'a>> {
        self.fields.iter().find(|f| f.tag == tag)
    }

    /// Gets a field value as a string.
    ///
    /// # Returns
    /// The field value as a string, or `None` if not found or invalid UTF-8.
    #[must_use]
    pub fn get_field_str(&self, tag: u32) -> Option<&'a str> {
        self.get_field(tag).and_then(|f| f.as_str().ok())
    }

    /// Gets a field value parsed as the specified type.
    ///
    /// # Errors
    /// Returns `DecodeError` if the field is not found or cannot be parsed.
    pub fn get_field_as<T: std::str::FromStr>(&self, tag: u32) -> Result<T, DecodeError> {
        self.get_field(tag)
            .ok_or(DecodeError::MissingRequiredField { tag })?
            .parse()
    }

    /// Returns `MsgSeqNum(34)`, if present and numeric.
    #[must_use]
    pub fn seq_num(&self) -> Option<SeqNum> {
        self.get_field(tags::MSG_SEQ_NUM)
            .and_then(|f| f.as_u64().ok())
            .map(SeqNum::new)
    }

    /// Returns `SenderCompID(49)`.
    #[must_use]
    pub fn sender_comp_id(&self) -> Option<&'a str> {
        self.get_field_str(tags::SENDER_COMP_ID)
    }

    /// Returns `TargetCompID(56)`.
    #[must_use]
    pub fn target_comp_id(&self) -> Option<&'a str> {
        self.get_field_str(tags::TARGET_COMP_ID)
    }

    /// Returns true when `PossDupFlag(43)` is `Y`.
    #[must_use]
    pub fn is_poss_dup(&self) -> bool {
        self.get_field(tags::POSS_DUP_FLAG)
            .and_then(|f| f.as_bool().ok())
            .unwrap_or(false)
    }

    /// Returns the message length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the message is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Converts this borrowed view to an owned message.
    #[must_use]
    pub fn to_owned(&self) -> OwnedMessage {
        OwnedMessage::from_view(self)
    }
}

/// Owned FIX message for storage and cross-task transfer.
///
/// Unlike [`MsgView`], this struct owns its data and can be
/// safely sent across tasks or stored for later use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedMessage {
    /// The complete message buffer.
    buffer: Bytes,
    /// The parsed message type.
    msg_type: MsgType,
    /// Field offsets: (tag, value_range).
    field_offsets: Vec<(u32, Range<usize>)>,
}

impl OwnedMessage {
    /// Creates an OwnedMessage by copying a view.
    ///
    /// # Arguments
    /// * `view` - The view to copy
    #[must_use]
    pub fn from_view(view: &MsgView<'_>) -> Self {
        let buffer = Bytes::copy_from_slice(view.buffer);
        let field_offsets = view
            .fields
            .iter()
            .map(|f| {
                let start = f.value.as_ptr() as usize - view.buffer.as_ptr() as usize;
                let end = start + f.value.len();
                (f.tag, start..end)
            })
            .collect();

        Self {
            buffer,
            msg_type: view.msg_type.clone(),
            field_offsets,
        }
    }

    /// Creates an OwnedMessage from raw bytes.
    ///
    /// # Arguments
    /// * `buffer` - The message bytes
    /// * `msg_type` - The message type
    /// * `field_offsets` - Field tag and value range pairs
    #[must_use]
    pub fn new(buffer: Bytes, msg_type: MsgType, field_offsets: Vec<(u32, Range<usize>)>) -> Self {
        Self {
            buffer,
            msg_type,
            field_offsets,
        }
    }

    /// Returns the message type.
    #[inline]
    #[must_use]
    pub fn msg_type(&self) -> &MsgType {
        &self.msg_type
    }

    /// Returns the message bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Gets a field value by tag.
    #[must_use]
    pub fn get_field(&self, tag: u32) -> Option<&[u8]> {
        self.field_offsets
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, range)| &self.buffer[range.clone()])
    }

    /// Gets a field value as a string.
    #[must_use]
    pub fn get_field_str(&self, tag: u32) -> Option<&str> {
        self.get_field(tag)
            .and_then(|b| std::str::from_utf8(b).ok())
    }
}

/// Standard header fields stamped on one outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgHeader {
    /// BeginString (tag 8).
    pub begin_string: String,
    /// MsgType (tag 35).
    pub msg_type: MsgType,
    /// SenderCompID (tag 49).
    pub sender_comp_id: CompId,
    /// TargetCompID (tag 56).
    pub target_comp_id: CompId,
    /// MsgSeqNum (tag 34).
    pub msg_seq_num: SeqNum,
    /// SendingTime (tag 52).
    pub sending_time: Timestamp,
    /// PossDupFlag (tag 43).
    pub poss_dup: bool,
    /// OrigSendingTime (tag 122), only set on replays.
    pub orig_sending_time: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_view(buffer: &[u8]) -> MsgView<'_> {
        // 8=FIX.4.4|35=5|34=7|49=ACC|56=INIT|43=Y|58=bye|
        let mut fields: SmallVec<[FieldRef<'_>; 32]> = SmallVec::new();
        let mut offset = 0;
        while offset < buffer.len() {
            let eq = offset + buffer[offset..].iter().position(|&b| b == b'=').unwrap();
            let end = eq + buffer[eq..].iter().position(|&b| b == 0x01).unwrap();
            let tag: u32 = std::str::from_utf8(&buffer[offset..eq])
                .unwrap()
                .parse()
                .unwrap();
            fields.push(FieldRef::new(tag, &buffer[eq + 1..end]));
            offset = end + 1;
        }
        MsgView::new(buffer, 2..9, MsgType::Logout, fields)
    }

    #[test]
    fn test_msg_type_from_str() {
        assert_eq!("0".parse::<MsgType>().unwrap(), MsgType::Heartbeat);
        assert_eq!("A".parse::<MsgType>().unwrap(), MsgType::Logon);
        assert_eq!("AE".parse::<MsgType>().unwrap(), MsgType::TradeCaptureReport);
        assert_eq!("8".parse::<MsgType>().unwrap(), MsgType::ExecutionReport);
    }

    #[test]
    fn test_msg_type_as_str() {
        assert_eq!(MsgType::Heartbeat.as_str(), "0");
        assert_eq!(MsgType::Logon.as_str(), "A");
        assert_eq!(MsgType::QuoteRequestReject.as_str(), "AG");
    }

    #[test]
    fn test_msg_type_is_admin() {
        assert!(MsgType::Heartbeat.is_admin());
        assert!(MsgType::Logon.is_admin());
        assert!(MsgType::Logout.is_admin());
        assert!(!MsgType::NewOrderSingle.is_admin());
        assert!(MsgType::Custom("UX".to_string()).is_app());
    }

    #[test]
    fn test_msg_type_custom() {
        let custom: MsgType = "XX".parse().unwrap();
        assert!(matches!(custom, MsgType::Custom(_)));
        assert_eq!(custom.as_str(), "XX");
    }

    #[test]
    fn test_view_session_accessors() {
        let buffer = b"8=FIX.4.4\x0135=5\x0134=7\x0149=ACC\x0156=INIT\x0143=Y\x0158=bye\x01";
        let view = sample_view(buffer);

        assert_eq!(view.begin_string(), "FIX.4.4");
        assert_eq!(view.seq_num(), Some(SeqNum::new(7)));
        assert_eq!(view.sender_comp_id(), Some("ACC"));
        assert_eq!(view.target_comp_id(), Some("INIT"));
        assert!(view.is_poss_dup());
        assert_eq!(view.get_field_str(tags::TEXT), Some("bye"));
        assert_eq!(view.get_field_as::<u64>(34).unwrap(), 7);
        assert!(view.get_field_as::<u64>(999).is_err());
    }

    #[test]
    fn test_owned_message_from_view() {
        let buffer = b"8=FIX.4.4\x0135=5\x0134=7\x0149=ACC\x0156=INIT\x0143=Y\x0158=bye\x01";
        let view = sample_view(buffer);
        let owned = view.to_owned();

        assert_eq!(owned.msg_type(), &MsgType::Logout);
        assert_eq!(owned.get_field_str(58), Some("bye"));
        assert_eq!(owned.get_field_str(999), None);
        assert_eq!(owned.as_bytes(), &buffer[..]);
    }
}
