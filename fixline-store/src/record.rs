/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Stored message record.

use fixline_core::error::StoreError;
use fixline_core::message::{MsgType, MsgView, OwnedMessage};
use fixline_core::tags;
use fixline_core::types::{SeqNum, Timestamp};

/// Persisted copy of one received message.
///
/// Records are written once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixMsgStoreRecord {
    /// MsgSeqNum (tag 34) of the message.
    pub seq_num: SeqNum,
    /// MsgType (tag 35) of the message.
    pub msg_type: MsgType,
    /// SendingTime (tag 52), or the time of receipt when absent.
    pub timestamp: Timestamp,
    /// The raw message.
    pub message: OwnedMessage,
}

impl FixMsgStoreRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(seq_num: SeqNum, msg_type: MsgType, timestamp: Timestamp, message: OwnedMessage) -> Self {
        Self {
            seq_num,
            msg_type,
            timestamp,
            message,
        }
    }

    /// Copies a decoded message into a record.
    ///
    /// # Errors
    /// Returns `StoreError::StoreFailed` if the message has no MsgSeqNum.
    pub fn from_view(view: &MsgView<'_>) -> Result<Self, StoreError> {
        let seq_num = view.seq_num().ok_or_else(|| StoreError::StoreFailed {
            seq_num: 0,
            reason: "message has no MsgSeqNum".to_string(),
        })?;
        let timestamp = view
            .get_field_str(tags::SENDING_TIME)
            .and_then(Timestamp::parse_fix)
            .unwrap_or_else(Timestamp::now);

        Ok(Self {
            seq_num,
            msg_type: view.msg_type().clone(),
            timestamp,
            message: view.to_owned(),
        })
    }

    /// Returns the raw message bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.message.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixline_tagvalue::{Decoder, Encoder};

    #[test]
    fn test_record_from_view() {
        let mut encoder = Encoder::new("FIX.4.4");
        encoder.put_str(35, "D");
        encoder.put_str(49, "INIT");
        encoder.put_str(56, "ACC");
        encoder.put_uint(34, 4);
        encoder.put_str(52, "20260127-10:15:30.250");
        let bytes = encoder.finish();

        let view = Decoder::new(&bytes).decode().unwrap();
        let record = FixMsgStoreRecord::from_view(&view).unwrap();

        assert_eq!(record.seq_num.value(), 4);
        assert_eq!(record.msg_type, MsgType::NewOrderSingle);
        assert_eq!(record.timestamp.to_fix_string().as_str(), "20260127-10:15:30.250");
        assert_eq!(record.as_bytes(), &bytes[..]);
    }

    #[test]
    fn test_record_requires_seq_num() {
        let mut encoder = Encoder::new("FIX.4.4");
        encoder.put_str(35, "D");
        let bytes = encoder.finish();

        let view = Decoder::new(&bytes).decode().unwrap();
        assert!(FixMsgStoreRecord::from_view(&view).is_err());
    }
}
