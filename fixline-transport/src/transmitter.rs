/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Outbound message encoding.
//!
//! The transmitter stamps the standard header, allocates outbound sequence
//! numbers, encodes under the transport's sub protocol and hands the bytes to
//! the writer task.

use crate::config::{SubProtocol, TransportConfig};
use crate::fixml::encode_fixml;
use bytes::Bytes;
use fixline_core::error::{EncodeError, TransportError};
use fixline_core::field::{FieldMap, FieldValue};
use fixline_core::message::{MsgHeader, MsgType};
use fixline_core::tags;
use fixline_core::types::{CompId, SeqNum, Timestamp};
use fixline_tagvalue::Encoder;
use fixline_tagvalue::delimiter::to_log_text;
use tokio::sync::mpsc;
use tracing::debug;

/// Result of encoding one outbound message.
#[derive(Debug, Clone)]
pub struct Encoded {
    /// MsgType of the message.
    pub msg_type: MsgType,
    /// Log form of the message.
    pub text: String,
    /// Header stamped on the message.
    pub header: MsgHeader,
}

/// Replay stamping for a message sent again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Replay {
    /// MsgSeqNum to reuse.
    pub seq_num: SeqNum,
    /// SendingTime of the original, if known.
    pub orig_sending_time: Option<Timestamp>,
}

/// Encodes outbound messages for one transport.
#[derive(Debug)]
pub struct MsgTransmitter {
    protocol: SubProtocol,
    delimiter: u8,
    log_delimiter: u8,
    begin_string: String,
    sender_comp_id: CompId,
    target_comp_id: CompId,
    next_seq_num: SeqNum,
    tx: Option<mpsc::Sender<Bytes>>,
}

impl MsgTransmitter {
    /// Creates a transmitter that is not connected to a writer.
    ///
    /// # Errors
    /// Returns `TransportError::Config` if the configuration does not resolve.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let (protocol, delimiter) = config.resolve()?;
        Ok(Self {
            protocol,
            delimiter,
            log_delimiter: config.log_delimiter,
            begin_string: config.begin_string.clone(),
            sender_comp_id: config.sender_comp_id.clone(),
            target_comp_id: config.target_comp_id.clone(),
            next_seq_num: SeqNum::default(),
            tx: None,
        })
    }

    pub(crate) fn connect(&mut self, tx: mpsc::Sender<Bytes>) {
        self.tx = Some(tx);
    }

    pub(crate) fn disconnect(&mut self) {
        self.tx = None;
    }

    /// Returns the sequence number the next message will carry.
    #[must_use]
    pub const fn next_seq_num(&self) -> SeqNum {
        self.next_seq_num
    }

    /// Sets the sequence number the next message will carry.
    pub fn set_next_seq_num(&mut self, seq: SeqNum) {
        self.next_seq_num = seq;
    }

    /// Updates the TargetCompID, e.g. once the peer's identity is known.
    pub fn set_target_comp_id(&mut self, comp_id: CompId) {
        self.target_comp_id = comp_id;
    }

    /// Encodes one message without sending it.
    ///
    /// A fresh message takes the next sequence number; a replay reuses the
    /// given one and is flagged PossDup.
    ///
    /// # Arguments
    /// * `msg_type` - The message type
    /// * `body` - Body fields; header tags in it are ignored
    /// * `replay` - Replay stamping, if this is a resend
    ///
    /// # Errors
    /// Returns `EncodeError` if a value contains the wire delimiter.
    pub fn encode(
        &mut self,
        msg_type: &MsgType,
        body: &FieldMap,
        replay: Option<Replay>,
    ) -> Result<(Bytes, Encoded), EncodeError> {
        let seq_num = replay.map_or(self.next_seq_num, |r| r.seq_num);
        let header = MsgHeader {
            begin_string: self.begin_string.clone(),
            msg_type: msg_type.clone(),
            sender_comp_id: self.sender_comp_id.clone(),
            target_comp_id: self.target_comp_id.clone(),
            msg_seq_num: seq_num,
            sending_time: Timestamp::now(),
            poss_dup: replay.is_some(),
            orig_sending_time: replay.and_then(|r| r.orig_sending_time),
        };

        let mut fields: Vec<(u32, FieldValue)> = Vec::with_capacity(body.len() + 8);
        fields.push((tags::SENDER_COMP_ID, header.sender_comp_id.as_str().into()));
        fields.push((tags::TARGET_COMP_ID, header.target_comp_id.as_str().into()));
        fields.push((tags::MSG_SEQ_NUM, FieldValue::UInt(seq_num.value())));
        fields.push((
            tags::SENDING_TIME,
            header.sending_time.to_fix_string().as_str().into(),
        ));
        if header.poss_dup {
            fields.push((tags::POSS_DUP_FLAG, FieldValue::Bool(true)));
            let orig = header.orig_sending_time.unwrap_or(header.sending_time);
            fields.push((tags::ORIG_SENDING_TIME, orig.to_fix_string().as_str().into()));
        }
        for (tag, value) in body.iter() {
            if tags::HEADER_TAGS.contains(tag) || *tag == tags::CHECK_SUM {
                debug!(tag, "ignoring header tag in message body");
                continue;
            }
            fields.push((*tag, value.clone()));
        }

        let (bytes, text) = match self.protocol {
            SubProtocol::Ascii => {
                let mut encoder =
                    Encoder::new(self.begin_string.as_str()).with_delimiter(self.delimiter);
                encoder.put_str(tags::MSG_TYPE, msg_type.as_str());
                for (tag, value) in &fields {
                    encoder.put_value(*tag, value)?;
                }
                let bytes = encoder.finish().freeze();
                let text = to_log_text(&bytes, self.delimiter, self.log_delimiter);
                (bytes, text)
            }
            SubProtocol::Fixml => {
                let xml = encode_fixml(msg_type.as_str(), &fields);
                (Bytes::from(xml.clone()), xml)
            }
        };

        if replay.is_none() {
            self.next_seq_num = seq_num.next();
        }

        Ok((
            bytes,
            Encoded {
                msg_type: msg_type.clone(),
                text,
                header,
            },
        ))
    }

    /// Encodes a message and queues it for the writer.
    ///
    /// # Errors
    /// Returns `TransportError::Encode` if encoding fails and
    /// `TransportError::Closed` if the writer is gone.
    pub async fn send(
        &mut self,
        msg_type: &MsgType,
        body: &FieldMap,
        replay: Option<Replay>,
    ) -> Result<Encoded, TransportError> {
        let tx = self.tx.clone().ok_or(TransportError::Closed)?;
        let (bytes, encoded) = self.encode(msg_type, body, replay)?;
        tx.send(bytes).await.map_err(|_| TransportError::Closed)?;
        Ok(encoded)
    }
}
