/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! FIXML element framing.
//!
//! Each message travels as one element:
//!
//! ```text
//! <FIXML><Msg t="D"><F t="49">INIT</F><F t="55">EUR/USD</F></Msg></FIXML>
//! ```
//!
//! Inbound documents are rebuilt into a canonical SOH-delimited tag=value
//! buffer so the session works with the same [`MsgView`] for both framings.
//!
//! [`MsgView`]: fixline_core::message::MsgView

use crate::codec::ReceivedMsg;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use fixline_core::error::{DecodeError, TransportError};
use fixline_core::field::FieldValue;
use fixline_tagvalue::Encoder as TagValueEncoder;
use fixline_tagvalue::delimiter::SOH;
use memchr::memmem;
use tokio_util::codec::{Decoder, Encoder};

const OPEN: &[u8] = b"<FIXML>";
const CLOSE: &[u8] = b"</FIXML>";

/// Renders a message as a FIXML element.
///
/// # Arguments
/// * `msg_type` - MsgType value for the `t` attribute
/// * `fields` - Header and body fields in order
#[must_use]
pub fn encode_fixml<'a, I>(msg_type: &str, fields: I) -> String
where
    I: IntoIterator<Item = &'a (u32, FieldValue)>,
{
    let mut out = String::with_capacity(256);
    out.push_str("<FIXML><Msg t=\"");
    escape_into(msg_type, &mut out);
    out.push_str("\">");
    for (tag, value) in fields {
        out.push_str("<F t=\"");
        out.push_str(itoa::Buffer::new().format(*tag));
        out.push_str("\">");
        escape_into(&value.to_string(), &mut out);
        out.push_str("</F>");
    }
    out.push_str("</Msg></FIXML>");
    out
}

fn escape_into(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

fn unescape(text: &str) -> Result<String, DecodeError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let end = rest
            .find(';')
            .ok_or_else(|| DecodeError::InvalidFixml("unterminated entity".to_string()))?;
        out.push(match &rest[..=end] {
            "&amp;" => '&',
            "&lt;" => '<',
            "&gt;" => '>',
            "&quot;" => '"',
            "&apos;" => '\'',
            other => {
                return Err(DecodeError::InvalidFixml(format!("unknown entity {other}")));
            }
        });
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Cursor over one FIXML document.
struct Cursor<'a> {
    text: &'a str,
}

impl<'a> Cursor<'a> {
    fn skip_ws(&mut self) {
        self.text = self.text.trim_start();
    }

    fn expect(&mut self, token: &str) -> Result<(), DecodeError> {
        self.skip_ws();
        self.text = self
            .text
            .strip_prefix(token)
            .ok_or_else(|| DecodeError::InvalidFixml(format!("expected {token}")))?;
        Ok(())
    }

    fn peek(&mut self, token: &str) -> bool {
        self.skip_ws();
        self.text.starts_with(token)
    }

    fn until(&mut self, stop: char) -> Result<&'a str, DecodeError> {
        let pos = self
            .text
            .find(stop)
            .ok_or_else(|| DecodeError::InvalidFixml(format!("missing {stop}")))?;
        let (head, tail) = self.text.split_at(pos);
        self.text = tail;
        Ok(head)
    }
}

/// Parses one FIXML document into its MsgType and fields.
fn parse_document(doc: &str) -> Result<(String, Vec<(u32, String)>), DecodeError> {
    let mut cursor = Cursor { text: doc };
    cursor.expect("<FIXML>")?;
    cursor.expect("<Msg t=\"")?;
    let msg_type = unescape(cursor.until('"')?)?;
    cursor.expect("\">")?;

    let mut fields = Vec::new();
    while !cursor.peek("</Msg>") {
        cursor.expect("<F t=\"")?;
        let tag_text = cursor.until('"')?;
        let tag: u32 = tag_text
            .parse()
            .map_err(|_| DecodeError::InvalidTag(tag_text.to_string()))?;
        cursor.expect("\">")?;
        let value = unescape(cursor.until('<')?)?;
        cursor.expect("</F>")?;
        fields.push((tag, value));
    }
    cursor.expect("</Msg>")?;
    cursor.expect("</FIXML>")?;

    if msg_type.is_empty() {
        return Err(DecodeError::MissingMsgType);
    }
    Ok((msg_type, fields))
}

/// Tokio codec for FIXML framing.
#[derive(Debug, Clone)]
pub struct FixmlCodec {
    begin_string: String,
    max_message_size: usize,
}

impl FixmlCodec {
    /// Creates a codec that rebuilds inbound messages under `begin_string`.
    #[must_use]
    pub fn new(begin_string: impl Into<String>, max_message_size: usize) -> Self {
        Self {
            begin_string: begin_string.into(),
            max_message_size,
        }
    }

    fn canonical(&self, msg_type: &str, fields: &[(u32, String)]) -> Result<Bytes, DecodeError> {
        let mut encoder = TagValueEncoder::new(self.begin_string.as_str());
        encoder.put_str(fixline_core::tags::MSG_TYPE, msg_type);
        for (tag, value) in fields {
            encoder
                .put_value(*tag, &FieldValue::String(value.clone()))
                .map_err(|e| DecodeError::InvalidFixml(e.to_string()))?;
        }
        Ok(encoder.finish().freeze())
    }
}

impl Decoder for FixmlCodec {
    type Item = ReceivedMsg;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let start = src
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(src.len());
        src.advance(start);
        if src.is_empty() {
            return Ok(None);
        }

        let prefix = src.len().min(OPEN.len());
        if src[..prefix] != OPEN[..prefix] {
            return Err(DecodeError::InvalidFixml("expected <FIXML>".to_string()).into());
        }

        let Some(close) = memmem::find(&src[..], CLOSE) else {
            if src.len() > self.max_message_size {
                return Err(DecodeError::MessageTooLarge {
                    size: src.len(),
                    max_size: self.max_message_size,
                }
                .into());
            }
            return Ok(None);
        };

        let frame = src.split_to(close + CLOSE.len());
        let text = std::str::from_utf8(&frame).map_err(DecodeError::from)?;
        let (msg_type, fields) = parse_document(text)?;
        let buffer = self.canonical(&msg_type, &fields)?;

        Ok(Some(ReceivedMsg::new(
            msg_type.parse().unwrap_or_default(),
            buffer,
            SOH,
            frame.len(),
            text.to_string(),
        )))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(msg) => Ok(Some(msg)),
            None if buf.iter().all(u8::is_ascii_whitespace) => Ok(None),
            None => Err(DecodeError::Incomplete.into()),
        }
    }
}

impl Encoder<Bytes> for FixmlCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(item.len());
        dst.put_slice(&item);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixline_core::message::MsgType;
    use fixline_core::tags;

    fn codec() -> FixmlCodec {
        FixmlCodec::new("FIX.4.4", 4096)
    }

    #[test]
    fn test_encode_escapes_values() {
        let fields = vec![
            (tags::SENDER_COMP_ID, FieldValue::from("INIT")),
            (tags::TEXT, FieldValue::from("a<b & \"c\"")),
        ];
        let xml = encode_fixml("5", &fields);
        assert_eq!(
            xml,
            "<FIXML><Msg t=\"5\"><F t=\"49\">INIT</F><F t=\"58\">a&lt;b &amp; &quot;c&quot;</F></Msg></FIXML>"
        );
    }

    #[test]
    fn test_decode_rebuilds_tag_value() {
        let fields = vec![
            (tags::SENDER_COMP_ID, FieldValue::from("INIT")),
            (tags::MSG_SEQ_NUM, FieldValue::UInt(3)),
            (tags::TEXT, FieldValue::from("x > y")),
        ];
        let xml = encode_fixml("5", &fields);
        let mut buf = BytesMut::from(xml.as_bytes());

        let msg = codec().decode(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        assert_eq!(msg.msg_type(), &MsgType::Logout);
        assert_eq!(msg.wire_len(), xml.len());
        assert_eq!(msg.text(), xml);

        let view = msg.view().unwrap();
        assert_eq!(view.sender_comp_id(), Some("INIT"));
        assert_eq!(view.seq_num().map(|s| s.value()), Some(3));
        assert_eq!(view.get_field_str(tags::TEXT), Some("x > y"));
    }

    #[test]
    fn test_decode_waits_for_close() {
        let mut buf = BytesMut::from(&b"<FIXML><Msg t=\"0\">"[..]);
        assert!(codec().decode(&mut buf).unwrap().is_none());
        assert!(codec().decode_eof(&mut buf).is_err());
    }

    #[test]
    fn test_decode_two_documents() {
        let one = encode_fixml("0", &[]);
        let mut buf = BytesMut::from(format!("{one}\n{one}").as_bytes());
        let mut codec = codec();
        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(codec.decode_eof(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut buf = BytesMut::from(&b"8=FIX.4.4\x01"[..]);
        assert!(codec().decode(&mut buf).is_err());

        let mut buf = BytesMut::from(&b"<FIXML><Msg t=\"0\"><F t=\"x\">1</F></Msg></FIXML>"[..]);
        assert!(codec().decode(&mut buf).is_err());
    }

    #[test]
    fn test_unescape_unknown_entity() {
        assert!(unescape("&nbsp;").is_err());
        assert_eq!(unescape("&lt;&gt;").unwrap(), "<>");
    }
}
