//! Wire codec (spec §4.A, §6).
//!
//! Two framings coexist on the same byte stream:
//!
//! - control framing: `magic[4] | length_be16[2] | type[1] | msgpack[length]`,
//!   used only during handshake and for in-band ping/pong/disconnect.
//! - record framing: `length_be16[2] | record[length]`, used for the data
//!   plane once the AEAD layer is installed.
//!
//! [`StreamBuffer`] accumulates unparsed bytes from the socket and extracts
//! complete items one at a time without copying more than necessary. Both
//! the client and server read loops follow the same shape: read bytes,
//! append, drain everything `extract_*` will give back.

use bytes::{Buf, BytesMut};

use crate::constants::{MAGIC, MAX_FRAME_SIZE};
use crate::error::{Error, Result};

/// Control-message type tag (spec §3). Values outside this set are
/// reserved; decoding an unrecognized byte is `UnknownMessageType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    AuthRequest,
    AuthSuccess,
    AuthFailure,
    Disconnect,
    Ping,
    Pong,
    Error,
}

impl MessageType {
    pub const fn tag(self) -> u8 {
        match self {
            MessageType::AuthRequest => 0x01,
            MessageType::AuthSuccess => 0x03,
            MessageType::AuthFailure => 0x04,
            MessageType::Disconnect => 0x22,
            MessageType::Ping => 0x30,
            MessageType::Pong => 0x31,
            MessageType::Error => 0xFF,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0x01 => MessageType::AuthRequest,
            0x03 => MessageType::AuthSuccess,
            0x04 => MessageType::AuthFailure,
            0x22 => MessageType::Disconnect,
            0x30 => MessageType::Ping,
            0x31 => MessageType::Pong,
            0xFF => MessageType::Error,
            _ => return None,
        })
    }
}

/// A decoded control message: its type tag and the still-encoded msgpack
/// payload bytes. Callers decode the payload into the typed struct they
/// expect via `vpn_core::control`.
#[derive(Debug, Clone)]
pub struct ControlMessage {
    pub message_type: MessageType,
    pub payload: Vec<u8>,
}

/// One item pulled off the stream by [`StreamBuffer::extract_next`]: either
/// framing is possible at any point once the session is established, since
/// ping/pong/disconnect control messages are sent in-band alongside data
/// records.
#[derive(Debug, Clone)]
pub enum StreamItem {
    Control(ControlMessage),
    Record(Vec<u8>),
}

/// Accumulates bytes read from the stream and hands back complete frames.
///
/// `extract_frame`/`extract_control_message` either return a complete item
/// and advance the buffer, or return `Ok(None)` to mean "need more bytes"
/// without mutating anything — the caller's job is to read more and retry.
#[derive(Debug, Default)]
pub struct StreamBuffer {
    buf: BytesMut,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Append freshly-read bytes to the tail of the buffer.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Extract one record-framed AEAD record: `length_be16 | record`.
    pub fn extract_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buf.len() < 2 {
            return Ok(None);
        }
        let len = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;
        if self.buf.len() < 2 + len {
            return Ok(None);
        }
        self.buf.advance(2);
        let record = self.buf.split_to(len);
        Ok(Some(record.to_vec()))
    }

    /// Extract one control message: `magic[4] | length_be16[2] | type[1] | payload`.
    pub fn extract_control_message(&mut self) -> Result<Option<ControlMessage>> {
        const HEADER_LEN: usize = 7;
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        if self.buf[0..4] != MAGIC {
            return Err(Error::InvalidMessage(format!(
                "bad magic: {:02x?}",
                &self.buf[0..4]
            )));
        }
        let payload_len = u16::from_be_bytes([self.buf[4], self.buf[5]]) as usize;
        let total_len = HEADER_LEN + payload_len;
        if total_len > MAX_FRAME_SIZE {
            return Err(Error::protocol(format!(
                "declared length {payload_len} exceeds max frame size"
            )));
        }
        if self.buf.len() < total_len {
            return Ok(None);
        }
        let type_byte = self.buf[6];
        let message_type = MessageType::from_tag(type_byte)
            .ok_or(Error::UnknownMessageType(type_byte))?;
        self.buf.advance(HEADER_LEN);
        let payload = self.buf.split_to(payload_len).to_vec();
        Ok(Some(ControlMessage {
            message_type,
            payload,
        }))
    }

    /// Extract the next item on the stream, whichever framing it turns out
    /// to use. Peeks the first 4 bytes for the control-message magic
    /// before committing to one parse path.
    pub fn extract_next(&mut self) -> Result<Option<StreamItem>> {
        if self.buf.len() < 4 {
            return Ok(None);
        }
        if self.buf[0..4] == MAGIC {
            Ok(self.extract_control_message()?.map(StreamItem::Control))
        } else {
            Ok(self.extract_frame()?.map(StreamItem::Record))
        }
    }
}

/// Frame a record-layer ciphertext for the wire: `length_be16 | record`.
pub fn frame_record(record: &[u8]) -> Result<Vec<u8>> {
    if record.len() > MAX_FRAME_SIZE {
        return Err(Error::protocol("record too large to frame"));
    }
    let mut out = Vec::with_capacity(2 + record.len());
    out.extend_from_slice(&(record.len() as u16).to_be_bytes());
    out.extend_from_slice(record);
    Ok(out)
}

/// Frame a control message for the wire: `magic | length_be16 | type | payload`.
pub fn frame_control_message(message_type: MessageType, payload: &[u8]) -> Result<Vec<u8>> {
    const HEADER_LEN: usize = 7;
    if HEADER_LEN + payload.len() > MAX_FRAME_SIZE {
        return Err(Error::protocol("control message too large to frame"));
    }
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.push(message_type.tag());
    out.extend_from_slice(payload);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_round_trip() {
        let mut sb = StreamBuffer::new();
        let framed = frame_record(b"hello").unwrap();
        sb.push(&framed);
        let out = sb.extract_frame().unwrap().unwrap();
        assert_eq!(out, b"hello");
        assert!(sb.is_empty());
    }

    #[test]
    fn record_needs_more_bytes() {
        let mut sb = StreamBuffer::new();
        let framed = frame_record(b"hello world").unwrap();
        sb.push(&framed[..framed.len() - 2]);
        assert!(sb.extract_frame().unwrap().is_none());
        sb.push(&framed[framed.len() - 2..]);
        assert_eq!(sb.extract_frame().unwrap().unwrap(), b"hello world");
    }

    #[test]
    fn framing_round_trip_with_trailing_partial() {
        let mut sb = StreamBuffer::new();
        let x = frame_record(b"X").unwrap();
        let y = frame_record(b"Y").unwrap();
        let z = frame_record(b"ZZZZZ").unwrap();
        sb.push(&x);
        sb.push(&y);
        sb.push(&z[..2]);
        assert_eq!(sb.extract_frame().unwrap().unwrap(), b"X");
        assert_eq!(sb.extract_frame().unwrap().unwrap(), b"Y");
        assert!(sb.extract_frame().unwrap().is_none());
    }

    #[test]
    fn control_message_round_trip() {
        let mut sb = StreamBuffer::new();
        let framed = frame_control_message(MessageType::Ping, b"{}").unwrap();
        sb.push(&framed);
        let msg = sb.extract_control_message().unwrap().unwrap();
        assert_eq!(msg.message_type, MessageType::Ping);
        assert_eq!(msg.payload, b"{}");
    }

    #[test]
    fn control_message_bad_magic() {
        let mut sb = StreamBuffer::new();
        sb.push(&[0u8, 0, 0, 0, 0, 0, 0]);
        assert!(sb.extract_control_message().is_err());
    }

    #[test]
    fn control_message_unknown_type() {
        let mut sb = StreamBuffer::new();
        let mut framed = frame_control_message(MessageType::Ping, b"").unwrap();
        let type_idx = 6;
        framed[type_idx] = 0x02; // not in the enum
        sb.push(&framed);
        assert!(matches!(
            sb.extract_control_message(),
            Err(Error::UnknownMessageType(0x02))
        ));
    }

    #[test]
    fn control_message_needs_more_bytes() {
        let mut sb = StreamBuffer::new();
        let framed = frame_control_message(MessageType::Disconnect, b"abcdef").unwrap();
        sb.push(&framed[..framed.len() - 1]);
        assert!(sb.extract_control_message().unwrap().is_none());
    }

    #[test]
    fn extract_next_distinguishes_control_from_record() {
        let mut sb = StreamBuffer::new();
        sb.push(&frame_control_message(MessageType::Ping, b"p").unwrap());
        sb.push(&frame_record(b"data").unwrap());

        match sb.extract_next().unwrap().unwrap() {
            StreamItem::Control(msg) => assert_eq!(msg.message_type, MessageType::Ping),
            StreamItem::Record(_) => panic!("expected control item first"),
        }
        match sb.extract_next().unwrap().unwrap() {
            StreamItem::Record(bytes) => assert_eq!(bytes, b"data"),
            StreamItem::Control(_) => panic!("expected record item second"),
        }
    }
}
