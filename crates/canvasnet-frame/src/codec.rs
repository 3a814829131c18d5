use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::kind::{self, COMMAND, DISCONNECT, PING, STREAM_POS};
use crate::message::{DisconnectReason, Message, MessageBody};

/// Frame header: length (4) + kind (1) + context id (1) = 6 bytes.
pub const HEADER_LEN: usize = 6;

/// Maximum payload carried by a single frame: 64 KiB.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;

/// Largest frame on the wire. Receive and send buffers are sized to this.
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN;

const LENGTH_FIELD_LEN: usize = 4;

/// Total frame length declared by a header.
///
/// Only the 4-byte length field needs to be present. Returns `None` when
/// fewer bytes are available. The value is not validated here.
pub fn sniff_length(header: &[u8]) -> Option<usize> {
    let field: [u8; LENGTH_FIELD_LEN] = header.get(..LENGTH_FIELD_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(field) as usize)
}

/// Kind tag of a header, if it is long enough to carry one.
pub fn frame_kind(header: &[u8]) -> Option<u8> {
    header.get(4).copied()
}

/// Whether a declared length can belong to a well-formed frame.
pub fn is_valid_length(length: usize) -> bool {
    (HEADER_LEN..=MAX_FRAME_LEN).contains(&length)
}

/// Encode a message into `out`, starting at offset 0.
///
/// Wire format:
/// ```text
/// ┌────────────────┬──────────┬────────────┬──────────────────┐
/// │ Length (4B BE) │ Kind (1B)│ Context(1B)│ Payload          │
/// │ header+payload │          │            │ (Length-6 bytes) │
/// └────────────────┴──────────┴────────────┴──────────────────┘
/// ```
///
/// Returns the number of bytes written.
pub fn serialize(msg: &Message, out: &mut [u8]) -> Result<usize> {
    let payload_len = msg.payload_len();
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD_LEN,
        });
    }
    let total = HEADER_LEN + payload_len;
    if out.len() < total {
        return Err(FrameError::BufferTooSmall {
            needed: total,
            capacity: out.len(),
        });
    }

    let mut dst = &mut out[..total];
    dst.put_u32(total as u32);
    dst.put_u8(msg.kind());
    dst.put_u8(msg.context_id());
    put_payload(msg.body(), &mut dst);
    Ok(total)
}

fn put_payload<B: BufMut>(body: &MessageBody, dst: &mut B) {
    match body {
        MessageBody::Command(text) => dst.put_slice(text.as_bytes()),
        MessageBody::Ping { pong } => dst.put_u8(u8::from(*pong)),
        MessageBody::Disconnect { reason, message } => {
            dst.put_u8(reason.as_u8());
            dst.put_slice(message.as_bytes());
        }
        MessageBody::StreamPos { bytes } => dst.put_u32(*bytes),
        MessageBody::Opaque { payload, .. } => dst.put_slice(payload),
    }
}

/// Decode the first frame in `buf`.
///
/// `buf` must hold the whole frame; trailing bytes are ignored. A frame
/// that fails to decode still occupies `sniff_length(buf)` bytes, so the
/// caller can skip it and stay synchronized.
pub fn deserialize(buf: &[u8]) -> Result<Message> {
    if buf.len() < HEADER_LEN {
        return Err(FrameError::Truncated {
            needed: HEADER_LEN,
            available: buf.len(),
        });
    }
    let length = sniff_length(buf).unwrap_or(0);
    if !is_valid_length(length) {
        return Err(FrameError::InvalidLength { length });
    }
    if buf.len() < length {
        return Err(FrameError::Truncated {
            needed: length,
            available: buf.len(),
        });
    }

    let kind = buf[4];
    let context_id = buf[5];
    let payload = &buf[HEADER_LEN..length];
    let body = decode_body(kind, payload)?;
    Ok(Message::new(context_id, body))
}

fn decode_body(kind: u8, payload: &[u8]) -> Result<MessageBody> {
    let invalid = |reason| FrameError::InvalidPayload { kind, reason };
    match kind {
        COMMAND => std::str::from_utf8(payload)
            .map(|text| MessageBody::Command(text.to_owned()))
            .map_err(|_| invalid("command text is not valid UTF-8")),
        PING => match payload {
            [0] => Ok(MessageBody::Ping { pong: false }),
            [1] => Ok(MessageBody::Ping { pong: true }),
            _ => Err(invalid("ping payload must be a single 0/1 byte")),
        },
        DISCONNECT => {
            let (&code, text) = payload
                .split_first()
                .ok_or_else(|| invalid("missing disconnect reason"))?;
            let reason =
                DisconnectReason::from_u8(code).ok_or_else(|| invalid("unknown disconnect reason"))?;
            let message = std::str::from_utf8(text)
                .map_err(|_| invalid("disconnect text is not valid UTF-8"))?
                .to_owned();
            Ok(MessageBody::Disconnect { reason, message })
        }
        STREAM_POS => {
            let field: [u8; 4] = payload
                .try_into()
                .map_err(|_| invalid("stream position must be 4 bytes"))?;
            Ok(MessageBody::StreamPos {
                bytes: u32::from_be_bytes(field),
            })
        }
        k if kind::is_opaque(k) => Ok(MessageBody::Opaque {
            kind: k,
            payload: Bytes::copy_from_slice(payload),
        }),
        other => Err(FrameError::UnknownKind(other)),
    }
}

/// Append the encoding of `msg` to a growable buffer.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) -> Result<()> {
    let payload_len = msg.payload_len();
    if payload_len > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: MAX_PAYLOAD_LEN,
        });
    }
    let total = HEADER_LEN + payload_len;
    dst.reserve(total);
    dst.put_u32(total as u32);
    dst.put_u8(msg.kind());
    dst.put_u8(msg.context_id());
    put_payload(msg.body(), dst);
    Ok(())
}

/// Decode one message from the front of a growable buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// A complete frame is always consumed, even when its payload fails to
/// decode. An invalid declared length is returned without consuming
/// anything, since the frame boundary is unknown.
pub fn decode_message(src: &mut BytesMut) -> Result<Option<Message>> {
    let Some(length) = sniff_length(&src[..]) else {
        return Ok(None);
    };
    if !is_valid_length(length) {
        return Err(FrameError::InvalidLength { length });
    }
    if src.len() < length {
        src.reserve(length - src.len());
        return Ok(None);
    }

    let result = deserialize(&src[..length]);
    src.advance(length);
    result.map(Some)
}
