//! Message framing for the canvasnet wire protocol.
//!
//! Every message travels as one frame:
//! - a 4-byte big-endian total length (header + payload)
//! - a 1-byte message kind
//! - a 1-byte context id (originating participant, 0 = server)
//! - a kind-specific payload
//!
//! [`sniff_length`] needs only the first four bytes, so a receiver can tell
//! how much more to wait for before the payload has arrived.

pub mod codec;
pub mod error;
pub mod kind;
pub mod message;

#[cfg(feature = "async")]
pub mod async_codec;

pub use codec::{
    decode_message, deserialize, encode_message, frame_kind, is_valid_length, serialize,
    sniff_length, HEADER_LEN, MAX_FRAME_LEN, MAX_PAYLOAD_LEN,
};
pub use error::{FrameError, Result};
pub use kind::{COMMAND, DISCONNECT, OPAQUE_START, PING, STREAM_POS};
pub use message::{DisconnectReason, Message, MessageBody, MessagePtr};

#[cfg(feature = "async")]
pub use async_codec::MessageCodec;
