use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::codec::HEADER_LEN;
use crate::error::{FrameError, Result};
use crate::kind::{self, COMMAND, DISCONNECT, PING, STREAM_POS};

/// Shared handle to an immutable message.
pub type MessagePtr = Arc<Message>;

/// Why a peer is being disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisconnectReason {
    /// A protocol or server error.
    Error,
    /// Removed by an operator.
    Kick,
    /// The server or session is shutting down.
    Shutdown,
    /// Anything else; see the message text.
    Other,
}

impl DisconnectReason {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Error => 0,
            Self::Kick => 1,
            Self::Shutdown => 2,
            Self::Other => 3,
        }
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Error),
            1 => Some(Self::Kick),
            2 => Some(Self::Shutdown),
            3 => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "error",
            Self::Kick => "kick",
            Self::Shutdown => "shutdown",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Kind-specific message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    /// Server command or login line.
    Command(String),
    /// Keepalive probe (`pong == false`) or reply.
    Ping { pong: bool },
    /// Disconnect notice.
    Disconnect {
        reason: DisconnectReason,
        message: String,
    },
    /// Number of bytes still expected for an operation in progress.
    StreamPos { bytes: u32 },
    /// Application payload the transport does not interpret.
    Opaque { kind: u8, payload: Bytes },
}

/// One protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    context_id: u8,
    body: MessageBody,
}

impl Message {
    pub fn new(context_id: u8, body: MessageBody) -> Self {
        Self { context_id, body }
    }

    pub fn command(context_id: u8, text: impl Into<String>) -> Self {
        Self::new(context_id, MessageBody::Command(text.into()))
    }

    pub fn ping(context_id: u8, pong: bool) -> Self {
        Self::new(context_id, MessageBody::Ping { pong })
    }

    pub fn disconnect(context_id: u8, reason: DisconnectReason, message: impl Into<String>) -> Self {
        Self::new(
            context_id,
            MessageBody::Disconnect {
                reason,
                message: message.into(),
            },
        )
    }

    pub fn stream_pos(context_id: u8, bytes: u32) -> Self {
        Self::new(context_id, MessageBody::StreamPos { bytes })
    }

    /// Create an opaque application message.
    ///
    /// Fails with [`FrameError::UnknownKind`] if `kind` is not in the opaque
    /// range, since the receiver would decode it as something else.
    pub fn opaque(kind: u8, context_id: u8, payload: impl Into<Bytes>) -> Result<Self> {
        if !kind::is_opaque(kind) {
            return Err(FrameError::UnknownKind(kind));
        }
        Ok(Self::new(
            context_id,
            MessageBody::Opaque {
                kind,
                payload: payload.into(),
            },
        ))
    }

    /// The kind tag written in the frame header.
    pub fn kind(&self) -> u8 {
        match &self.body {
            MessageBody::Command(_) => COMMAND,
            MessageBody::Ping { .. } => PING,
            MessageBody::Disconnect { .. } => DISCONNECT,
            MessageBody::StreamPos { .. } => STREAM_POS,
            MessageBody::Opaque { kind, .. } => *kind,
        }
    }

    pub fn context_id(&self) -> u8 {
        self.context_id
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Encoded payload size in bytes.
    pub fn payload_len(&self) -> usize {
        match &self.body {
            MessageBody::Command(text) => text.len(),
            MessageBody::Ping { .. } => 1,
            MessageBody::Disconnect { message, .. } => 1 + message.len(),
            MessageBody::StreamPos { .. } => 4,
            MessageBody::Opaque { payload, .. } => payload.len(),
        }
    }

    /// Total encoded size, header included.
    pub fn length(&self) -> usize {
        HEADER_LEN + self.payload_len()
    }

    pub fn is_control(&self) -> bool {
        kind::is_control(self.kind())
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self.body, MessageBody::Disconnect { .. })
    }

    /// Wrap in a shared handle for queueing.
    pub fn into_ptr(self) -> MessagePtr {
        Arc::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lengths_include_header() {
        assert_eq!(Message::ping(0, false).length(), HEADER_LEN + 1);
        assert_eq!(Message::stream_pos(0, 9).length(), HEADER_LEN + 4);
        assert_eq!(Message::command(3, "hello").length(), HEADER_LEN + 5);
        assert_eq!(
            Message::disconnect(0, DisconnectReason::Kick, "bye").length(),
            HEADER_LEN + 4
        );
    }

    #[test]
    fn opaque_rejects_protocol_kinds() {
        let err = Message::opaque(PING, 1, Bytes::from_static(b"x")).unwrap_err();
        assert!(matches!(err, FrameError::UnknownKind(PING)));

        let err = Message::opaque(12, 1, Bytes::new()).unwrap_err();
        assert!(matches!(err, FrameError::UnknownKind(12)));

        let msg = Message::opaque(64, 7, Bytes::from_static(b"stroke")).unwrap();
        assert_eq!(msg.kind(), 64);
        assert_eq!(msg.context_id(), 7);
        assert!(!msg.is_control());
    }

    #[test]
    fn disconnect_reason_codes_are_stable() {
        for reason in [
            DisconnectReason::Error,
            DisconnectReason::Kick,
            DisconnectReason::Shutdown,
            DisconnectReason::Other,
        ] {
            assert_eq!(DisconnectReason::from_u8(reason.as_u8()), Some(reason));
        }
        assert_eq!(DisconnectReason::from_u8(4), None);
        assert_eq!(DisconnectReason::Shutdown.to_string(), "shutdown");
    }

    #[test]
    fn kind_follows_body() {
        assert_eq!(Message::command(0, "").kind(), COMMAND);
        assert!(Message::disconnect(0, DisconnectReason::Other, "").is_disconnect());
        assert!(Message::ping(0, true).is_control());
    }
}
