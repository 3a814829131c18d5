use std::time::Duration;

use canvasnet_frame::FrameError;

/// Non-fatal protocol irregularities.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolAnomaly {
    /// A keepalive reply arrived with no probe outstanding.
    #[error("received pong, but no ping was sent")]
    UnexpectedPong,

    /// The ping timer fired again before the previous probe was answered.
    #[error("reply to previous ping not yet received ({outstanding} unanswered)")]
    PingUnanswered { outstanding: u32 },
}

/// Errors reported by the message queue through [`QueueEvent::Error`](crate::QueueEvent::Error).
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Reading from or writing to the transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// A complete frame arrived but could not be decoded. It was skipped.
    #[error("malformed frame ({length} bytes, kind {kind}): {source}")]
    MalformedFrame {
        length: usize,
        kind: u8,
        source: FrameError,
    },

    /// Keepalive bookkeeping found something unexpected.
    #[error("protocol anomaly: {0}")]
    Anomaly(#[from] ProtocolAnomaly),

    /// Nothing was received within the idle timeout; the transport was aborted.
    #[error("idle timeout: nothing received for {idle:?} (limit {timeout:?})")]
    IdleTimeout { idle: Duration, timeout: Duration },

    /// Too many consecutive probes went unanswered; the transport was aborted.
    #[error("peer left {unanswered} pings unanswered")]
    PingTimeout { unanswered: u32 },

    /// An outgoing message could not be serialized and was dropped.
    #[error("cannot encode message kind {kind}: {source}")]
    Encode { kind: u8, source: FrameError },
}

impl QueueError {
    /// Whether the error ended the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::IdleTimeout { .. } | Self::PingTimeout { .. }
        )
    }
}
