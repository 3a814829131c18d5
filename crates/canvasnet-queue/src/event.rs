use std::time::Duration;

use crate::error::QueueError;

/// Notifications for the component that owns a [`MessageQueue`](crate::MessageQueue).
#[derive(Debug)]
pub enum QueueEvent {
    /// One or more messages were added to the inbound queue.
    MessageAvailable,
    /// Bytes read from the transport during one readable notification.
    BytesReceived(usize),
    /// Bytes the transport confirmed as written.
    BytesSent(usize),
    /// The send buffer and outbound queue are empty and the transport has
    /// nothing left to flush.
    AllSent,
    /// The peer announced how many more bytes a pending operation needs.
    ExpectingBytes(u32),
    /// A keepalive round trip completed.
    PingPong(Duration),
    /// Something went wrong; see [`QueueError::is_fatal`].
    Error(QueueError),
    /// The queue reached its terminal state.
    Closed,
}
