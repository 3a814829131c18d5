//! Event-driven message queue over a non-blocking transport.
//!
//! [`MessageQueue`] owns one [`Transport`](canvasnet_transport::Transport)
//! and turns its byte stream into a FIFO of complete messages, and an
//! outbound FIFO of messages back into bytes. It owns no thread or event
//! loop: the host calls the trigger methods when the transport is readable,
//! when written bytes are confirmed, and when a timer is due, then drains
//! [`QueueEvent`]s.

pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod event;
pub mod lag;
pub mod queue;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{QueueConfig, DEFAULT_IDLE_CHECK_INTERVAL};
pub use error::{ProtocolAnomaly, QueueError};
pub use event::QueueEvent;
pub use lag::{FixedLag, NoLag, RandomLag, WriteLag};
pub use queue::{MessageQueue, QueueState};
