//! Networking core for collaborative drawing sessions.
//!
//! canvasnet turns a non-blocking byte stream into an ordered stream of
//! protocol messages: length-prefixed framing, single-frame-in-flight
//! sending with priority control traffic, keepalive round trips, idle
//! detection and a drain-then-close disconnect.
//!
//! # Crate Structure
//!
//! - [`transport`]: the non-blocking stream boundary and a TCP implementation
//! - [`frame`]: the wire codec and message model
//! - [`queue`]: the event-driven message queue engine

/// Re-export transport types.
pub mod transport {
    pub use canvasnet_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use canvasnet_frame::*;
}

/// Re-export message queue types.
pub mod queue {
    pub use canvasnet_queue::*;
}
