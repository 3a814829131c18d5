//! Handling of the protocol-level control messages.
//!
//! Keepalive probes and replies and flow-control advisories are consumed by
//! the queue itself. Disconnect notices are delivered like any other
//! message; only sending one changes queue behaviour.

use std::time::{Duration, Instant};

use canvasnet_frame::{Message, MessageBody, MessagePtr};

/// What the queue does with a decoded inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inbound {
    /// Keepalive probe; answer with a pong ahead of everything else.
    Probe,
    /// Keepalive reply; completes a round-trip measurement.
    Pong,
    /// Flow-control advisory.
    Expecting(u32),
    /// Anything else goes to the inbound queue.
    Deliver,
}

pub fn classify(msg: &Message) -> Inbound {
    match msg.body() {
        MessageBody::Ping { pong: false } => Inbound::Probe,
        MessageBody::Ping { pong: true } => Inbound::Pong,
        MessageBody::StreamPos { bytes } => Inbound::Expecting(*bytes),
        _ => Inbound::Deliver,
    }
}

/// A keepalive probe from the server context.
pub fn probe() -> MessagePtr {
    Message::ping(0, false).into_ptr()
}

/// A keepalive reply from the server context.
pub fn pong() -> MessagePtr {
    Message::ping(0, true).into_ptr()
}

/// Round-trip bookkeeping for keepalive probes.
///
/// Only the first unanswered probe is timed. Probes sent while it is still
/// outstanding are counted, and the count is cleared by the next reply.
#[derive(Debug, Default, Clone)]
pub struct PingTracker {
    sent_at: Option<Instant>,
    unanswered: u32,
}

impl PingTracker {
    /// Record a probe going out.
    ///
    /// Returns the number of earlier probes still unanswered, or `None` if
    /// nothing was outstanding.
    pub fn probe_sent(&mut self, now: Instant) -> Option<u32> {
        match self.sent_at {
            None => {
                self.sent_at = Some(now);
                None
            }
            Some(_) => {
                self.unanswered += 1;
                Some(self.unanswered)
            }
        }
    }

    /// Record a reply arriving. Returns the round trip, or `None` if no
    /// probe was outstanding.
    pub fn pong_received(&mut self, now: Instant) -> Option<Duration> {
        let sent_at = self.sent_at.take()?;
        self.unanswered = 0;
        Some(now.saturating_duration_since(sent_at))
    }

    pub fn reset(&mut self) {
        self.sent_at = None;
        self.unanswered = 0;
    }
}

#[cfg(test)]
mod tests {
    use canvasnet_frame::DisconnectReason;

    use super::*;

    #[test]
    fn classifies_control_messages() {
        assert_eq!(classify(&Message::ping(3, false)), Inbound::Probe);
        assert_eq!(classify(&Message::ping(0, true)), Inbound::Pong);
        assert_eq!(
            classify(&Message::stream_pos(0, 4096)),
            Inbound::Expecting(4096)
        );
    }

    #[test]
    fn received_disconnect_is_delivered() {
        let notice = Message::disconnect(0, DisconnectReason::Kick, "bye");
        assert_eq!(classify(&notice), Inbound::Deliver);
        assert_eq!(classify(&Message::command(1, "hi")), Inbound::Deliver);
    }

    #[test]
    fn tracker_measures_first_probe() {
        let start = Instant::now();
        let mut tracker = PingTracker::default();

        assert_eq!(tracker.probe_sent(start), None);
        assert_eq!(
            tracker.probe_sent(start + Duration::from_secs(1)),
            Some(1)
        );
        let rtt = tracker
            .pong_received(start + Duration::from_millis(1200))
            .unwrap();
        assert_eq!(rtt, Duration::from_millis(1200));
        assert_eq!(tracker.pong_received(start + Duration::from_secs(2)), None);
    }

    #[test]
    fn pong_without_probe_is_unexpected() {
        let mut tracker = PingTracker::default();
        assert_eq!(tracker.pong_received(Instant::now()), None);
    }

    #[test]
    fn reply_clears_unanswered_count() {
        let now = Instant::now();
        let mut tracker = PingTracker::default();
        tracker.probe_sent(now);
        tracker.probe_sent(now);
        tracker.pong_received(now);

        assert_eq!(tracker.probe_sent(now), None);
        assert_eq!(tracker.probe_sent(now), Some(1));
    }
}
