//! Host poll loop shared by `serve` and `send`.

use std::thread;
use std::time::{Duration, Instant};

use canvasnet_queue::{MessageQueue, QueueError, QueueEvent, QueueState};
use canvasnet_transport::{TcpTransport, Transport, WriteSource};
use tracing::{debug, warn};

pub type TcpQueue = MessageQueue<TcpTransport>;

/// Upper bound on one sleep between polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// One pass over every trigger: read, flush, timers.
pub fn turn(queue: &mut TcpQueue) {
    queue.on_readable();
    match queue.transport_mut().flush() {
        Ok(0) => {}
        Ok(n) => queue.on_bytes_written(WriteSource::Plain, n),
        // The transport marks itself closed; the next read reports it.
        Err(err) => warn!(error = %err, "flush failed"),
    }
    queue.on_timer_tick();
}

/// Sleep until the next timer deadline or one poll interval, whichever is
/// sooner.
pub fn pause(queue: &TcpQueue) {
    let wait = queue
        .next_timer_deadline()
        .map(|due| due.saturating_duration_since(Instant::now()))
        .map_or(POLL_INTERVAL, |until| until.min(POLL_INTERVAL));
    if !wait.is_zero() {
        thread::sleep(wait);
    }
}

/// Outcome of draining the event queue.
#[derive(Debug, Default)]
pub struct Drained {
    pub closed: bool,
    pub fatal: Option<QueueError>,
}

/// Log every pending event and keep the first fatal error.
pub fn drain_events(queue: &mut TcpQueue, drained: &mut Drained) {
    while let Some(event) = queue.poll_event() {
        match event {
            QueueEvent::Error(err) if err.is_fatal() => {
                warn!(error = %err, "connection failed");
                drained.fatal.get_or_insert(err);
            }
            QueueEvent::Error(err) => warn!(error = %err, "protocol anomaly"),
            QueueEvent::PingPong(rtt) => debug!(?rtt, "ping round trip"),
            QueueEvent::ExpectingBytes(bytes) => debug!(bytes, "peer expects more data"),
            QueueEvent::Closed => drained.closed = true,
            other => debug!(event = ?other, "queue event"),
        }
    }
}

/// Keep flushing after the queue closed so a queued disconnect notice
/// reaches the peer, giving up after `limit`.
pub fn finish(queue: &mut TcpQueue, limit: Duration) {
    let deadline = Instant::now() + limit;
    while queue.transport().bytes_to_write() > 0 && Instant::now() < deadline {
        if queue.transport_mut().flush().is_err() {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }
    debug!(state = %queue.state(), closed = queue.transport().is_closed(), "link finished");
}

pub fn is_closed(queue: &TcpQueue) -> bool {
    queue.state() == QueueState::Closed
}
