mod common;

use std::time::Duration;

use canvasnet_frame::Message;
use canvasnet_queue::{QueueError, QueueEvent, QueueState};
use canvasnet_transport::{MemoryTransport, WriteSource};

use common::{events, queue, wire_of};

fn idle_timeouts(evs: &[QueueEvent]) -> usize {
    evs.iter()
        .filter(|ev| matches!(ev, QueueEvent::Error(QueueError::IdleTimeout { .. })))
        .count()
}

#[test]
fn idle_peer_is_aborted_exactly_once() {
    let (mut q, clock) = queue(MemoryTransport::new());
    q.set_idle_timeout(Duration::from_secs(5));

    for _ in 0..5 {
        clock.advance(Duration::from_secs(1));
        q.on_timer_tick();
    }
    assert_eq!(q.transport().abort_count(), 0);

    for _ in 0..10 {
        clock.advance(Duration::from_secs(1));
        q.on_timer_tick();
        q.check_idle_timeout();
    }

    assert_eq!(q.transport().abort_count(), 1);
    assert_eq!(q.state(), QueueState::Closed);
    assert_eq!(q.next_timer_deadline(), None);
    let evs = events(&mut q);
    assert_eq!(idle_timeouts(&evs), 1);
    assert!(matches!(evs.last(), Some(QueueEvent::Closed)));
}

#[test]
fn traffic_keeps_the_connection_alive() {
    let (mut q, clock) = queue(MemoryTransport::new());
    q.set_idle_timeout(Duration::from_secs(3));

    for i in 0..20 {
        clock.advance(Duration::from_secs(1));
        if i % 2 == 0 {
            q.transport_mut()
                .push_inbound(&wire_of(&[Message::command(1, "tick")]));
            q.on_readable();
        }
        q.on_timer_tick();
    }

    assert_eq!(q.transport().abort_count(), 0);
    assert_eq!(q.state(), QueueState::Active);
}

#[test]
fn disarmed_idle_timeout_never_fires() {
    let (mut q, clock) = queue(MemoryTransport::new());
    q.set_idle_timeout(Duration::from_secs(1));
    q.set_idle_timeout(Duration::ZERO);

    clock.advance(Duration::from_secs(3600));
    q.on_timer_tick();
    q.check_idle_timeout();

    assert_eq!(q.transport().abort_count(), 0);
    assert_eq!(idle_timeouts(&events(&mut q)), 0);
}

#[test]
fn triggers_are_inert_after_close() {
    let (mut q, clock) = queue(MemoryTransport::new());
    q.set_ping_interval(Duration::from_secs(1));
    q.transport_mut().disconnect_peer();
    q.on_readable();
    assert_eq!(q.state(), QueueState::Closed);
    events(&mut q);

    clock.advance(Duration::from_secs(10));
    q.on_timer_tick();
    q.transport_mut()
        .push_inbound(&wire_of(&[Message::command(1, "late")]));
    q.on_readable();
    q.send(Message::command(1, "late reply"));
    q.on_bytes_written(WriteSource::Plain, 10);
    q.on_encrypted();
    q.on_bytes_written(WriteSource::Encrypted, 10);

    assert!(events(&mut q).is_empty());
    assert!(!q.is_pending());
    assert!(q.transport().wire().is_empty());
}
