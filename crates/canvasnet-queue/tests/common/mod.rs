#![allow(dead_code)]

use bytes::BytesMut;
use canvasnet_frame::{encode_message, Message};
use canvasnet_queue::{ManualClock, MessageQueue, NoLag, QueueConfig, QueueEvent};
use canvasnet_transport::{MemoryTransport, WriteSource};

pub type TestQueue = MessageQueue<MemoryTransport>;

pub fn queue(transport: MemoryTransport) -> (TestQueue, ManualClock) {
    let clock = ManualClock::new();
    let queue = MessageQueue::with_parts(transport, QueueConfig::default(), clock.clone(), NoLag);
    (queue, clock)
}

/// A queue whose transport accepts nothing until [`pump`] hands it budget.
pub fn stalled_queue() -> (TestQueue, ManualClock) {
    let mut transport = MemoryTransport::new();
    transport.set_write_budget(Some(0));
    queue(transport)
}

pub fn wire_of(messages: &[Message]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    for msg in messages {
        encode_message(msg, &mut buf).unwrap();
    }
    buf.to_vec()
}

/// Let the transport accept `step` bytes at a time, signalling a write
/// completion after each step, until the queue has nothing left to send.
pub fn pump(queue: &mut TestQueue, step: usize) {
    for _ in 0..1_000_000 {
        if queue.upload_queue_bytes() == 0 {
            break;
        }
        let before = queue.transport().wire().len();
        queue.transport_mut().set_write_budget(Some(step));
        queue.on_bytes_written(WriteSource::Plain, step);
        if queue.transport().wire().len() == before {
            break;
        }
    }
    queue.transport_mut().set_write_budget(Some(0));
}

pub fn events(queue: &mut TestQueue) -> Vec<QueueEvent> {
    queue.drain_events().collect()
}

pub fn received(queue: &mut TestQueue) -> Vec<Message> {
    std::iter::from_fn(|| queue.get_pending())
        .map(|msg| (*msg).clone())
        .collect()
}
