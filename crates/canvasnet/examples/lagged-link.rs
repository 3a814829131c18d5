//! Simulates a slow, lossy-looking link entirely in memory.
//!
//! A [`RandomLag`] delays every transport write and the memory transport
//! accepts only a few hundred bytes per call, yet the frames arrive intact
//! and in order.
//!
//! Run with:
//!   cargo run --example lagged-link

use std::time::Duration;

use canvasnet::frame::Message;
use canvasnet::queue::{MessageQueue, QueueConfig, RandomLag, SystemClock};
use canvasnet::transport::{MemoryTransport, WriteSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let sender_link = MemoryTransport::new().with_write_chunk(300).buffered();
    let mut sender = MessageQueue::with_parts(
        sender_link,
        QueueConfig::default(),
        SystemClock,
        RandomLag::new(Duration::from_millis(3)),
    );
    let mut receiver = MessageQueue::new(MemoryTransport::new().with_read_chunk(128));

    for stroke in 0..20u8 {
        sender.send(Message::command(1, format!("stroke {stroke}")));
        sender.send(Message::opaque(40, 1, vec![stroke; 2_000])?);
    }

    let mut delivered = 0usize;
    while sender.upload_queue_bytes() > 0 || receiver.is_pending() {
        let flushed = sender.transport_mut().flush();
        let bytes = sender.transport_mut().take_wire();
        receiver.transport_mut().push_inbound(&bytes);
        sender.on_bytes_written(WriteSource::Plain, flushed);
        receiver.on_readable();

        while let Some(msg) = receiver.get_pending() {
            delivered += 1;
            println!("kind {:>3} len {:>5}", msg.kind(), msg.length());
        }
    }

    println!("{delivered} messages delivered");
    Ok(())
}
