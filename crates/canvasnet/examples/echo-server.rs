//! Minimal echo server: accepts one peer and echoes its messages back.
//!
//! Run with:
//!   cargo run --example echo-server
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:7878 --command "hello" --wait

use std::thread;
use std::time::Duration;

use canvasnet::queue::{MessageQueue, QueueEvent, QueueState};
use canvasnet::transport::{TcpAcceptor, WriteSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let acceptor = TcpAcceptor::bind("127.0.0.1:7878")?;
    eprintln!("Listening on {}", acceptor.local_addr()?);

    let transport = acceptor.accept()?;
    eprintln!("Peer connected: {:?}", transport.peer_addr());

    let mut queue = MessageQueue::new(transport);
    queue.set_idle_timeout(Duration::from_secs(30));

    while queue.state() != QueueState::Closed {
        queue.on_readable();
        let flushed = queue.transport_mut().flush()?;
        if flushed > 0 {
            queue.on_bytes_written(WriteSource::Plain, flushed);
        }
        queue.on_timer_tick();

        for event in queue.drain_events() {
            if let QueueEvent::Error(err) = event {
                eprintln!("queue error: {err}");
            }
        }

        while let Some(msg) = queue.get_pending() {
            eprintln!("Received kind {} from context {}", msg.kind(), msg.context_id());
            if !msg.is_control() {
                queue.send(msg);
            }
        }

        thread::sleep(Duration::from_millis(5));
    }

    eprintln!("Peer disconnected");
    Ok(())
}
