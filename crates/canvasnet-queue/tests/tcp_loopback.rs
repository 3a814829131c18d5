use std::thread;
use std::time::{Duration, Instant};

use canvasnet_frame::{DisconnectReason, Message};
use canvasnet_queue::{MessageQueue, QueueEvent, QueueState};
use canvasnet_transport::{TcpAcceptor, TcpTransport, WriteSource};

fn connected_pair() -> (MessageQueue<TcpTransport>, MessageQueue<TcpTransport>) {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").unwrap();
    let addr = acceptor.local_addr().unwrap();
    let connector = thread::spawn(move || TcpTransport::connect(addr).unwrap());
    let server = acceptor.accept().unwrap();
    let client = connector.join().unwrap();
    (MessageQueue::new(server), MessageQueue::new(client))
}

fn service(q: &mut MessageQueue<TcpTransport>) {
    q.on_readable();
    if let Ok(n) = q.transport_mut().flush() {
        if n > 0 {
            q.on_bytes_written(WriteSource::Plain, n);
        }
    }
    q.on_timer_tick();
}

fn drive_until(
    a: &mut MessageQueue<TcpTransport>,
    b: &mut MessageQueue<TcpTransport>,
    mut done: impl FnMut(&MessageQueue<TcpTransport>, &MessageQueue<TcpTransport>) -> bool,
) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(a, b) {
        assert!(Instant::now() < deadline, "loopback timed out");
        service(a);
        service(b);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn messages_cross_a_real_socket() {
    let (mut server, mut client) = connected_pair();
    let big = Message::opaque(64, 2, vec![0x42; 60_000]).unwrap();
    client.send(Message::command(1, "hello"));
    client.send(big.clone());

    let mut got = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while got.len() < 2 {
        assert!(Instant::now() < deadline, "messages not delivered");
        service(&mut client);
        service(&mut server);
        while let Some(msg) = server.get_pending() {
            got.push((*msg).clone());
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(got, vec![Message::command(1, "hello"), big]);
}

#[test]
fn ping_round_trip_over_loopback() {
    let (mut server, mut client) = connected_pair();
    client.send_ping();

    let mut rtt = None;
    let deadline = Instant::now() + Duration::from_secs(5);
    while rtt.is_none() {
        assert!(Instant::now() < deadline, "no pong");
        service(&mut client);
        service(&mut server);
        for ev in client.drain_events() {
            if let QueueEvent::PingPong(d) = ev {
                rtt = Some(d);
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn disconnect_reaches_peer_before_close() {
    let (mut server, mut client) = connected_pair();
    client.send_disconnect(DisconnectReason::Shutdown, "done drawing");

    drive_until(&mut server, &mut client, |s, c| {
        s.is_pending() && c.state() == QueueState::Closed && c.transport().is_closed()
    });
    let notice = server.get_pending().unwrap();
    assert_eq!(
        *notice,
        Message::disconnect(0, DisconnectReason::Shutdown, "done drawing")
    );

    drive_until(&mut server, &mut client, |s, _| s.state() == QueueState::Closed);
}
