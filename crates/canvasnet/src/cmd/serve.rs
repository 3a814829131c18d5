use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use canvasnet_frame::DisconnectReason;
use canvasnet_queue::{MessageQueue, QueueState};
use canvasnet_transport::TcpAcceptor;
use tracing::info;

use crate::cmd::link::{self, Drained};
use crate::cmd::ServeArgs;
use crate::exit::{queue_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

const DRAIN_LIMIT: Duration = Duration::from_secs(2);

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let acceptor =
        TcpAcceptor::bind(args.addr.as_str()).map_err(|err| transport_error("bind failed", err))?;
    let local = acceptor
        .local_addr()
        .map_err(|err| transport_error("bind failed", err))?;
    info!(addr = %local, "waiting for a peer");

    let transport = acceptor
        .accept()
        .map_err(|err| transport_error("accept failed", err))?;
    let peer = transport
        .peer_addr()
        .map_or_else(|| "unknown".to_string(), |addr| addr.to_string());
    info!(%peer, "peer connected");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut queue = MessageQueue::new(transport);
    if let Some(timeout) = args.idle_timeout {
        queue.set_idle_timeout(timeout);
    }
    if let Some(interval) = args.ping_interval {
        queue.set_ping_interval(interval);
    }

    let mut drained = Drained::default();
    let mut received = 0usize;
    loop {
        if !running.load(Ordering::SeqCst) && queue.state() == QueueState::Active {
            info!("interrupted, disconnecting peer");
            queue.send_disconnect(DisconnectReason::Shutdown, "server shutting down");
        }

        link::turn(&mut queue);

        while let Some(msg) = queue.get_pending() {
            received += 1;
            print_message(&msg, &peer, format);
            if !msg.is_control() {
                queue.send(msg);
            }
            if args.count.is_some_and(|limit| received >= limit) {
                info!(received, "message limit reached");
                queue.send_disconnect(DisconnectReason::Shutdown, "message limit reached");
            }
        }

        link::drain_events(&mut queue, &mut drained);
        if drained.closed || link::is_closed(&queue) {
            break;
        }
        link::pause(&queue);
    }

    link::finish(&mut queue, DRAIN_LIMIT);
    info!(%peer, received, "peer session ended");

    match drained.fatal {
        Some(err) => Err(queue_error("connection failed", err)),
        None => Ok(SUCCESS),
    }
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
