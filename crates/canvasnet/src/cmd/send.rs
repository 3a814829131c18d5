use std::time::{Duration, Instant};

use canvasnet_frame::{Message, MessagePtr};
use canvasnet_queue::MessageQueue;
use canvasnet_transport::TcpTransport;
use tracing::{debug, info};

use crate::cmd::link::{self, Drained, TcpQueue};
use crate::cmd::SendArgs;
use crate::exit::{
    frame_error, queue_error, transport_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE,
};
use crate::output::{print_message, OutputFormat};

const CLOSE_LIMIT: Duration = Duration::from_secs(5);

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let msg = build_message(&args)?;

    let transport = TcpTransport::connect(args.addr.as_str())
        .map_err(|err| transport_error("connect failed", err))?;
    let peer = transport
        .peer_addr()
        .map_or_else(|| args.addr.clone(), |addr| addr.to_string());
    let mut queue = MessageQueue::new(transport);
    let mut drained = Drained::default();

    debug!(kind = msg.kind(), length = msg.length(), "sending");
    queue.send(msg);

    if args.wait {
        let reply = wait_for_reply(&mut queue, &mut drained, args.wait_timeout)?;
        print_message(&reply, &peer, format);
    }

    queue.send_disconnect(args.disconnect_reason.into(), "done");
    let deadline = Instant::now() + CLOSE_LIMIT;
    while !drained.closed && !link::is_closed(&queue) {
        if Instant::now() >= deadline {
            return Err(CliError::new(TIMEOUT, "timed out closing connection"));
        }
        link::turn(&mut queue);
        link::drain_events(&mut queue, &mut drained);
        link::pause(&queue);
    }
    link::finish(&mut queue, CLOSE_LIMIT);
    info!(%peer, "disconnected");

    match drained.fatal {
        Some(err) => Err(queue_error("send failed", err)),
        None => Ok(SUCCESS),
    }
}

fn build_message(args: &SendArgs) -> CliResult<Message> {
    if let Some(text) = &args.command {
        return Ok(Message::command(args.context, text.as_str()));
    }
    match args.kind {
        Some(kind) => {
            let payload = args.data.clone().unwrap_or_default().into_bytes();
            Message::opaque(kind, args.context, payload)
                .map_err(|err| frame_error("--kind must be 32-255", err))
        }
        None => Err(CliError::new(USAGE, "one of --command or --kind is required")),
    }
}

fn wait_for_reply(
    queue: &mut TcpQueue,
    drained: &mut Drained,
    timeout: Duration,
) -> CliResult<MessagePtr> {
    let deadline = Instant::now() + timeout;
    loop {
        link::turn(queue);
        link::drain_events(queue, drained);
        if let Some(reply) = queue.get_pending() {
            return Ok(reply);
        }
        if let Some(err) = drained.fatal.take() {
            return Err(queue_error("receive failed", err));
        }
        if drained.closed || link::is_closed(queue) {
            return Err(CliError::new(
                crate::exit::FAILURE,
                "peer closed the connection before replying",
            ));
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("no reply within {timeout:?}"),
            ));
        }
        link::pause(queue);
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cmd::Command;

    #[derive(Parser)]
    struct Wrapper {
        #[command(subcommand)]
        command: Command,
    }

    fn send_args(argv: &[&str]) -> SendArgs {
        let mut full = vec!["canvasnet", "send", "127.0.0.1:1"];
        full.extend_from_slice(argv);
        match Wrapper::try_parse_from(full).unwrap().command {
            Command::Send(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn command_text_builds_command_message() {
        let msg = build_message(&send_args(&["--command", "join bob", "--context", "4"])).unwrap();
        assert_eq!(msg, Message::command(4, "join bob"));
    }

    #[test]
    fn data_with_kind_builds_opaque_message() {
        let msg = build_message(&send_args(&["--data", "xyz", "--kind", "64"])).unwrap();
        assert_eq!(msg, Message::opaque(64, 1, b"xyz".to_vec()).unwrap());
    }

    #[test]
    fn reserved_kind_is_rejected() {
        let err = build_message(&send_args(&["--data", "xyz", "--kind", "5"])).unwrap_err();
        assert_eq!(err.code, crate::exit::DATA_INVALID);
    }

    #[test]
    fn missing_payload_is_a_usage_error() {
        let err = build_message(&send_args(&[])).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
