use std::time::Duration;

use canvasnet_frame::DisconnectReason;
use clap::{Args, Subcommand, ValueEnum};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod link;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept one peer, print and echo its messages.
    Serve(ServeArgs),
    /// Connect, send one message and disconnect.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Serve(args) => serve::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (e.g. 127.0.0.1:7878).
    pub addr: String,
    /// Abort the peer after this much silence (e.g. 30s, 2m). Off by default.
    #[arg(long, env = "CANVASNET_IDLE_TIMEOUT", value_parser = parse_duration)]
    pub idle_timeout: Option<Duration>,
    /// Send a keepalive probe at this interval. Off by default.
    #[arg(long, env = "CANVASNET_PING_INTERVAL", value_parser = parse_duration)]
    pub ping_interval: Option<Duration>,
    /// Disconnect the peer after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to.
    pub addr: String,
    /// Command text to send.
    #[arg(long, conflicts_with_all = ["data", "kind"])]
    pub command: Option<String>,
    /// Raw string payload for an application message.
    #[arg(long, requires = "kind")]
    pub data: Option<String>,
    /// Application message kind (32-255).
    #[arg(long)]
    pub kind: Option<u8>,
    /// Sender context id.
    #[arg(long, default_value = "1")]
    pub context: u8,
    /// Reason carried by the closing disconnect notice.
    #[arg(long, value_enum, default_value = "other")]
    pub disconnect_reason: ReasonArg,
    /// Wait for one message from the peer and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for a reply when --wait is set.
    #[arg(long, default_value = "5s", value_parser = parse_duration)]
    pub wait_timeout: Duration,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ReasonArg {
    Error,
    Kick,
    Shutdown,
    Other,
}

impl From<ReasonArg> for DisconnectReason {
    fn from(reason: ReasonArg) -> Self {
        match reason {
            ReasonArg::Error => DisconnectReason::Error,
            ReasonArg::Kick => DisconnectReason::Kick,
            ReasonArg::Shutdown => DisconnectReason::Shutdown,
            ReasonArg::Other => DisconnectReason::Other,
        }
    }
}

/// Parse `500ms`, `5s`, `2m` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("duration must not be empty".to_string());
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration value: {input}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        _ => Duration::from_secs(value),
    })
}
