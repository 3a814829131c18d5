use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use canvasnet_frame::kind::kind_name;
use canvasnet_frame::{Message, MessageBody};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: u8,
    kind_name: &'a str,
    context_id: u8,
    length: usize,
    payload: String,
    peer: &'a str,
    timestamp: String,
}

pub fn print_message(msg: &Message, peer: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind: msg.kind(),
                kind_name: kind_name(msg.kind()),
                context_id: msg.context_id(),
                length: msg.length(),
                payload: payload_preview(msg.body()),
                peer,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "CONTEXT", "LENGTH", "PEER", "PAYLOAD"])
                .add_row(vec![
                    kind_name(msg.kind()).to_string(),
                    msg.context_id().to_string(),
                    msg.length().to_string(),
                    peer.to_string(),
                    payload_preview(msg.body()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} ({}) context={} length={} peer={} payload={}",
                msg.kind(),
                kind_name(msg.kind()),
                msg.context_id(),
                msg.length(),
                peer,
                payload_preview(msg.body())
            );
        }
    }
}

fn payload_preview(body: &MessageBody) -> String {
    match body {
        MessageBody::Command(text) => text.clone(),
        MessageBody::Ping { pong: false } => "probe".to_string(),
        MessageBody::Ping { pong: true } => "pong".to_string(),
        MessageBody::Disconnect { reason, message } => format!("{reason}: {message}"),
        MessageBody::StreamPos { bytes } => format!("expecting {bytes} bytes"),
        MessageBody::Opaque { payload, .. } => match std::str::from_utf8(payload) {
            Ok(text) => text.to_string(),
            Err(_) => format!("<binary {} bytes>", payload.len()),
        },
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
