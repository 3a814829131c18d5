#![cfg(feature = "cli")]

use std::net::TcpListener;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn free_addr() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("ephemeral bind should work");
    let addr = listener.local_addr().expect("bound listener has an address");
    addr.to_string()
}

fn canvasnet() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_canvasnet"));
    cmd.arg("--log-level").arg("error");
    cmd
}

/// Retry `send` until the server is accepting.
fn send_when_ready(addr: &str, extra: &[&str], timeout: Duration) -> Output {
    let start = Instant::now();
    loop {
        let output = canvasnet()
            .arg("--format")
            .arg("json")
            .arg("send")
            .arg(addr)
            .args(extra)
            .output()
            .expect("send should run");
        if output.status.code() != Some(3) || start.elapsed() >= timeout {
            return output;
        }
        thread::sleep(Duration::from_millis(25));
    }
}

#[test]
fn send_gets_echo_from_serve() {
    let addr = free_addr();
    let server = canvasnet()
        .arg("--format")
        .arg("json")
        .arg("serve")
        .arg(&addr)
        .arg("--count")
        .arg("1")
        .arg("--idle-timeout")
        .arg("10s")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve should start");

    let output = send_when_ready(
        &addr,
        &["--command", "stroke 1 2 3", "--wait"],
        Duration::from_secs(5),
    );
    assert!(
        output.status.success(),
        "send failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"payload\":\"stroke 1 2 3\""));
    assert!(stdout.contains("\"kind_name\":\"COMMAND\""));

    let served = server.wait_with_output().expect("serve should exit");
    assert!(served.status.success());
    let served_stdout = String::from_utf8_lossy(&served.stdout);
    assert!(served_stdout.contains("stroke 1 2 3"));
}

#[test]
fn send_to_closed_port_is_a_transport_error() {
    let addr = free_addr();
    let output = canvasnet()
        .arg("send")
        .arg(&addr)
        .arg("--command")
        .arg("anyone?")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn reserved_kind_is_rejected_before_connecting() {
    let output = canvasnet()
        .arg("send")
        .arg("127.0.0.1:9")
        .arg("--data")
        .arg("x")
        .arg("--kind")
        .arg("9")
        .output()
        .expect("send should run");
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn version_reports_package_version() {
    let output = canvasnet()
        .arg("version")
        .arg("--extended")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
    assert!(stdout.contains("max_payload_bytes: 65536"));
}
