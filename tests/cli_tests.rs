//! Tests for the `switchyard` binary

use std::process::Command;

fn switchyard() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_switchyard"));
    cmd.env_remove("RUST_LOG")
        .env("SWITCHYARD_LOG_LEVEL", "error")
        .env("SWITCHYARD_LOG_ASYNC", "false");
    cmd
}

#[test]
fn test_routes_prints_demo_table() {
    let output = switchyard().arg("routes").output().expect("run cli");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("/echo/{id}"));
    assert!(stdout.contains("EchoGroup::secret"));
    assert!(stdout.contains("/error/500"));
}

#[test]
fn test_serve_rejects_unknown_server_kind() {
    let output = switchyard()
        .args(["serve", "--server-kind", "netty"])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown server kind"));
}

#[test]
fn test_serve_fails_on_unsupported_pair() {
    let output = switchyard()
        .args([
            "serve",
            "--addr",
            "127.0.0.1:0",
            "--server-kind",
            "minihttp",
            "--protocol",
            "tcp",
        ])
        .output()
        .expect("run cli");
    assert!(!output.status.success());
}
