//! Integration tests for the server abstraction and both transports
//!
//! # Test Strategy
//!
//! Each test starts a real server on `127.0.0.1:0` through an RAII fixture that
//! stops it on drop, then talks to it with plain `std::net` clients:
//! 1. **HTTP**: raw HTTP/1.1 requests against the `may_minihttp` backend
//! 2. **TCP**: newline-delimited JSON frames against the `may::net` backend
//! 3. **Lifecycle**: start/stop/join state transitions and error reporting

use serde_json::json;
use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::Duration;
use switchyard::dispatcher::Dispatcher;
use switchyard::registry::ComponentRegistry;
use switchyard::router::{RouteBuilder, SharedRouteTable};
use switchyard::server::{
    FrameFile, Protocol, RequestFrame, Server, ServerKind, ServerState, MAX_FRAME_BYTES,
};
use switchyard::{echo, ServerError};

mod common;
use common::fixtures::Orders;
use common::http::{get, send_request};
use common::tcp::FrameClient;
use common::test_server::setup_may_runtime;

fn dispatcher() -> Dispatcher {
    let mut registry = echo::registry();
    registry.register_group(Orders::default());
    Dispatcher::new(SharedRouteTable::new(RouteBuilder::new().build(&registry).unwrap()))
}

/// Running server that is stopped when the test ends.
struct TestServer {
    server: Server,
    addr: SocketAddr,
}

impl TestServer {
    fn start(kind: ServerKind) -> Self {
        setup_may_runtime();
        let server = Server::new(kind, "127.0.0.1:0", dispatcher())
            .with_drain_timeout(Duration::from_secs(2));
        let addr = server.start(kind.default_protocol()).unwrap();
        Self { server, addr }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.stop();
    }
}

#[test]
fn test_http_round_trip() {
    let ts = TestServer::start(ServerKind::MiniHttp);
    assert_eq!(ts.server.state(), ServerState::Running);
    assert_eq!(ts.server.protocol(), Some(Protocol::Http));

    let reply = get(ts.addr, "/orders/5");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json()["id"], 5);

    let reply = get(ts.addr, "/echo?message=hey&tag=x&tag=y");
    assert_eq!(reply.json(), json!({ "message": "hey", "tags": ["x", "y"] }));
}

#[test]
fn test_http_error_routes() {
    let ts = TestServer::start(ServerKind::MiniHttp);
    let reply = get(ts.addr, "/missing");
    assert_eq!(reply.status, 404);
    assert_eq!(reply.json(), json!({ "error": "Not Found", "status": 404 }));

    let reply = send_request(ts.addr, "DELETE", "/orders/5", &[], "");
    assert_eq!(reply.status, 405);
    assert_eq!(reply.json()["allowed"], json!(["GET"]));

    let reply = get(ts.addr, "/orders/abc");
    assert_eq!(reply.status, 400);

    let reply = get(ts.addr, "/echo/secret");
    assert_eq!(reply.status, 401);
    let reply = send_request(ts.addr, "GET", "/echo/secret", &[("X-Token", "t")], "");
    assert_eq!(reply.status, 200);
}

#[test]
fn test_http_bodies() {
    let ts = TestServer::start(ServerKind::MiniHttp);
    let reply = send_request(
        ts.addr,
        "POST",
        "/orders",
        &[("Content-Type", "application/json")],
        r#"{"sku":"A-1","qty":2}"#,
    );
    assert_eq!(reply.status, 201);
    assert_eq!(reply.json(), json!({ "sku": "A-1", "qty": 2 }));

    let reply = send_request(
        ts.addr,
        "POST",
        "/orders",
        &[("Content-Type", "application/x-www-form-urlencoded")],
        "sku=B-2&qty=9",
    );
    assert_eq!(reply.json(), json!({ "sku": "B-2", "qty": 9 }));
}

#[test]
fn test_tcp_frames() {
    let ts = TestServer::start(ServerKind::MayNet);
    let mut client = FrameClient::connect(ts.addr);

    let mut frame = RequestFrame::new("GET", "/orders/77");
    frame.id = Some(json!(1));
    let reply = client.send(&frame);
    assert_eq!(reply.id, Some(json!(1)));
    assert_eq!(reply.status, 200);
    assert_eq!(reply.route.as_deref(), Some("/orders/{id}"));
    assert_eq!(reply.body["id"], 77);
    assert_eq!(reply.request_id.as_deref(), reply.body["request_id"].as_str());

    let reply = client.send_line("{not a frame");
    assert_eq!(reply.status, 400);
    assert!(reply.route.is_none());

    // connection survives a malformed line
    let reply = client.send(&RequestFrame::new("GET", "/nowhere"));
    assert_eq!(reply.status, 404);
    assert_eq!(reply.route.as_deref(), Some("/error/404"));
    assert!(reply.allow.is_none());

    let reply = client.send(&RequestFrame::new("DELETE", "/orders/77"));
    assert_eq!(reply.status, 405);
    assert_eq!(reply.allow.as_deref(), Some("GET"));
    assert_eq!(reply.body["allowed"], json!(["GET"]));
}

#[test]
fn test_tcp_oversized_frame_closes_connection() {
    let ts = TestServer::start(ServerKind::MayNet);
    let mut client = FrameClient::connect(ts.addr);
    let reply = client.send(&RequestFrame::new("GET", "/orders/1"));
    assert_eq!(reply.status, 200);

    let reply = client.send_raw(&vec![b'x'; MAX_FRAME_BYTES + 1]);
    assert_eq!(reply.status, 400);
    assert!(reply.route.is_none());
    assert!(reply.body["detail"].as_str().unwrap().contains("exceeds"));
    assert!(client.closed());

    // other connections are unaffected
    let mut client = FrameClient::connect(ts.addr);
    assert_eq!(client.send(&RequestFrame::new("GET", "/orders/1")).status, 200);
}

#[test]
fn test_tcp_file_upload() {
    let ts = TestServer::start(ServerKind::MayNet);
    let mut client = FrameClient::connect(ts.addr);
    let mut frame = RequestFrame::new("POST", "/echo/upload");
    frame.files.push(FrameFile {
        field: "file".to_string(),
        file_name: "notes.txt".to_string(),
        content_type: Some("text/plain".to_string()),
        data: "aGVsbG8=".to_string(),
    });
    let reply = client.send(&frame);
    assert_eq!(reply.status, 201);
    assert_eq!(
        reply.body,
        json!({ "file_name": "notes.txt", "content_type": "text/plain", "size": 5 })
    );
}

#[test]
fn test_start_twice_is_already_running() {
    let ts = TestServer::start(ServerKind::MiniHttp);
    let err = ts.server.start(Protocol::Http).unwrap_err();
    assert!(matches!(
        err,
        ServerError::AlreadyRunning {
            state: ServerState::Running
        }
    ));
}

#[test]
fn test_unsupported_protocol_is_rejected_before_binding() {
    let server = Server::new(ServerKind::MiniHttp, "127.0.0.1:0", dispatcher());
    let err = server.start(Protocol::Tcp).unwrap_err();
    assert!(matches!(err, ServerError::UnsupportedProtocol { .. }));
    assert!(server.is_stopped());
}

#[test]
fn test_bind_failure_leaves_server_stopped() {
    setup_may_runtime();
    let taken = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = taken.local_addr().unwrap().to_string();
    let server = Server::new(ServerKind::MayNet, &addr, dispatcher());
    let err = server.start(Protocol::Tcp).unwrap_err();
    assert!(matches!(err, ServerError::Bind { .. }), "{err}");
    assert!(server.is_stopped());
}

#[test]
fn test_stop_is_idempotent_and_releases_join() {
    let ts = TestServer::start(ServerKind::MayNet);
    let joiner = {
        let server = ts.server.clone();
        thread::spawn(move || server.join())
    };
    ts.server.stop();
    ts.server.stop();
    assert!(ts.server.is_stopped());
    assert!(ts.server.local_addr().is_none());
    assert!(joiner.join().unwrap().is_ok());
}

#[test]
fn test_stop_drains_in_flight_requests() {
    let ts = TestServer::start(ServerKind::MayNet);
    let addr = ts.addr;
    let slow = thread::spawn(move || {
        let mut client = FrameClient::connect(addr);
        client.send(&RequestFrame::new("GET", "/orders/slow?ms=300"))
    });
    thread::sleep(Duration::from_millis(100));
    assert_eq!(ts.server.in_flight(), 1);
    ts.server.stop();

    let reply = slow.join().unwrap();
    assert_eq!(reply.status, 200);
    assert_eq!(reply.body, json!({ "slept": 300 }));
    assert_eq!(ts.server.in_flight(), 0);
}

#[test]
fn test_restart_after_stop() {
    setup_may_runtime();
    let server = Server::new(ServerKind::MayNet, "127.0.0.1:0", dispatcher());
    let first = server.start(Protocol::Tcp).unwrap();
    server.stop();
    let second = server.start(Protocol::Tcp).unwrap();
    let reply = FrameClient::connect(second).send(&RequestFrame::new("GET", "/orders"));
    assert_eq!(reply.status, 200);
    server.stop();
    assert_ne!(first.port(), 0);
}

#[test]
fn test_empty_registry_still_serves_error_routes() {
    setup_may_runtime();
    let table = RouteBuilder::new().build(&ComponentRegistry::new()).unwrap();
    let server = Server::new(
        ServerKind::MiniHttp,
        "127.0.0.1:0",
        Dispatcher::new(SharedRouteTable::new(table)),
    );
    let addr = server.start(Protocol::Http).unwrap();
    assert_eq!(get(addr, "/").status, 404);
    server.stop();
}
