//! Raw TCP transport on `may::net`: one JSON request frame per line, answered
//! by one JSON response frame per line.
//!
//! ```text
//! → {"id":7,"method":"GET","uri":"/echo/42?verbose=true","headers":{"x-token":"t"}}
//! ← {"id":7,"request_id":"01J…","status":200,"route":"/echo/{id}","body":{…}}
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::Method;
use may::coroutine::{self, JoinHandle};
use may::net::{TcpListener, TcpStream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, warn};

use super::core::Gate;
use super::request::build_request;
use crate::binder::{Body, HeaderVec, UploadedFile};
use crate::dispatcher::{DispatchOutcome, DispatchRequest, Dispatcher};

const CONNECTION_STACK_SIZE: usize = 0x8000;

/// Longest accepted request line, newline excluded.
pub const MAX_FRAME_BYTES: usize = 1 << 20;

/// A file carried inside a request frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameFile {
    pub field: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Base64 (standard alphabet, padded)
    pub data: String,
}

/// One request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Echoed back unchanged for client-side correlation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    pub uri: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FrameFile>,
}

impl RequestFrame {
    pub fn new(method: &str, uri: &str) -> Self {
        Self {
            id: None,
            method: method.to_string(),
            uri: uri.to_string(),
            headers: BTreeMap::new(),
            body: None,
            files: Vec::new(),
        }
    }

    /// Convert into a dispatch request, decoding any files.
    pub fn into_request(self) -> Result<DispatchRequest, String> {
        let method = Method::from_bytes(self.method.as_bytes())
            .map_err(|err| format!("invalid method {:?}: {err}", self.method))?;
        let headers: HeaderVec = self
            .headers
            .into_iter()
            .map(|(k, v)| (Arc::from(k.to_ascii_lowercase()), v))
            .collect();
        let body = self.body.map_or(Body::Empty, Body::Json);

        let mut request = build_request(method, &self.uri, headers, body);
        for file in self.files {
            let data = STANDARD
                .decode(file.data.as_bytes())
                .map_err(|err| format!("file {:?} is not valid base64: {err}", file.file_name))?;
            request.sources.files.push(UploadedFile {
                field: file.field,
                file_name: file.file_name,
                content_type: file.content_type,
                data,
            });
        }
        Ok(request)
    }
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub request_id: Option<String>,
    pub status: u16,
    /// URI of the route that answered, absent when nothing was dispatched
    #[serde(default)]
    pub route: Option<String>,
    /// Accepted verbs, present on 405 answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<String>,
    pub body: Value,
}

impl ResponseFrame {
    fn rejected(id: Option<Value>, status: u16, error: &str, detail: Option<String>) -> Self {
        let mut body = serde_json::json!({ "error": error, "status": status });
        if let Some(detail) = detail {
            body["detail"] = Value::String(detail);
        }
        Self {
            id,
            request_id: None,
            status,
            route: None,
            allow: None,
            body,
        }
    }

    fn from_outcome(id: Option<Value>, outcome: DispatchOutcome) -> Self {
        Self {
            id,
            request_id: Some(outcome.request_id.to_string()),
            status: outcome.response.status,
            allow: outcome.response.get_header("allow").map(str::to_string),
            route: Some(outcome.route_uri),
            body: outcome.response.body,
        }
    }
}

/// Answer one admitted request line.
fn handle_line(line: &str, dispatcher: &Dispatcher) -> ResponseFrame {
    let frame: RequestFrame = match serde_json::from_str(line) {
        Ok(frame) => frame,
        Err(err) => {
            warn!(error = %err, "Malformed request frame");
            return ResponseFrame::rejected(None, 400, "Bad Request", Some(err.to_string()));
        }
    };
    let id = frame.id.clone();
    match frame.into_request() {
        Ok(request) => ResponseFrame::from_outcome(id, dispatcher.dispatch(request)),
        Err(detail) => {
            warn!(error = %detail, "Invalid request frame");
            ResponseFrame::rejected(id, 400, "Bad Request", Some(detail))
        }
    }
}

/// Answer for a line that arrived while the server is draining.
fn unavailable(line: &str) -> ResponseFrame {
    let id = serde_json::from_str::<RequestFrame>(line)
        .ok()
        .and_then(|frame| frame.id);
    ResponseFrame::rejected(id, 503, "Service Unavailable", None)
}

/// Open connections, kept so `stop` can close them.
#[derive(Default)]
pub(crate) struct Connections {
    next_id: AtomicU64,
    open: Mutex<HashMap<u64, TcpStream>>,
}

impl Connections {
    fn track(&self, stream: &TcpStream) -> io::Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = stream.try_clone()?;
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, handle);
        Ok(id)
    }

    fn untrack(&self, id: u64) {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }

    pub(crate) fn close_all(&self) {
        let open: Vec<TcpStream> = self
            .open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, stream)| stream)
            .collect();
        for stream in &open {
            if let Err(err) = stream.shutdown(Shutdown::Both) {
                debug!(error = %err, "Connection already closed");
            }
        }
        debug!(closed = open.len(), "TCP connections closed");
    }
}

/// Bind `addr` and spawn the accept loop.
pub(crate) fn launch(
    addr: &str,
    dispatcher: Dispatcher,
    gate: Arc<Gate>,
) -> io::Result<(SocketAddr, JoinHandle<()>, Arc<Connections>)> {
    let listener = TcpListener::bind(addr)?;
    let local_addr = listener.local_addr()?;
    let connections = Arc::new(Connections::default());
    let tracked = Arc::clone(&connections);
    // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
    // The closure owns everything it touches and does not use thread-local storage.
    let handle = unsafe {
        coroutine::Builder::new()
            .name("switchyard-tcp-accept".to_string())
            .spawn(move || accept_loop(listener, dispatcher, gate, tracked))
    }?;
    Ok((local_addr, handle, connections))
}

fn accept_loop(
    listener: TcpListener,
    dispatcher: Dispatcher,
    gate: Arc<Gate>,
    connections: Arc<Connections>,
) {
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                warn!(error = %err, "TCP accept failed");
                continue;
            }
        };
        let peer = stream.peer_addr().ok();
        let id = match connections.track(&stream) {
            Ok(id) => id,
            Err(err) => {
                warn!(error = %err, "Cannot track TCP connection, dropping it");
                continue;
            }
        };
        let dispatcher = dispatcher.clone();
        let gate = Arc::clone(&gate);
        let connections_for_conn = Arc::clone(&connections);
        // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
        // The closure owns its stream and shared handles; no thread-local storage is used.
        let spawned = unsafe {
            coroutine::Builder::new()
                .stack_size(CONNECTION_STACK_SIZE)
                .spawn(move || {
                    if let Err(err) = serve_connection(stream, &dispatcher, &gate) {
                        debug!(peer = ?peer, error = %err, "TCP connection ended with error");
                    }
                    connections_for_conn.untrack(id);
                })
        };
        if let Err(err) = spawned {
            error!(peer = ?peer, error = %err, "Failed to spawn TCP connection coroutine");
            connections.untrack(id);
        }
    }
}

/// Outcome of reading one request line.
#[derive(Debug, PartialEq, Eq)]
enum LineRead {
    /// `buf` holds a line, without its terminator
    Line,
    Eof,
    /// More than `limit` bytes arrived without a newline
    TooLong,
}

/// Read one `\n`-terminated line into `buf`, never buffering more than `limit + 1` bytes.
fn read_frame_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<LineRead> {
    buf.clear();
    let read = reader.by_ref().take(limit as u64 + 1).read_until(b'\n', buf)?;
    if read == 0 {
        return Ok(LineRead::Eof);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if buf.len() > limit {
        return Ok(LineRead::TooLong);
    }
    Ok(LineRead::Line)
}

fn write_frame(writer: &mut TcpStream, frame: &ResponseFrame) -> io::Result<()> {
    let mut bytes = serde_json::to_vec(frame).map_err(io::Error::other)?;
    bytes.push(b'\n');
    writer.write_all(&bytes)?;
    writer.flush()
}

fn serve_connection(stream: TcpStream, dispatcher: &Dispatcher, gate: &Arc<Gate>) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;
    let mut buf = Vec::with_capacity(1024);
    loop {
        match read_frame_line(&mut reader, &mut buf, MAX_FRAME_BYTES)? {
            LineRead::Eof => return Ok(()),
            LineRead::TooLong => {
                warn!(limit = MAX_FRAME_BYTES, "Request frame too large, closing connection");
                let detail = format!("frame exceeds {MAX_FRAME_BYTES} bytes");
                let frame = ResponseFrame::rejected(None, 400, "Bad Request", Some(detail));
                return write_frame(&mut writer, &frame);
            }
            LineRead::Line => {}
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(err) => {
                warn!(error = %err, "Request frame is not UTF-8");
                let frame = ResponseFrame::rejected(None, 400, "Bad Request", Some(err.to_string()));
                write_frame(&mut writer, &frame)?;
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        // Held until the reply is written so a drain never cuts it off.
        let admitted = gate.enter();
        let frame = match admitted {
            Some(_) => handle_line(line, dispatcher),
            None => unavailable(line),
        };
        write_frame(&mut writer, &frame)?;
        drop(admitted);
    }
}
