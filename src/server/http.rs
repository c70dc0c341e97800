//! HTTP transport on `may_minihttp`.

use may::coroutine::JoinHandle;
use may_minihttp::{HttpServer, Request, Response};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

use super::core::Gate;
use super::request::parse_request;
use super::response::{write_error, write_handler_response};
use crate::dispatcher::Dispatcher;

/// Service handed to `may_minihttp`; one clone per connection.
#[derive(Clone)]
pub(crate) struct HttpService {
    dispatcher: Dispatcher,
    gate: Arc<Gate>,
}

impl HttpService {
    pub(crate) fn new(dispatcher: Dispatcher, gate: Arc<Gate>) -> Self {
        Self { dispatcher, gate }
    }
}

impl may_minihttp::HttpService for HttpService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let Some(_in_flight) = self.gate.enter() else {
            write_error(res, 503, "Service Unavailable");
            return Ok(());
        };
        let request = match parse_request(req) {
            Ok(request) => request,
            Err(detail) => {
                warn!(error = %detail, "Rejected unparseable HTTP request");
                write_error(res, 400, "Bad Request");
                return Ok(());
            }
        };
        let outcome = self.dispatcher.dispatch(request);
        write_handler_response(res, &outcome.response);
        Ok(())
    }
}

/// Start serving on `addr`; returns the bound address and the accept
/// coroutine's handle once the listener accepts connections.
pub(crate) fn launch(addr: &str, service: HttpService) -> io::Result<(SocketAddr, JoinHandle<()>)> {
    let mut addr = resolve(addr)?;
    if addr.port() == 0 {
        // may_minihttp does not report the port it bound; pick a free one first
        addr = TcpListener::bind(addr)?.local_addr()?;
    }
    let handle = HttpServer(service).start(addr)?;
    if let Err(err) = wait_ready(addr) {
        // SAFETY: may::CoroutineHandle::coroutine().cancel() is marked unsafe by the may runtime.
        // The accept loop never became reachable, so nothing depends on it.
        unsafe {
            handle.coroutine().cancel();
        }
        if handle.join().is_err() {
            warn!(addr = %addr, "HTTP accept loop cancelled before becoming ready");
        }
        return Err(err);
    }
    Ok((addr, handle))
}

pub(crate) fn resolve(addr: &str) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?
        .next()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))
}

/// Poll the address until a connection succeeds.
///
/// Returns `TimedOut` after ~250ms (50 attempts × 5ms).
fn wait_ready(addr: SocketAddr) -> io::Result<()> {
    for _ in 0..50 {
        if TcpStream::connect(addr).is_ok() {
            return Ok(());
        }
        thread::sleep(Duration::from_millis(5));
    }
    Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
}
