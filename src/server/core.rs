use may::coroutine::JoinHandle;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::http::{self, HttpService};
use super::tcp::{self, Connections};
use crate::dispatcher::Dispatcher;
use crate::error::ServerError;
use crate::runtime_config::DEFAULT_DRAIN_TIMEOUT;

const DRAIN_POLL: Duration = Duration::from_millis(5);
const JOIN_POLL: Duration = Duration::from_millis(100);

/// Transport backend. Exactly one is active per server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ServerKind {
    /// HTTP/1.1 through `may_minihttp`
    #[default]
    MiniHttp,
    /// Newline-delimited JSON frames over `may::net`
    MayNet,
}

impl ServerKind {
    #[must_use]
    pub fn supports(self, protocol: Protocol) -> bool {
        matches!(
            (self, protocol),
            (ServerKind::MiniHttp, Protocol::Http) | (ServerKind::MayNet, Protocol::Tcp)
        )
    }

    #[must_use]
    pub fn default_protocol(self) -> Protocol {
        match self {
            ServerKind::MiniHttp => Protocol::Http,
            ServerKind::MayNet => Protocol::Tcp,
        }
    }
}

impl FromStr for ServerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minihttp" | "may-minihttp" | "may_minihttp" => Ok(ServerKind::MiniHttp),
            "maynet" | "may-net" | "may_net" => Ok(ServerKind::MayNet),
            other => Err(format!("unknown server kind: {other}")),
        }
    }
}

impl fmt::Display for ServerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerKind::MiniHttp => f.write_str("minihttp"),
            ServerKind::MayNet => f.write_str("maynet"),
        }
    }
}

/// Wire protocol a server is bound to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Protocol {
    #[default]
    Http,
    Tcp,
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "tcp" => Ok(Protocol::Tcp),
            other => Err(format!("unknown protocol: {other}")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("http"),
            Protocol::Tcp => f.write_str("tcp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerState::Stopped => f.write_str("stopped"),
            ServerState::Starting => f.write_str("starting"),
            ServerState::Running => f.write_str("running"),
            ServerState::Stopping => f.write_str("stopping"),
        }
    }
}

/// Admission gate shared with the transports.
///
/// A request is counted before the gate is checked, so once `close` returns no
/// new request can slip past the drain.
#[derive(Debug, Default)]
pub(crate) struct Gate {
    open: AtomicBool,
    in_flight: AtomicUsize,
}

impl Gate {
    pub(crate) fn enter(self: &Arc<Self>) -> Option<InFlight> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        if self.open.load(Ordering::SeqCst) {
            Some(InFlight(Arc::clone(self)))
        } else {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            None
        }
    }

    fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }

    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Counts one admitted request until dropped.
pub(crate) struct InFlight(Arc<Gate>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

enum Transport {
    Http(JoinHandle<()>),
    Tcp {
        accept: JoinHandle<()>,
        connections: Arc<Connections>,
    },
}

impl Transport {
    fn is_done(&self) -> bool {
        match self {
            Transport::Http(handle) => handle.is_done(),
            Transport::Tcp { accept, .. } => accept.is_done(),
        }
    }

    fn shutdown(self) {
        match self {
            Transport::Http(handle) => cancel_and_join(handle),
            Transport::Tcp {
                accept,
                connections,
            } => {
                cancel_and_join(accept);
                connections.close_all();
            }
        }
    }
}

fn cancel_and_join(handle: JoinHandle<()>) {
    if !handle.is_done() {
        // SAFETY: may::CoroutineHandle::coroutine().cancel() is marked unsafe by the may runtime.
        // The handle is owned here and the accept loop holds no state that outlives it.
        unsafe {
            handle.coroutine().cancel();
        }
    }
    if handle.join().is_err() {
        debug!("Accept loop cancelled");
    }
}

struct Slot {
    state: ServerState,
    protocol: Option<Protocol>,
    local_addr: Option<SocketAddr>,
    transport: Option<Transport>,
    drain_timeout: Duration,
    /// The transport ended without a stop request
    exited: bool,
}

struct Inner {
    kind: ServerKind,
    addr: String,
    dispatcher: Dispatcher,
    slot: Mutex<Slot>,
    changed: Condvar,
    gate: Arc<Gate>,
}

/// The server abstraction: one transport bound to one protocol, feeding
/// requests to a [`Dispatcher`].
///
/// `Server` is a cheap handle; clones control the same server. `start` on a
/// server that is not stopped fails with [`ServerError::AlreadyRunning`].
#[derive(Clone)]
pub struct Server {
    inner: Arc<Inner>,
}

impl Server {
    pub fn new(kind: ServerKind, addr: &str, dispatcher: Dispatcher) -> Self {
        Self {
            inner: Arc::new(Inner {
                kind,
                addr: addr.to_string(),
                dispatcher,
                slot: Mutex::new(Slot {
                    state: ServerState::Stopped,
                    protocol: None,
                    local_addr: None,
                    transport: None,
                    drain_timeout: DEFAULT_DRAIN_TIMEOUT,
                    exited: false,
                }),
                changed: Condvar::new(),
                gate: Arc::new(Gate::default()),
            }),
        }
    }

    /// How long `stop` waits for in-flight requests.
    #[must_use]
    pub fn with_drain_timeout(self, timeout: Duration) -> Self {
        self.lock().drain_timeout = timeout;
        self
    }

    #[must_use]
    pub fn kind(&self) -> ServerKind {
        self.inner.kind
    }

    #[must_use]
    pub fn state(&self) -> ServerState {
        self.lock().state
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state() == ServerState::Stopped
    }

    /// Bound address while running.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.lock().local_addr
    }

    #[must_use]
    pub fn protocol(&self) -> Option<Protocol> {
        self.lock().protocol
    }

    /// Requests currently being dispatched.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.gate.in_flight()
    }

    /// Bind the transport and start accepting. Returns the bound address, which
    /// differs from the configured one when port 0 was requested.
    pub fn start(&self, protocol: Protocol) -> Result<SocketAddr, ServerError> {
        {
            let mut slot = self.lock();
            if slot.state != ServerState::Stopped {
                return Err(ServerError::AlreadyRunning { state: slot.state });
            }
            if !self.inner.kind.supports(protocol) {
                return Err(ServerError::UnsupportedProtocol {
                    kind: self.inner.kind,
                    protocol,
                });
            }
            slot.state = ServerState::Starting;
            slot.exited = false;
        }
        info!(
            kind = %self.inner.kind,
            protocol = %protocol,
            addr = %self.inner.addr,
            "Server starting"
        );

        let dispatcher = self.inner.dispatcher.clone();
        let gate = Arc::clone(&self.inner.gate);
        let launched = match self.inner.kind {
            ServerKind::MiniHttp => http::launch(&self.inner.addr, HttpService::new(dispatcher, gate))
                .map(|(addr, handle)| (addr, Transport::Http(handle))),
            ServerKind::MayNet => tcp::launch(&self.inner.addr, dispatcher, gate).map(
                |(addr, accept, connections)| {
                    (
                        addr,
                        Transport::Tcp {
                            accept,
                            connections,
                        },
                    )
                },
            ),
        };

        let mut slot = self.lock();
        let result = match launched {
            Ok((local_addr, transport)) => {
                slot.state = ServerState::Running;
                slot.protocol = Some(protocol);
                slot.local_addr = Some(local_addr);
                slot.transport = Some(transport);
                self.inner.gate.open();
                info!(addr = %local_addr, kind = %self.inner.kind, protocol = %protocol, "Server started");
                Ok(local_addr)
            }
            Err(source) => {
                slot.state = ServerState::Stopped;
                error!(addr = %self.inner.addr, error = %source, "Server failed to bind");
                Err(ServerError::Bind {
                    addr: self.inner.addr.clone(),
                    source,
                })
            }
        };
        self.inner.changed.notify_all();
        result
    }

    /// Stop accepting, let in-flight requests finish (up to the drain timeout),
    /// then shut the transport down. Idempotent; `is_stopped` is true on return.
    pub fn stop(&self) {
        let mut slot = self.lock();
        loop {
            match slot.state {
                ServerState::Stopped => return,
                ServerState::Running => break,
                ServerState::Starting | ServerState::Stopping => {
                    slot = self
                        .inner
                        .changed
                        .wait(slot)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
        slot.state = ServerState::Stopping;
        let transport = slot.transport.take();
        let drain_timeout = slot.drain_timeout;
        drop(slot);

        info!(in_flight = self.inner.gate.in_flight(), "Server stopping");
        self.inner.gate.close();
        self.drain(drain_timeout);
        if let Some(transport) = transport {
            transport.shutdown();
        }

        let mut slot = self.lock();
        slot.state = ServerState::Stopped;
        slot.local_addr = None;
        slot.protocol = None;
        self.inner.changed.notify_all();
        info!("Server stopped");
    }

    /// Block until the server is stopped.
    ///
    /// Returns [`ServerError::TransportExited`] when the transport ended without
    /// a stop request.
    pub fn join(&self) -> Result<(), ServerError> {
        let mut slot = self.lock();
        loop {
            if slot.state == ServerState::Stopped {
                return if slot.exited {
                    Err(ServerError::TransportExited)
                } else {
                    Ok(())
                };
            }
            if slot.state == ServerState::Running
                && slot.transport.as_ref().is_some_and(Transport::is_done)
            {
                let transport = slot.transport.take();
                slot.state = ServerState::Stopped;
                slot.exited = true;
                slot.local_addr = None;
                slot.protocol = None;
                self.inner.gate.close();
                self.inner.changed.notify_all();
                drop(slot);
                if let Some(transport) = transport {
                    transport.shutdown();
                }
                error!(kind = %self.inner.kind, "Transport exited unexpectedly");
                return Err(ServerError::TransportExited);
            }
            let (guard, _) = self
                .inner
                .changed
                .wait_timeout(slot, JOIN_POLL)
                .unwrap_or_else(PoisonError::into_inner);
            slot = guard;
        }
    }

    fn drain(&self, timeout: Duration) {
        let start = Instant::now();
        while self.inner.gate.in_flight() > 0 {
            if start.elapsed() >= timeout {
                warn!(
                    in_flight = self.inner.gate.in_flight(),
                    timeout_ms = timeout.as_millis() as u64,
                    "Drain timed out, shutting down with requests in flight"
                );
                return;
            }
            may::coroutine::sleep(DRAIN_POLL);
        }
        debug!(drain_ms = start.elapsed().as_millis() as u64, "In-flight requests drained");
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.lock();
        f.debug_struct("Server")
            .field("kind", &self.inner.kind)
            .field("addr", &self.inner.addr)
            .field("state", &slot.state)
            .field("local_addr", &slot.local_addr)
            .finish()
    }
}
