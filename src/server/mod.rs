//! # Server Module
//!
//! The server abstraction: a [`Server`] owns exactly one transport bound to one
//! protocol and feeds every request to a [`Dispatcher`](crate::dispatcher::Dispatcher).
//!
//! ## Transports
//!
//! | Kind | Protocol | Wire format |
//! |------|----------|-------------|
//! | [`ServerKind::MiniHttp`] | [`Protocol::Http`] | HTTP/1.1 via `may_minihttp` |
//! | [`ServerKind::MayNet`] | [`Protocol::Tcp`] | newline-delimited JSON frames via `may::net` |
//!
//! Any other pairing is rejected by `start` with
//! [`ServerError::UnsupportedProtocol`](crate::error::ServerError::UnsupportedProtocol).
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped ──start──► Starting ──bound──► Running ──stop──► Stopping ──drained──► Stopped
//!                        └──bind error──► Stopped
//! ```
//!
//! `stop` closes the admission gate first, so requests arriving during the
//! drain are answered with 503 (HTTP) or a `status: 503` frame (TCP).
//!
//! ## Example
//!
//! ```rust,no_run
//! use switchyard::dispatcher::Dispatcher;
//! use switchyard::router::{RouteBuilder, SharedRouteTable};
//! use switchyard::registry::ComponentRegistry;
//! use switchyard::server::{Protocol, Server, ServerKind};
//!
//! let table = RouteBuilder::new().build(&ComponentRegistry::new()).unwrap();
//! let dispatcher = Dispatcher::new(SharedRouteTable::new(table));
//! let server = Server::new(ServerKind::MiniHttp, "127.0.0.1:8080", dispatcher);
//! server.start(Protocol::Http).unwrap();
//! server.join().unwrap();
//! ```

mod core;
mod http;
mod request;
mod response;
#[cfg(unix)]
pub mod signals;
mod tcp;

pub use core::{Protocol, Server, ServerKind, ServerState};
pub use request::{parse_body, split_target};
pub use tcp::{FrameFile, RequestFrame, ResponseFrame, MAX_FRAME_BYTES};
