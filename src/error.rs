//! Error types for registration, binding, serving and bootstrap.
//!
//! Lookup misses and verb mismatches are not errors: they are represented by the
//! not-found and method-not-allowed routes flowing through normal dispatch.

use std::fmt;
use std::io;

use crate::router::{ParamSource, TargetType};
use crate::server::{Protocol, ServerKind, ServerState};

/// Why a raw value could not be bound to a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingFailure {
    /// Required value absent and no default configured
    Missing,
    /// Raw value present but not coercible into the target type
    Malformed { raw: String, detail: String },
    /// Wrong number of uploaded files under the alias
    FileArity { found: usize },
}

impl fmt::Display for BindingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingFailure::Missing => write!(f, "required value is missing"),
            BindingFailure::Malformed { raw, detail } => {
                write!(f, "malformed value {raw:?}: {detail}")
            }
            BindingFailure::FileArity { found } => {
                write!(f, "expected exactly one uploaded file, found {found}")
            }
        }
    }
}

/// A request-time failure to bind one parameter.
///
/// The dispatcher recovers from it by substituting the bad-request route.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingError {
    pub alias: String,
    pub target_type: TargetType,
    pub source: ParamSource,
    pub failure: BindingFailure,
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot bind `{}` ({} from {}): {}",
            self.alias, self.target_type, self.source, self.failure
        )
    }
}

impl std::error::Error for BindingError {}

/// Build-time failures while registering components or routes.
#[derive(Debug)]
pub enum RegistrationError {
    /// A plugin registration function failed; its components are omitted
    Plugin {
        name: String,
        source: anyhow::Error,
    },
    /// The table lacks one of the well-known error routes
    MissingErrorRoute { uri: &'static str },
    /// Two actions produced the same URI under the reject policy
    DuplicateRoute {
        uri: String,
        existing: String,
        replacement: String,
    },
    /// A declared parameter is inconsistent with its kind, source or type
    InvalidParamSpec {
        action: String,
        alias: String,
        reason: String,
    },
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationError::Plugin { name, source } => {
                write!(f, "plugin `{name}` failed to register: {source:#}")
            }
            RegistrationError::MissingErrorRoute { uri } => {
                write!(f, "error route {uri} is not registered")
            }
            RegistrationError::DuplicateRoute {
                uri,
                existing,
                replacement,
            } => write!(
                f,
                "duplicate route {uri}: `{replacement}` collides with `{existing}`"
            ),
            RegistrationError::InvalidParamSpec {
                action,
                alias,
                reason,
            } => write!(f, "invalid parameter `{alias}` on `{action}`: {reason}"),
        }
    }
}

impl std::error::Error for RegistrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistrationError::Plugin { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Failures reported by the server abstraction.
#[derive(Debug)]
pub enum ServerError {
    /// `start` was called while the server was not stopped
    AlreadyRunning { state: ServerState },
    /// The selected transport cannot serve the requested protocol
    UnsupportedProtocol { kind: ServerKind, protocol: Protocol },
    /// The transport could not bind its listener
    Bind { addr: String, source: io::Error },
    /// The transport coroutine ended without a stop request
    TransportExited,
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::AlreadyRunning { state } => {
                write!(f, "server cannot start while {state}")
            }
            ServerError::UnsupportedProtocol { kind, protocol } => {
                write!(f, "{kind} transport does not support the {protocol} protocol")
            }
            ServerError::Bind { addr, source } => write!(f, "failed to bind {addr}: {source}"),
            ServerError::TransportExited => write!(f, "transport exited unexpectedly"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Lifecycle phase a listener callback failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    ContextPrepared,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Starting => f.write_str("starting"),
            Phase::ContextPrepared => f.write_str("context_prepared"),
        }
    }
}

/// Fatal failure that aborts a boot attempt.
#[derive(Debug)]
pub enum BootstrapError {
    Listener {
        name: String,
        phase: Phase,
        source: anyhow::Error,
    },
    Initializer {
        name: String,
        source: anyhow::Error,
    },
    Routes(RegistrationError),
    Server(ServerError),
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapError::Listener {
                name,
                phase,
                source,
            } => write!(f, "listener `{name}` failed during {phase}: {source:#}"),
            BootstrapError::Initializer { name, source } => {
                write!(f, "context initializer `{name}` failed: {source:#}")
            }
            BootstrapError::Routes(err) => write!(f, "route table construction failed: {err}"),
            BootstrapError::Server(err) => write!(f, "server failed: {err}"),
        }
    }
}

impl std::error::Error for BootstrapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BootstrapError::Listener { source, .. } | BootstrapError::Initializer { source, .. } => {
                Some(source.as_ref())
            }
            BootstrapError::Routes(err) => Some(err),
            BootstrapError::Server(err) => Some(err),
        }
    }
}

impl From<RegistrationError> for BootstrapError {
    fn from(err: RegistrationError) -> Self {
        BootstrapError::Routes(err)
    }
}

impl From<ServerError> for BootstrapError {
    fn from(err: ServerError) -> Self {
        BootstrapError::Server(err)
    }
}
