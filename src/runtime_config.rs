//! # Runtime Configuration Module
//!
//! Environment variable based configuration for the coroutine runtime, the
//! server selection and the route builder.
//!
//! ## Environment Variables
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `SWITCHYARD_STACK_SIZE` | coroutine stack size, decimal or `0x` hex | `0x4000` |
//! | `SWITCHYARD_WORKERS` | may worker threads, `0` keeps the may default | `0` |
//! | `SWITCHYARD_ADDR` | bind address | `127.0.0.1:8080` |
//! | `SWITCHYARD_SERVER_KIND` | `minihttp` or `maynet` | `minihttp` |
//! | `SWITCHYARD_PROTOCOL` | `http` or `tcp` | `http` |
//! | `SWITCHYARD_DRAIN_TIMEOUT_MS` | how long `stop` waits for in-flight requests | `5000` |
//! | `SWITCHYARD_DUPLICATE_ROUTES` | `overwrite` or `reject` | `overwrite` |
//!
//! Invalid values are logged and replaced by the default.
//!
//! ## Usage
//!
//! ```rust
//! use switchyard::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! assert!(config.stack_size > 0);
//! ```
//!
//! Recommended stack sizes:
//! - Simple handlers: `0x4000` (16 KB)
//! - Complex logic: `0x8000` (32 KB)
//! - Deep recursion: `0x10000` (64 KB)

use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

use crate::router::DuplicatePolicy;
use crate::server::{Protocol, ServerKind};

pub const DEFAULT_STACK_SIZE: usize = 0x4000;
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    /// may worker threads; 0 leaves the runtime default
    pub workers: usize,
    pub addr: String,
    pub server_kind: ServerKind,
    pub protocol: Protocol,
    pub drain_timeout: Duration,
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            workers: 0,
            addr: DEFAULT_ADDR.to_string(),
            server_kind: ServerKind::default(),
            protocol: Protocol::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let stack_size = lookup("SWITCHYARD_STACK_SIZE")
            .map(|val| match parse_size(&val) {
                Some(size) if size > 0 => size,
                _ => {
                    warn!(
                        variable = "SWITCHYARD_STACK_SIZE",
                        value = %val,
                        "Invalid stack size, using default"
                    );
                    defaults.stack_size
                }
            })
            .unwrap_or(defaults.stack_size);

        let drain_ms = parse_or(
            &lookup,
            "SWITCHYARD_DRAIN_TIMEOUT_MS",
            defaults.drain_timeout.as_millis() as u64,
        );

        Self {
            stack_size,
            workers: parse_or(&lookup, "SWITCHYARD_WORKERS", defaults.workers),
            addr: lookup("SWITCHYARD_ADDR")
                .filter(|addr| !addr.trim().is_empty())
                .unwrap_or(defaults.addr),
            server_kind: parse_or(&lookup, "SWITCHYARD_SERVER_KIND", defaults.server_kind),
            protocol: parse_or(&lookup, "SWITCHYARD_PROTOCOL", defaults.protocol),
            drain_timeout: Duration::from_millis(drain_ms),
            duplicate_policy: parse_or(
                &lookup,
                "SWITCHYARD_DUPLICATE_ROUTES",
                defaults.duplicate_policy,
            ),
        }
    }

    /// Push the coroutine settings into the may runtime.
    pub fn apply(&self) {
        let config = may::config();
        config.set_stack_size(self.stack_size);
        if self.workers > 0 {
            config.set_workers(self.workers);
        }
        info!(
            stack_size = self.stack_size,
            workers = self.workers,
            "Coroutine runtime configured"
        );
    }
}

fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        None => default,
        Some(val) => val.trim().parse().unwrap_or_else(|err: T::Err| {
            warn!(variable = key, value = %val, error = %err, "Invalid value, using default");
            default
        }),
    }
}
