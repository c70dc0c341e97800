//! # CLI Module
//!
//! Command-line entry point for the `switchyard` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Boot the demo [`EchoGroup`](crate::echo::EchoGroup) application and block until
//! SIGINT or SIGTERM:
//!
//! ```bash
//! switchyard serve --addr 0.0.0.0:8080
//! switchyard serve --server-kind maynet --protocol tcp --addr 127.0.0.1:9000
//! ```
//!
//! Every option falls back to its `SWITCHYARD_*` environment variable, then to the
//! runtime configuration default.
//!
//! ### `routes`
//!
//! Print the route table built from the demo registry:
//!
//! ```bash
//! switchyard routes
//! ```

mod commands;

#[cfg(test)]
mod tests;

pub use commands::{run_cli, Cli, Commands};
