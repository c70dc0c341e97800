//! # Bootstrap Module
//!
//! The bootstrap sequencer assembles an application from a
//! [`ComponentRegistry`](crate::registry::ComponentRegistry) and drives the
//! lifecycle listeners through it.
//!
//! ## Sequence
//!
//! 1. `starting()` on every [`RunListener`], ascending priority
//! 2. [`AppContext`] created from the runtime configuration
//! 3. every [`ContextInitializer`], ascending priority
//! 4. `context_prepared(ctx)`
//! 5. route table built and published
//! 6. dispatcher and server constructed, server started
//! 7. `started(ctx)`
//!
//! A failure in steps 1 to 6 aborts the boot: the server is stopped if it was
//! started, the context is closed and every listener gets `failed(ctx, err)`.
//! `started` and `failed` are never both called.

mod application;
mod context;
mod listener;

pub use application::{Application, Running};
pub use context::AppContext;
pub use listener::{ContextInitializer, RunListener};
