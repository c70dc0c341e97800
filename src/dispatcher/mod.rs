//! # Dispatcher Module
//!
//! The dispatcher turns one parsed request into one response. It is the only
//! component the transports call, and it never fails: lookup misses, verb
//! mismatches, binding failures and handler failures are each answered by the
//! matching error route.
//!
//! ## Request Flow
//!
//! 1. **Lookup**: resolve the URI against a snapshot of the route table. An
//!    unmatched URI selects the not-found route.
//! 2. **Verb check**: a matched route whose verb set lacks the request method
//!    selects the method-not-allowed route; the response carries an `allow`
//!    header listing the accepted verbs.
//! 3. **Bind**: the route's parameter specs are bound against the request's raw
//!    sources. A [`BindingError`](crate::error::BindingError) selects the
//!    bad-request route and the original handler is not invoked.
//! 4. **Invoke**: the handler runs under `catch_unwind`. A returned
//!    [`Rejection`] selects its error route; any other error or a panic selects
//!    the internal-error route and is logged with context.
//!
//! Error routes are invoked through the same path with no client parameters. If
//! an error route fails too, a built-in 500 response is returned.
//!
//! ## Concurrency
//!
//! `Dispatcher` is `Clone + Send + Sync`; each transport connection holds a
//! clone and dispatches in its own coroutine.

mod core;
mod response;

#[cfg(test)]
mod tests;

pub use core::{DispatchOutcome, DispatchRequest, Dispatcher, Disposition};
pub use response::{HandlerResponse, Rejection};
