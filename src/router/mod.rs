//! # Router Module
//!
//! The router module owns the route table: the process-wide mapping from a
//! normalized URI to a [`Route`] (the handler-group instance, the action to call on
//! it, the accepted verbs, and the positional parameter specs).
//!
//! ## Overview
//!
//! - [`RouteBuilder`] turns the handler groups of a
//!   [`ComponentRegistry`](crate::registry::ComponentRegistry) into a table. It
//!   always registers the default error routes first.
//! - [`RouteTable`] answers lookups. `get` never fails: unknown URIs yield the
//!   not-found route. `resolve` also matches `{name}` template segments.
//! - [`SharedRouteTable`] publishes a built table to concurrent readers and
//!   supports whole-table replacement.
//!
//! ## Error routes
//!
//! | Route | URI |
//! |---|---|
//! | bad request | `/error/400` |
//! | unauthorized | `/error/401` |
//! | forbidden | `/error/403` |
//! | not found | `/error/404` |
//! | method not allowed | `/error/405` |
//! | internal error | `/error/500` |
//!
//! ## URI rules
//!
//! Route URIs start with `/`, have no empty segments and no trailing `/` (the root
//! is `/`). Final URI = normalized group prefix + normalized mapping suffix. A
//! mapping with an empty suffix registers nothing.

mod builder;
mod errors;
mod radix;
mod table;
mod types;


pub use builder::{join_uri, normalize_prefix, DuplicatePolicy, RouteBuilder};
pub use errors::{DefaultErrorGroup, ErrorRoute, ERROR_PREFIX};
pub use table::{normalize_uri, RouteMatch, RouteTable, SharedRouteTable};
pub use types::{
    Action, Invoker, MethodSet, ParamKind, ParamSource, ParamSpec, ParamVec, Route, TargetType,
    MAX_INLINE_PARAMS,
};
