//! # Switchyard
//!
//! Switchyard is a request-dispatch core built on the `may` coroutine runtime. It maps
//! incoming requests (an HTTP method and URI, or a JSON frame received over raw TCP) to
//! registered handler functions, binds request parameters to typed handler arguments, and
//! routes every failure class to a well-known error route.
//!
//! ## Architecture
//!
//! ```text
//! ComponentRegistry ──► RouteBuilder ──► RouteTable ──► SharedRouteTable
//!                                                             │
//!        Server (minihttp | maynet) ──► Dispatcher ──► Binder ─┴─► handler action
//! ```
//!
//! - [`registry`]: explicit registration of handler groups, run listeners, context
//!   initializers and plugin registration functions
//! - [`router`]: route descriptors, the route table with its error-route fallbacks, and the
//!   builder that turns handler-group declarations into routes
//! - [`binder`]: converts raw path/query/body/header/file values into typed arguments
//! - [`dispatcher`]: staged lookup, verb check, binding and invocation with error-route
//!   substitution
//! - [`server`]: the start/stop/join server abstraction and its transports
//! - [`bootstrap`]: the lifecycle sequencer that assembles all of the above
//!
//! ## Example
//!
//! ```rust,no_run
//! use switchyard::binder::Args;
//! use switchyard::bootstrap::Application;
//! use switchyard::dispatcher::HandlerResponse;
//! use switchyard::registry::{ComponentRegistry, GroupRoutes, HandlerGroup, Mapping};
//! use switchyard::router::{ParamSpec, TargetType};
//!
//! struct Users;
//!
//! impl Users {
//!     fn get_user(&self, args: Args) -> anyhow::Result<HandlerResponse> {
//!         let id: i64 = args.get("id")?;
//!         Ok(HandlerResponse::json(200, serde_json::json!({ "id": id })))
//!     }
//! }
//!
//! impl HandlerGroup for Users {
//!     fn declare(&self, group: &mut GroupRoutes<Self>) {
//!         group.prefix("/users");
//!         group
//!             .action("get_user", Users::get_user)
//!             .mapping(Mapping::get("/{id}"))
//!             .param(ParamSpec::path("id", TargetType::I64));
//!     }
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut registry = ComponentRegistry::new();
//!     registry.register_group(Users);
//!     Application::new(registry).launch()?;
//!     Ok(())
//! }
//! ```

pub mod binder;
pub mod bootstrap;
pub mod cli;
pub mod dispatcher;
pub mod echo;
pub mod error;
pub mod ids;
pub mod logging;
pub mod registry;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use binder::{Args, RawSources, RequestContext};
pub use bootstrap::{AppContext, Application};
pub use dispatcher::{DispatchOutcome, DispatchRequest, Dispatcher, HandlerResponse, Rejection};
pub use error::{BindingError, BootstrapError, RegistrationError, ServerError};
pub use registry::{ComponentRegistry, GroupRoutes, HandlerGroup, Mapping};
pub use router::{ErrorRoute, ParamSpec, RouteBuilder, RouteTable, SharedRouteTable, TargetType};
pub use server::{Protocol, Server, ServerKind};
