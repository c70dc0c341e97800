//! Component registry and the explicit route registration protocol.
//!
//! Handler groups describe their routes in code through [`HandlerGroup::declare`]:
//! a group-level URI prefix, and for each action a verb mapping and an ordered list
//! of parameter specs. The registry also carries the run listeners and context
//! initializers consumed by the bootstrap sequence.
//!
//! ```rust
//! use switchyard::binder::Args;
//! use switchyard::dispatcher::HandlerResponse;
//! use switchyard::registry::{ComponentRegistry, GroupRoutes, HandlerGroup, Mapping};
//! use switchyard::router::{ParamSource, ParamSpec, TargetType};
//!
//! struct Pets;
//!
//! impl Pets {
//!     fn search(&self, args: Args) -> anyhow::Result<HandlerResponse> {
//!         let tags: Vec<String> = args.get("tag")?;
//!         Ok(HandlerResponse::json(200, serde_json::json!({ "tags": tags })))
//!     }
//! }
//!
//! impl HandlerGroup for Pets {
//!     fn declare(&self, group: &mut GroupRoutes<Self>) {
//!         group.prefix("pets");
//!         group
//!             .action("search", Pets::search)
//!             .mapping(Mapping::get("/search"))
//!             .param(ParamSpec::collection("tag", ParamSource::Query, TargetType::Str));
//!     }
//! }
//!
//! let mut registry = ComponentRegistry::new();
//! registry.register_group(Pets);
//! assert_eq!(registry.handler_groups().len(), 1);
//! ```

use http::Method;
use std::any::{type_name, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::binder::Args;
use crate::bootstrap::{ContextInitializer, RunListener};
use crate::dispatcher::HandlerResponse;
use crate::error::RegistrationError;
use crate::router::{Action, Invoker, MethodSet, ParamSpec};

/// A set of related handler functions sharing a URI prefix.
pub trait HandlerGroup: Send + Sync + Sized + 'static {
    /// Describe this group's prefix and actions.
    fn declare(&self, group: &mut GroupRoutes<Self>);

    /// Name used in logs and route listings.
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

/// Which declarative mapping an action carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    /// Explicit verb set, possibly several verbs or none
    Request,
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// Method-level mapping: URI suffix plus accepted verbs.
#[derive(Debug, Clone, PartialEq)]
pub struct Mapping {
    pub kind: MappingKind,
    pub uri: String,
    pub methods: MethodSet,
}

impl Mapping {
    fn verb(kind: MappingKind, uri: &str, method: Method) -> Self {
        let mut methods = MethodSet::new();
        methods.push(method);
        Self {
            kind,
            uri: uri.to_string(),
            methods,
        }
    }

    /// Generic mapping with an explicit verb set. An empty set rejects every verb.
    pub fn request(uri: &str, methods: impl IntoIterator<Item = Method>) -> Self {
        Self {
            kind: MappingKind::Request,
            uri: uri.to_string(),
            methods: methods.into_iter().collect(),
        }
    }

    pub fn get(uri: &str) -> Self {
        Self::verb(MappingKind::Get, uri, Method::GET)
    }

    pub fn post(uri: &str) -> Self {
        Self::verb(MappingKind::Post, uri, Method::POST)
    }

    pub fn put(uri: &str) -> Self {
        Self::verb(MappingKind::Put, uri, Method::PUT)
    }

    pub fn patch(uri: &str) -> Self {
        Self::verb(MappingKind::Patch, uri, Method::PATCH)
    }

    pub fn delete(uri: &str) -> Self {
        Self::verb(MappingKind::Delete, uri, Method::DELETE)
    }
}

/// One declared action: the erased function, its mapping and parameter specs.
#[derive(Debug, Clone)]
pub struct ActionDecl {
    pub action: Action,
    pub mapping: Option<Mapping>,
    pub params: Vec<ParamSpec>,
}

impl ActionDecl {
    /// Route this action. Actions without a mapping are not routes.
    pub fn mapping(&mut self, mapping: Mapping) -> &mut Self {
        self.mapping = Some(mapping);
        self
    }

    /// Append the next positional parameter.
    pub fn param(&mut self, spec: ParamSpec) -> &mut Self {
        self.params.push(spec);
        self
    }

    pub fn params(&mut self, specs: impl IntoIterator<Item = ParamSpec>) -> &mut Self {
        self.params.extend(specs);
        self
    }
}

/// Collects a handler group's declaration.
pub struct GroupRoutes<G> {
    prefix: Option<String>,
    actions: Vec<ActionDecl>,
    _group: PhantomData<fn() -> G>,
}

impl<G: HandlerGroup> GroupRoutes<G> {
    fn new() -> Self {
        Self {
            prefix: None,
            actions: Vec::new(),
            _group: PhantomData,
        }
    }

    /// Group-level URI prefix. Normalized by the route builder.
    pub fn prefix(&mut self, prefix: &str) -> &mut Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    /// Expose `f` as an action named `name`.
    pub fn action<F>(&mut self, name: &str, f: F) -> &mut ActionDecl
    where
        F: Fn(&G, Args) -> anyhow::Result<HandlerResponse> + Send + Sync + 'static,
    {
        let index = self.actions.len();
        self.actions.push(ActionDecl {
            action: Action::new(name, f),
            mapping: None,
            params: Vec::new(),
        });
        &mut self.actions[index]
    }
}

/// A handler group's declaration with its type erased.
#[derive(Debug)]
pub struct GroupDeclaration {
    pub name: Arc<str>,
    pub type_id: TypeId,
    pub prefix: Option<String>,
    pub actions: Vec<ActionDecl>,
    pub invoker: Invoker,
}

/// Declaration of a single group instance.
pub(crate) fn declare<G: HandlerGroup>(group: Arc<G>) -> GroupDeclaration {
    Registered(group).declaration()
}

trait DeclareRoutes: Send + Sync {
    fn declaration(&self) -> GroupDeclaration;
}

struct Registered<G>(Arc<G>);

impl<G: HandlerGroup> DeclareRoutes for Registered<G> {
    fn declaration(&self) -> GroupDeclaration {
        let mut routes = GroupRoutes::<G>::new();
        self.0.declare(&mut routes);
        let invoker: Invoker = Arc::clone(&self.0) as Invoker;
        GroupDeclaration {
            name: Arc::from(self.0.name()),
            type_id: TypeId::of::<G>(),
            prefix: routes.prefix,
            actions: routes.actions,
            invoker,
        }
    }
}

/// Registry of the components an application is assembled from.
#[derive(Default)]
pub struct ComponentRegistry {
    groups: Vec<Arc<dyn DeclareRoutes>>,
    listeners: Vec<Arc<dyn RunListener>>,
    initializers: Vec<Arc<dyn ContextInitializer>>,
    failures: Vec<RegistrationError>,
}

impl ComponentRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_group<G: HandlerGroup>(&mut self, group: G) -> &mut Self {
        self.register_shared_group(Arc::new(group))
    }

    /// Register a group instance that other components also hold.
    pub fn register_shared_group<G: HandlerGroup>(&mut self, group: Arc<G>) -> &mut Self {
        debug!(group = %group.name(), "Handler group registered");
        self.groups.push(Arc::new(Registered(group)));
        self
    }

    pub fn add_listener(&mut self, listener: impl RunListener + 'static) -> &mut Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn add_initializer(&mut self, initializer: impl ContextInitializer + 'static) -> &mut Self {
        self.initializers.push(Arc::new(initializer));
        self
    }

    /// Run a plugin registration function against a scratch registry.
    ///
    /// On success everything it registered is merged in. On failure the error is
    /// logged and recorded, and none of the plugin's components are kept.
    pub fn register_plugin<F>(&mut self, name: &str, plugin: F) -> &mut Self
    where
        F: FnOnce(&mut ComponentRegistry) -> anyhow::Result<()>,
    {
        let mut scratch = ComponentRegistry::new();
        match plugin(&mut scratch) {
            Ok(()) => {
                debug!(
                    plugin = %name,
                    groups = scratch.groups.len(),
                    listeners = scratch.listeners.len(),
                    initializers = scratch.initializers.len(),
                    "Plugin registered"
                );
                self.groups.append(&mut scratch.groups);
                self.listeners.append(&mut scratch.listeners);
                self.initializers.append(&mut scratch.initializers);
                self.failures.append(&mut scratch.failures);
            }
            Err(source) => {
                warn!(plugin = %name, error = %format!("{source:#}"), "Plugin registration failed, components omitted");
                self.failures.push(RegistrationError::Plugin {
                    name: name.to_string(),
                    source,
                });
            }
        }
        self
    }

    /// Declarations of every registered handler group, in registration order.
    #[must_use]
    pub fn handler_groups(&self) -> Vec<GroupDeclaration> {
        self.groups.iter().map(|g| g.declaration()).collect()
    }

    /// Run listeners ordered by ascending priority; ties keep registration order.
    #[must_use]
    pub fn run_listeners(&self) -> Vec<Arc<dyn RunListener>> {
        let mut listeners = self.listeners.clone();
        listeners.sort_by_key(|l| l.priority());
        listeners
    }

    /// Context initializers ordered like [`ComponentRegistry::run_listeners`].
    #[must_use]
    pub fn context_initializers(&self) -> Vec<Arc<dyn ContextInitializer>> {
        let mut initializers = self.initializers.clone();
        initializers.sort_by_key(|i| i.priority());
        initializers
    }

    /// Non-fatal registration failures collected so far.
    #[must_use]
    pub fn registration_failures(&self) -> &[RegistrationError] {
        &self.failures
    }
}

impl std::fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("groups", &self.groups.len())
            .field("listeners", &self.listeners.len())
            .field("initializers", &self.initializers.len())
            .field("failures", &self.failures)
            .finish()
    }
}
