//! The route table and its snapshot-publishing wrapper.
//!
//! Lookup never fails: an unknown URI resolves to the not-found route, which then
//! flows through the same invocation path as any other route.

use arc_swap::ArcSwap;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info};

use super::errors::{DefaultErrorGroup, ErrorRoute};
use super::radix::RadixTree;
use super::types::{Action, MethodSet, ParamVec, Route};

/// Normalize a URI: one leading separator, no empty segments, no trailing
/// separator. The root is `/`. A query string is dropped.
#[must_use]
pub fn normalize_uri(raw: &str) -> Cow<'_, str> {
    let path = raw.split('?').next().unwrap_or_default();
    let already = path.starts_with('/')
        && !path.contains("//")
        && (path == "/" || !path.ends_with('/'));
    if already {
        return Cow::Borrowed(path);
    }
    let joined = path
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    Cow::Owned(format!("/{joined}"))
}

/// Result of resolving a request path.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<Route>,
    /// Captured `{name}` segments, in path order
    pub path_params: ParamVec,
    /// False when `route` is the not-found fallback
    pub matched: bool,
}

impl RouteMatch {
    #[inline]
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Mapping from normalized URI to route, with error-route fallbacks.
#[derive(Clone)]
pub struct RouteTable {
    routes: HashMap<String, Arc<Route>>,
    /// URIs in first-registration order
    order: Vec<String>,
    tree: RadixTree,
    fallback: Arc<Route>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    /// An empty table. Until a route is put at `/error/404`, unknown URIs resolve
    /// to a built-in not-found route.
    #[must_use]
    pub fn new() -> Self {
        let fallback = Route::new(
            ErrorRoute::NotFound.uri().to_string(),
            Arc::from("DefaultErrorGroup"),
            Arc::new(DefaultErrorGroup),
            Action::new("not_found", |_: &DefaultErrorGroup, _| {
                Ok(ErrorRoute::NotFound.fallback_response())
            }),
            super::errors::all_methods().into_iter().collect::<MethodSet>(),
            Vec::new(),
        );
        Self {
            routes: HashMap::new(),
            order: Vec::new(),
            tree: RadixTree::default(),
            fallback: Arc::new(fallback),
        }
    }

    /// Insert `route` under its URI, returning the route it replaced.
    pub fn put(&mut self, route: Route) -> Option<Arc<Route>> {
        let uri = route.uri().to_string();
        let route = Arc::new(route);
        self.tree.insert(Arc::clone(&route));
        let previous = self.routes.insert(uri.clone(), route);
        if previous.is_none() {
            self.order.push(uri);
        }
        previous
    }

    /// Exact lookup by URI key; unknown keys yield the not-found route.
    #[must_use]
    pub fn get(&self, uri: &str) -> Arc<Route> {
        self.lookup(uri).unwrap_or_else(|| self.not_found())
    }

    /// Exact lookup without the fallback.
    #[must_use]
    pub fn lookup(&self, uri: &str) -> Option<Arc<Route>> {
        self.routes
            .get(uri)
            .or_else(|| self.routes.get(normalize_uri(uri).as_ref()))
            .cloned()
    }

    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        self.lookup(uri).is_some()
    }

    /// Resolve a request path: exact key first, then `{name}` templates, then
    /// the not-found route.
    #[must_use]
    pub fn resolve(&self, path: &str) -> RouteMatch {
        let start = Instant::now();
        let path = normalize_uri(path);
        let mut path_params = ParamVec::new();
        let found = match self.routes.get(path.as_ref()) {
            Some(route) => Some(Arc::clone(route)),
            None => self.tree.search(&path, &mut path_params),
        };
        let duration_us = start.elapsed().as_micros() as u64;
        match found {
            Some(route) => {
                debug!(
                    path = %path,
                    route = %route.uri(),
                    params = ?path_params,
                    duration_us,
                    "Route matched"
                );
                RouteMatch {
                    route,
                    path_params,
                    matched: true,
                }
            }
            None => {
                debug!(path = %path, duration_us, "No route matched");
                RouteMatch {
                    route: self.not_found(),
                    path_params: ParamVec::new(),
                    matched: false,
                }
            }
        }
    }

    #[must_use]
    pub fn error(&self, route: ErrorRoute) -> Arc<Route> {
        match route {
            ErrorRoute::NotFound => self.not_found(),
            other => self.get(other.uri()),
        }
    }

    #[must_use]
    pub fn bad_request(&self) -> Arc<Route> {
        self.error(ErrorRoute::BadRequest)
    }

    #[must_use]
    pub fn unauthorized(&self) -> Arc<Route> {
        self.error(ErrorRoute::Unauthorized)
    }

    #[must_use]
    pub fn forbidden(&self) -> Arc<Route> {
        self.error(ErrorRoute::Forbidden)
    }

    #[must_use]
    pub fn not_found(&self) -> Arc<Route> {
        self.routes
            .get(ErrorRoute::NotFound.uri())
            .map_or_else(|| Arc::clone(&self.fallback), Arc::clone)
    }

    #[must_use]
    pub fn method_not_allowed(&self) -> Arc<Route> {
        self.error(ErrorRoute::MethodNotAllowed)
    }

    #[must_use]
    pub fn internal_error(&self) -> Arc<Route> {
        self.error(ErrorRoute::InternalError)
    }

    /// Routes in first-registration order.
    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> + '_ {
        self.order.iter().filter_map(|uri| self.routes.get(uri))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.routes()).finish()
    }
}

/// A route table published for concurrent readers.
///
/// Readers take a snapshot with [`SharedRouteTable::load`] and keep it for the
/// whole request. Writers build a complete replacement off to the side and swap
/// it in; swaps are serialized so a reload never interleaves with another.
#[derive(Clone)]
pub struct SharedRouteTable {
    current: Arc<ArcSwap<RouteTable>>,
    writer: Arc<Mutex<()>>,
}

impl SharedRouteTable {
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
            writer: Arc::new(Mutex::new(())),
        }
    }

    #[inline]
    #[must_use]
    pub fn load(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    /// Publish `table`, returning the snapshot it replaced.
    pub fn replace(&self, table: RouteTable) -> Arc<RouteTable> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.current.swap(Arc::new(table));
        info!(
            previous_routes = previous.len(),
            routes = self.current.load().len(),
            "Route table replaced"
        );
        previous
    }

    /// Build a replacement from the current snapshot and publish it. Nothing is
    /// published when `rebuild` fails.
    pub fn update<E>(
        &self,
        rebuild: impl FnOnce(&RouteTable) -> Result<RouteTable, E>,
    ) -> Result<Arc<RouteTable>, E> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let next = rebuild(&self.current.load())?;
        let previous = self.current.swap(Arc::new(next));
        info!(previous_routes = previous.len(), "Route table updated");
        Ok(previous)
    }
}

impl std::fmt::Debug for SharedRouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedRouteTable")
            .field("routes", &self.current.load().len())
            .finish()
    }
}
