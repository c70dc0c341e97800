use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use crate::runtime_config::RuntimeConfig;

type Extension = Arc<dyn Any + Send + Sync>;

/// The application container assembled during bootstrap.
///
/// Holds the runtime configuration plus shared components keyed by type.
/// Context initializers fill it; handlers reach it through `context`
/// parameters.
pub struct AppContext {
    config: RuntimeConfig,
    extensions: RwLock<HashMap<TypeId, Extension>>,
    closed: AtomicBool,
}

impl AppContext {
    #[must_use]
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            extensions: RwLock::new(HashMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Store a shared component, returning the one it replaced.
    pub fn insert<T: Send + Sync + 'static>(&self, value: T) -> Option<Arc<T>> {
        self.insert_shared(Arc::new(value))
    }

    pub fn insert_shared<T: Send + Sync + 'static>(&self, value: Arc<T>) -> Option<Arc<T>> {
        let mut extensions = self
            .extensions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        extensions
            .insert(TypeId::of::<T>(), value)
            .and_then(|previous| previous.downcast::<T>().ok())
    }

    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let extensions = self.extensions.read().unwrap_or_else(PoisonError::into_inner);
        extensions
            .get(&TypeId::of::<T>())
            .and_then(|value| Arc::clone(value).downcast::<T>().ok())
    }

    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        let extensions = self.extensions.read().unwrap_or_else(PoisonError::into_inner);
        extensions.contains_key(&TypeId::of::<T>())
    }

    /// Release every component. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let released = {
            let mut extensions = self
                .extensions
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let count = extensions.len();
            extensions.clear();
            count
        };
        info!(components = released, "Application context closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for AppContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components = self
            .extensions
            .read()
            .map(|e| e.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len());
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("components", &components)
            .field("closed", &self.is_closed())
            .finish()
    }
}
