use std::any::type_name;

use super::context::AppContext;
use crate::error::BootstrapError;

/// Observer of the bootstrap lifecycle.
///
/// Callbacks run in ascending [`priority`](RunListener::priority) order, ties in
/// registration order. `starting` and `context_prepared` may abort the boot by
/// returning an error. Exactly one of `started` or `failed` is called per boot.
pub trait RunListener: Send + Sync {
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    fn priority(&self) -> i32 {
        0
    }

    /// Before the application context exists.
    fn starting(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// The context exists and every initializer has run.
    fn context_prepared(&self, _ctx: &AppContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// The server is accepting requests. Errors are logged only.
    fn started(&self, _ctx: &AppContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// The boot was aborted. `ctx` is `None` when it failed before the context
    /// was created.
    fn failed(&self, _ctx: Option<&AppContext>, _error: &BootstrapError) {}
}

/// Prepares the application context before routes are built.
pub trait ContextInitializer: Send + Sync {
    fn name(&self) -> &str {
        type_name::<Self>()
    }

    fn priority(&self) -> i32 {
        0
    }

    fn initialize(&self, ctx: &AppContext) -> anyhow::Result<()>;
}
