use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use super::context::AppContext;
use super::listener::RunListener;
use crate::dispatcher::Dispatcher;
use crate::error::{BootstrapError, Phase, RegistrationError};
use crate::registry::ComponentRegistry;
use crate::router::{RouteBuilder, RouteTable, SharedRouteTable};
use crate::runtime_config::RuntimeConfig;
use crate::server::Server;

/// An application assembled from a component registry.
#[derive(Debug)]
pub struct Application {
    registry: ComponentRegistry,
    config: RuntimeConfig,
}

impl Application {
    /// Application with configuration read from the environment.
    #[must_use]
    pub fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry,
            config: RuntimeConfig::from_env(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Build the route table this application would serve, without booting.
    pub fn build_routes(&self) -> Result<RouteTable, RegistrationError> {
        RouteBuilder::with_policy(self.config.duplicate_policy).build(&self.registry)
    }

    /// Boot the application and block until the server shuts down.
    pub fn launch(self) -> Result<(), BootstrapError> {
        self.run()?.join()
    }

    /// Boot the application: notify `starting`, assemble the context, run the
    /// initializers, notify `context_prepared`, build the route table, start the
    /// server and notify `started`.
    ///
    /// On failure every listener gets `failed`, the context is closed and a
    /// partially started server is stopped. No partial serving state survives.
    pub fn run(self) -> Result<Running, BootstrapError> {
        let boot_start = Instant::now();
        let listeners = self.registry.run_listeners();
        let failures = self.registry.registration_failures();
        if !failures.is_empty() {
            warn!(
                failures = failures.len(),
                "Some components failed to register and were omitted"
            );
        }

        self.config.apply();
        info!(
            listeners = listeners.len(),
            groups = self.registry.handler_groups().len(),
            "Application starting"
        );
        for listener in &listeners {
            if let Err(source) = listener.starting() {
                let err = BootstrapError::Listener {
                    name: listener.name().to_string(),
                    phase: Phase::Starting,
                    source,
                };
                return Err(abort(&listeners, None, None, err));
            }
        }

        let ctx = Arc::new(AppContext::new(self.config.clone()));
        let table = match self.prepare(&listeners, &ctx) {
            Ok(table) => table,
            Err(err) => return Err(abort(&listeners, Some(&*ctx), None, err)),
        };

        let dispatcher = Dispatcher::new(table.clone()).with_context(Arc::clone(&ctx));
        let server = Server::new(self.config.server_kind, &self.config.addr, dispatcher)
            .with_drain_timeout(self.config.drain_timeout);
        let addr = match server.start(self.config.protocol) {
            Ok(addr) => addr,
            Err(err) => return Err(abort(&listeners, Some(&*ctx), Some(&server), err.into())),
        };

        for listener in &listeners {
            if let Err(err) = listener.started(&ctx) {
                warn!(
                    listener = %listener.name(),
                    error = %format!("{err:#}"),
                    "Run listener failed in started"
                );
            }
        }
        info!(
            addr = %addr,
            server_kind = %self.config.server_kind,
            protocol = %self.config.protocol,
            startup_ms = boot_start.elapsed().as_millis() as u64,
            "Application started"
        );

        Ok(Running {
            context: ctx,
            server,
            table,
            addr,
        })
    }

    fn prepare(
        &self,
        listeners: &[Arc<dyn RunListener>],
        ctx: &AppContext,
    ) -> Result<SharedRouteTable, BootstrapError> {
        for initializer in self.registry.context_initializers() {
            initializer
                .initialize(ctx)
                .map_err(|source| BootstrapError::Initializer {
                    name: initializer.name().to_string(),
                    source,
                })?;
            debug!(initializer = %initializer.name(), "Context initializer applied");
        }
        info!("Application context prepared");

        for listener in listeners {
            listener
                .context_prepared(ctx)
                .map_err(|source| BootstrapError::Listener {
                    name: listener.name().to_string(),
                    phase: Phase::ContextPrepared,
                    source,
                })?;
        }

        Ok(SharedRouteTable::new(self.build_routes()?))
    }
}

fn abort(
    listeners: &[Arc<dyn RunListener>],
    ctx: Option<&AppContext>,
    server: Option<&Server>,
    err: BootstrapError,
) -> BootstrapError {
    error!(error = %err, "Application failed to start");
    if let Some(server) = server {
        if !server.is_stopped() {
            server.stop();
        }
    }
    if let Some(ctx) = ctx {
        ctx.close();
    }
    for listener in listeners {
        listener.failed(ctx, &err);
    }
    err
}

/// Handle to a booted application.
#[derive(Debug)]
pub struct Running {
    context: Arc<AppContext>,
    server: Server,
    table: SharedRouteTable,
    addr: SocketAddr,
}

impl Running {
    #[must_use]
    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    #[must_use]
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// The published route table; `replace` on it re-initializes routing.
    #[must_use]
    pub fn table(&self) -> &SharedRouteTable {
        &self.table
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Gracefully stop the server. `join` then returns.
    pub fn stop(&self) {
        self.server.stop();
    }

    /// Block until the server shuts down, then close the context.
    pub fn join(self) -> Result<(), BootstrapError> {
        let result = self.server.join();
        self.context.close();
        match &result {
            Ok(()) => info!("Application stopped"),
            Err(err) => error!(error = %err, "Application stopped unexpectedly"),
        }
        result.map_err(BootstrapError::from)
    }
}
