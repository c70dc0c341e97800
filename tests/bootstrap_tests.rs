//! Integration tests for the bootstrap sequence
//!
//! A recording listener captures every lifecycle callback so the tests can assert
//! ordering, the `started`/`failed` exclusivity and cleanup on failure.

use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchyard::binder::{Args, RequestContext};
use switchyard::bootstrap::{AppContext, Application, ContextInitializer, RunListener};
use switchyard::dispatcher::HandlerResponse;
use switchyard::error::Phase;
use switchyard::registry::{ComponentRegistry, GroupRoutes, HandlerGroup, Mapping};
use switchyard::router::{DuplicatePolicy, ParamSpec};
use switchyard::runtime_config::RuntimeConfig;
use switchyard::server::{ServerKind, ServerState};
use switchyard::BootstrapError;

mod common;
use common::fixtures::Orders;
use common::http::get;
use common::test_server::setup_may_runtime;

type Journal = Arc<Mutex<Vec<String>>>;

struct Recorder {
    name: &'static str,
    priority: i32,
    journal: Journal,
    fail_in: Option<Phase>,
    saw_context: Arc<Mutex<Option<bool>>>,
}

impl Recorder {
    fn new(name: &'static str, priority: i32, journal: &Journal) -> Self {
        Self {
            name,
            priority,
            journal: Arc::clone(journal),
            fail_in: None,
            saw_context: Arc::default(),
        }
    }

    fn failing_in(mut self, phase: Phase) -> Self {
        self.fail_in = Some(phase);
        self
    }

    fn record(&self, event: &str) {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{event}", self.name));
    }
}

impl RunListener for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn starting(&self) -> anyhow::Result<()> {
        self.record("starting");
        if self.fail_in == Some(Phase::Starting) {
            anyhow::bail!("refusing to start");
        }
        Ok(())
    }

    fn context_prepared(&self, ctx: &AppContext) -> anyhow::Result<()> {
        self.record("context_prepared");
        assert!(ctx.contains::<String>());
        if self.fail_in == Some(Phase::ContextPrepared) {
            anyhow::bail!("context rejected");
        }
        Ok(())
    }

    fn started(&self, _ctx: &AppContext) -> anyhow::Result<()> {
        self.record("started");
        Ok(())
    }

    fn failed(&self, ctx: Option<&AppContext>, _error: &BootstrapError) {
        self.record("failed");
        *self.saw_context.lock().unwrap() = Some(ctx.is_some_and(AppContext::is_closed));
    }
}

struct Greeting(&'static str);

impl ContextInitializer for Greeting {
    fn initialize(&self, ctx: &AppContext) -> anyhow::Result<()> {
        ctx.insert(self.0.to_string());
        Ok(())
    }
}

struct Hello;

impl Hello {
    fn hello(&self, args: Args) -> anyhow::Result<HandlerResponse> {
        let ctx: RequestContext = args.get("ctx")?;
        let greeting = ctx.component::<String>().map(|g| g.to_string());
        Ok(HandlerResponse::json(200, json!({ "greeting": greeting })))
    }
}

impl HandlerGroup for Hello {
    fn declare(&self, group: &mut GroupRoutes<Self>) {
        group
            .action("hello", Hello::hello)
            .mapping(Mapping::get("/hello"))
            .param(ParamSpec::context("ctx"));
    }
}

fn config(kind: ServerKind) -> RuntimeConfig {
    RuntimeConfig {
        stack_size: 0x10000,
        addr: "127.0.0.1:0".to_string(),
        server_kind: kind,
        protocol: kind.default_protocol(),
        drain_timeout: Duration::from_millis(500),
        ..RuntimeConfig::default()
    }
}

fn journal(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

#[test]
fn test_successful_boot_runs_phases_in_priority_order() {
    setup_may_runtime();
    let events = Journal::default();
    let mut registry = ComponentRegistry::new();
    registry
        .add_listener(Recorder::new("late", 10, &events))
        .add_listener(Recorder::new("early", -5, &events))
        .add_initializer(Greeting("hi there"))
        .register_group(Hello);

    let running = Application::new(registry)
        .with_config(config(ServerKind::MiniHttp))
        .run()
        .unwrap();

    assert_eq!(
        journal(&events),
        [
            "early:starting",
            "late:starting",
            "early:context_prepared",
            "late:context_prepared",
            "early:started",
            "late:started",
        ]
    );
    assert_eq!(running.server().state(), ServerState::Running);

    let reply = get(running.local_addr(), "/hello");
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json(), json!({ "greeting": "hi there" }));

    let context = Arc::clone(running.context());
    running.stop();
    running.join().unwrap();
    assert!(context.is_closed());
}

#[test]
fn test_listener_failure_in_context_prepared_aborts_boot() {
    setup_may_runtime();
    let events = Journal::default();
    let failing = Recorder::new("strict", 0, &events).failing_in(Phase::ContextPrepared);
    let saw_closed_context = Arc::clone(&failing.saw_context);
    let mut registry = ComponentRegistry::new();
    registry
        .add_listener(failing)
        .add_listener(Recorder::new("observer", 1, &events))
        .add_initializer(Greeting("unused"));

    let err = Application::new(registry)
        .with_config(config(ServerKind::MiniHttp))
        .run()
        .err()
        .unwrap();

    assert!(matches!(
        err,
        BootstrapError::Listener {
            phase: Phase::ContextPrepared,
            ..
        }
    ));
    assert_eq!(
        journal(&events),
        [
            "strict:starting",
            "observer:starting",
            "strict:context_prepared",
            "strict:failed",
            "observer:failed",
        ]
    );
    assert_eq!(*saw_closed_context.lock().unwrap(), Some(true));
}

#[test]
fn test_failure_in_starting_has_no_context() {
    setup_may_runtime();
    let events = Journal::default();
    let failing = Recorder::new("gate", 0, &events).failing_in(Phase::Starting);
    let saw_context = Arc::clone(&failing.saw_context);
    let mut registry = ComponentRegistry::new();
    registry.add_listener(failing);

    let err = Application::new(registry)
        .with_config(config(ServerKind::MayNet))
        .run()
        .err()
        .unwrap();
    assert!(matches!(err, BootstrapError::Listener { phase: Phase::Starting, .. }));
    assert_eq!(journal(&events), ["gate:starting", "gate:failed"]);
    assert_eq!(*saw_context.lock().unwrap(), Some(false));
}

#[test]
fn test_route_conflict_under_reject_fails_boot() {
    setup_may_runtime();
    let events = Journal::default();
    let mut registry = ComponentRegistry::new();
    registry
        .add_listener(Recorder::new("watch", 0, &events))
        .add_initializer(Greeting("x"))
        .register_group(Orders::default())
        .register_group(Orders::default());
    let mut cfg = config(ServerKind::MiniHttp);
    cfg.duplicate_policy = DuplicatePolicy::Reject;

    let err = Application::new(registry).with_config(cfg).run().err().unwrap();
    assert!(matches!(err, BootstrapError::Routes(_)), "{err}");
    let events = journal(&events);
    assert_eq!(events.last().map(String::as_str), Some("watch:failed"));
    assert!(!events.iter().any(|e| e.ends_with(":started")));
}

#[test]
fn test_bind_failure_reports_server_error() {
    setup_may_runtime();
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let events = Journal::default();
    let mut registry = ComponentRegistry::new();
    registry
        .add_listener(Recorder::new("watch", 0, &events))
        .add_initializer(Greeting("x"));
    let mut cfg = config(ServerKind::MayNet);
    cfg.addr = taken.local_addr().unwrap().to_string();

    let err = Application::new(registry).with_config(cfg).run().err().unwrap();
    assert!(matches!(err, BootstrapError::Server(_)), "{err}");
    assert_eq!(
        journal(&events),
        ["watch:starting", "watch:context_prepared", "watch:failed"]
    );
}
