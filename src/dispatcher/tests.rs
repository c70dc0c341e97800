use super::*;
use crate::binder::{Args, RawSources, RequestContext};
use crate::bootstrap::AppContext;
use crate::registry::{ComponentRegistry, GroupRoutes, HandlerGroup, Mapping};
use crate::router::{ErrorRoute, ParamSpec, RouteBuilder, SharedRouteTable, TargetType};
use crate::runtime_config::RuntimeConfig;
use http::Method;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Users {
    calls: AtomicUsize,
}

impl Users {
    fn get_user(&self, args: Args) -> anyhow::Result<HandlerResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let id: i64 = args.get("id")?;
        Ok(HandlerResponse::json(200, json!({ "id": id })))
    }

    fn boom(&self, _: Args) -> anyhow::Result<HandlerResponse> {
        anyhow::bail!("storage offline")
    }

    fn panics(&self, _: Args) -> anyhow::Result<HandlerResponse> {
        panic!("invariant broken")
    }

    fn private(&self, _: Args) -> anyhow::Result<HandlerResponse> {
        Err(Rejection::new(ErrorRoute::Forbidden).into())
    }

    fn whoami(&self, args: Args) -> anyhow::Result<HandlerResponse> {
        let ctx: RequestContext = args.get("ctx")?;
        let greeting = ctx.component::<String>().map(|s| s.to_string());
        Ok(HandlerResponse::json(
            200,
            json!({ "route": ctx.route, "greeting": greeting }),
        ))
    }
}

impl HandlerGroup for Users {
    fn declare(&self, group: &mut GroupRoutes<Self>) {
        group.prefix("/users");
        group
            .action("get_user", Users::get_user)
            .mapping(Mapping::get("/{id}"))
            .param(ParamSpec::path("id", TargetType::I64));
        group.action("boom", Users::boom).mapping(Mapping::get("/boom"));
        group.action("panics", Users::panics).mapping(Mapping::get("/panics"));
        group.action("private", Users::private).mapping(Mapping::get("/private"));
        group
            .action("whoami", Users::whoami)
            .mapping(Mapping::request("/me", [Method::GET, Method::POST]))
            .param(ParamSpec::context("ctx"));
    }
}

fn dispatcher_with(users: Arc<Users>) -> Dispatcher {
    let mut registry = ComponentRegistry::new();
    registry.register_shared_group(users);
    let table = RouteBuilder::new().build(&registry).unwrap();
    Dispatcher::new(SharedRouteTable::new(table))
}

fn get(dispatcher: &Dispatcher, uri: &str) -> DispatchOutcome {
    dispatcher.dispatch(DispatchRequest::new(Method::GET, uri))
}

#[test]
fn test_path_param_bound_and_handler_invoked() {
    let users = Arc::new(Users::default());
    let dispatcher = dispatcher_with(Arc::clone(&users));
    let outcome = get(&dispatcher, "/users/42");
    assert_eq!(outcome.disposition, Disposition::Handled);
    assert_eq!(outcome.response.status, 200);
    assert_eq!(outcome.response.body, json!({ "id": 42 }));
    assert_eq!(outcome.route_uri, "/users/{id}");
    assert_eq!(outcome.uri, "/users/42");
    assert_eq!(users.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_binding_failure_selects_bad_request_without_invoking() {
    let users = Arc::new(Users::default());
    let dispatcher = dispatcher_with(Arc::clone(&users));
    let outcome = get(&dispatcher, "/users/abc");
    assert_eq!(outcome.disposition, Disposition::BadRequest);
    assert_eq!(outcome.response.status, 400);
    assert_eq!(outcome.route_uri, "/error/400");
    assert_eq!(users.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unknown_uri_selects_not_found() {
    let dispatcher = dispatcher_with(Arc::default());
    let outcome = get(&dispatcher, "/nothing/here");
    assert_eq!(outcome.disposition, Disposition::NotFound);
    assert_eq!(outcome.response.status, 404);
    assert_eq!(outcome.route_uri, "/error/404");
    assert_eq!(outcome.uri, "/nothing/here");
}

#[test]
fn test_every_foreign_verb_selects_method_not_allowed() {
    let dispatcher = dispatcher_with(Arc::default());
    for method in [
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ] {
        let outcome = dispatcher.dispatch(DispatchRequest::new(method.clone(), "/users/42"));
        assert_eq!(outcome.disposition, Disposition::MethodNotAllowed, "{method}");
        assert_eq!(outcome.response.status, 405);
        assert_eq!(outcome.response.get_header("allow"), Some("GET"));
        assert_eq!(outcome.method, method);
    }
}

#[test]
fn test_method_not_allowed_body_lists_accepted_verbs() {
    let dispatcher = dispatcher_with(Arc::default());
    let outcome = dispatcher.dispatch(DispatchRequest::new(Method::DELETE, "/users/42"));
    assert_eq!(
        outcome.response.body,
        json!({ "error": "Method Not Allowed", "status": 405, "allowed": ["GET"] })
    );

    let outcome = dispatcher.dispatch(DispatchRequest::new(Method::PUT, "/users/me"));
    assert_eq!(outcome.response.body["allowed"], json!(["GET", "POST"]));
    assert_eq!(outcome.response.get_header("allow"), Some("GET, POST"));
}

#[test]
fn test_direct_request_to_method_not_allowed_route_has_no_verb_list() {
    let dispatcher = dispatcher_with(Arc::default());
    let outcome = get(&dispatcher, "/error/405");
    assert_eq!(outcome.disposition, Disposition::Handled);
    assert_eq!(
        outcome.response.body,
        json!({ "error": "Method Not Allowed", "status": 405 })
    );
}

#[test]
fn test_handler_error_selects_internal_error() {
    let dispatcher = dispatcher_with(Arc::default());
    let outcome = get(&dispatcher, "/users/boom");
    assert_eq!(outcome.disposition, Disposition::InternalError);
    assert_eq!(outcome.response.status, 500);
    assert_eq!(outcome.response.body["error"], "Internal Server Error");
}

#[test]
fn test_handler_panic_is_contained() {
    let dispatcher = dispatcher_with(Arc::default());
    let outcome = get(&dispatcher, "/users/panics");
    assert_eq!(outcome.disposition, Disposition::InternalError);
    assert_eq!(outcome.response.status, 500);
    // the dispatcher keeps working afterwards
    assert_eq!(get(&dispatcher, "/users/7").response.status, 200);
}

#[test]
fn test_rejection_selects_its_error_route() {
    let dispatcher = dispatcher_with(Arc::default());
    let outcome = get(&dispatcher, "/users/private");
    assert_eq!(outcome.disposition, Disposition::Rejected(ErrorRoute::Forbidden));
    assert_eq!(outcome.response.status, 403);
    assert_eq!(outcome.route_uri, "/error/403");
}

#[test]
fn test_context_param_reaches_app_components() {
    let app = Arc::new(AppContext::new(RuntimeConfig::default()));
    app.insert("hello from the container".to_string());
    let dispatcher = dispatcher_with(Arc::default()).with_context(app);
    let outcome = dispatcher.dispatch(
        DispatchRequest::new(Method::POST, "/users/me").with_sources(RawSources::new()),
    );
    assert_eq!(outcome.disposition, Disposition::Handled);
    assert_eq!(
        outcome.response.body,
        json!({ "route": "/users/me", "greeting": "hello from the container" })
    );
}

#[test]
fn test_failing_error_route_degrades_to_builtin_500() {
    struct BrokenErrors;
    impl HandlerGroup for BrokenErrors {
        fn declare(&self, group: &mut GroupRoutes<Self>) {
            group
                .action("broken_404", |_: &BrokenErrors, _| anyhow::bail!("cannot render"))
                .mapping(Mapping::get("/error/404"));
        }
    }

    let mut registry = ComponentRegistry::new();
    registry.register_group(BrokenErrors);
    let table = RouteBuilder::new().build(&registry).unwrap();
    let dispatcher = Dispatcher::new(SharedRouteTable::new(table));
    let outcome = get(&dispatcher, "/missing");
    assert_eq!(outcome.disposition, Disposition::NotFound);
    assert_eq!(outcome.response, ErrorRoute::InternalError.fallback_response());
}

#[test]
fn test_replaced_table_is_seen_by_later_dispatches() {
    let dispatcher = dispatcher_with(Arc::default());
    assert_eq!(get(&dispatcher, "/users/1").response.status, 200);

    let empty = RouteBuilder::new().build(&ComponentRegistry::new()).unwrap();
    dispatcher.table().replace(empty);
    assert_eq!(get(&dispatcher, "/users/1").response.status, 404);
}

#[test]
fn test_disposition_error_routes() {
    assert_eq!(Disposition::Handled.error_route(), None);
    assert_eq!(
        Disposition::Rejected(ErrorRoute::Unauthorized).error_route(),
        Some(ErrorRoute::Unauthorized)
    );
    assert_eq!(Disposition::BadRequest.to_string(), "bad-request");
}

struct Reports;

impl Reports {
    fn index(&self, _: Args) -> anyhow::Result<HandlerResponse> {
        Ok(HandlerResponse::json(200, json!({ "reports": [] })))
    }
}

impl HandlerGroup for Reports {
    fn declare(&self, group: &mut GroupRoutes<Self>) {
        group.prefix("/reports");
        group.action("index", Reports::index).mapping(Mapping::get(""));
    }
}

#[test]
fn test_empty_mapping_uri_leaves_prefix_unrouted() {
    let mut registry = ComponentRegistry::new();
    registry.register_group(Reports);
    let table = RouteBuilder::new().build(&registry).unwrap();
    assert!(!table.contains("/reports"));
    let dispatcher = Dispatcher::new(SharedRouteTable::new(table));

    for uri in ["/reports", "/reports/"] {
        let outcome = get(&dispatcher, uri);
        assert_eq!(outcome.disposition, Disposition::NotFound, "{uri}");
        assert_eq!(outcome.response.status, 404);
        assert_eq!(outcome.route_uri, "/error/404");
    }
}
