//! Demonstration handler group served by `switchyard serve`.

use serde_json::json;

use crate::binder::{Args, RequestContext, UploadedFile};
use crate::dispatcher::{HandlerResponse, Rejection};
use crate::registry::{ComponentRegistry, GroupRoutes, HandlerGroup, Mapping};
use crate::router::{ErrorRoute, ParamSource, ParamSpec, TargetType};

/// Echoes its inputs back as JSON under `/echo`.
#[derive(Debug, Default)]
pub struct EchoGroup;

impl EchoGroup {
    fn say(&self, args: Args) -> anyhow::Result<HandlerResponse> {
        let message: String = args.get("message")?;
        let tags: Vec<String> = args.get("tag")?;
        Ok(HandlerResponse::json(
            200,
            json!({ "message": message, "tags": tags }),
        ))
    }

    fn by_id(&self, args: Args) -> anyhow::Result<HandlerResponse> {
        let id: i64 = args.get("id")?;
        let ctx: RequestContext = args.get("ctx")?;
        Ok(HandlerResponse::json(
            200,
            json!({
                "id": id,
                "route": ctx.route,
                "request_id": ctx.request_id.to_string(),
            }),
        ))
    }

    fn post(&self, args: Args) -> anyhow::Result<HandlerResponse> {
        let body: serde_json::Value = args.get("*")?;
        Ok(HandlerResponse::json(200, json!({ "echo": body })))
    }

    fn secret(&self, args: Args) -> anyhow::Result<HandlerResponse> {
        let token: String = args.get("x-token")?;
        if token.is_empty() {
            return Err(Rejection::new(ErrorRoute::Unauthorized).into());
        }
        Ok(HandlerResponse::json(200, json!({ "secret": "switchyard" })))
    }

    fn upload(&self, args: Args) -> anyhow::Result<HandlerResponse> {
        let file: UploadedFile = args.get("file")?;
        Ok(HandlerResponse::json(
            201,
            json!({
                "file_name": file.file_name,
                "content_type": file.content_type,
                "size": file.data.len(),
            }),
        ))
    }
}

impl HandlerGroup for EchoGroup {
    fn declare(&self, group: &mut GroupRoutes<Self>) {
        group.prefix("/echo");
        group
            .action("say", EchoGroup::say)
            .mapping(Mapping::get("/"))
            .param(ParamSpec::query("message", TargetType::Str).with_default("hello"))
            .param(ParamSpec::collection("tag", ParamSource::Query, TargetType::Str).optional());
        group
            .action("by_id", EchoGroup::by_id)
            .mapping(Mapping::get("/{id}"))
            .params([
                ParamSpec::path("id", TargetType::I64),
                ParamSpec::context("ctx"),
            ]);
        group
            .action("post", EchoGroup::post)
            .mapping(Mapping::post("/"))
            .param(ParamSpec::body("*", TargetType::Json));
        group
            .action("secret", EchoGroup::secret)
            .mapping(Mapping::get("/secret"))
            .param(ParamSpec::header("x-token", TargetType::Str).optional());
        group
            .action("upload", EchoGroup::upload)
            .mapping(Mapping::post("/upload"))
            .param(ParamSpec::file("file"));
    }
}

/// Registry with the demo group registered.
pub fn registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();
    registry.register_group(EchoGroup);
    registry
}
