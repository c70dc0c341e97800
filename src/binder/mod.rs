//! # Parameter Binder
//!
//! Converts the raw values a transport extracted from a request into the typed
//! arguments a route's action expects.
//!
//! Binding walks the route's [`ParamSpec`]s in order. Each spec names a source
//! (path, query, body, header, form-file or request context) and an alias to look
//! up there, and a kind that decides the coercion strategy:
//!
//! - **scalar**: one raw value coerced to `target_type`
//! - **array**: every raw value under the alias, each split on `,`, each element
//!   coerced to `element_type`
//! - **collection**: every raw value under the alias (e.g., repeated query keys),
//!   each coerced to `element_type`
//! - **file**: exactly one uploaded file under the alias
//!
//! Context parameters never read client text: they receive the ambient
//! [`RequestContext`]. Specs are bound independently of each other, and the first
//! failure aborts binding with a [`BindingError`] naming the parameter.
//!
//! Absent values resolve in this order: the parameter's default text, the target type's
//! zero value when the parameter is optional, otherwise [`BindingFailure::Missing`].

mod args;
mod sources;

pub use args::{ArgError, Args, BoundValue, FromBound};
pub use sources::{Body, HeaderVec, RawSources, RequestContext, UploadedFile, MAX_INLINE_HEADERS};

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use std::borrow::Cow;

use crate::error::{BindingError, BindingFailure};
use crate::router::{ParamKind, ParamSource, ParamSpec, TargetType};

/// Alias that binds a body parameter to the entire request body.
pub const WHOLE_BODY: &str = "*";

/// One raw value before coercion.
#[derive(Debug, Clone)]
enum Raw<'a> {
    Text(Cow<'a, str>),
    Json(&'a Value),
}

impl Raw<'_> {
    fn display(&self) -> String {
        match self {
            Raw::Text(text) => text.to_string(),
            Raw::Json(value) => value.to_string(),
        }
    }
}

/// Bind every spec against `sources`, in order.
pub fn bind(
    specs: &[ParamSpec],
    sources: &RawSources,
    ctx: &RequestContext,
) -> Result<Args, BindingError> {
    let mut args = Args::with_capacity(specs.len());
    for spec in specs {
        let value = bind_one(spec, sources, ctx).map_err(|failure| BindingError {
            alias: spec.alias.clone(),
            target_type: spec.target_type,
            source: spec.source,
            failure,
        })?;
        args.push(&spec.alias, value);
    }
    Ok(args)
}

fn bind_one(
    spec: &ParamSpec,
    sources: &RawSources,
    ctx: &RequestContext,
) -> Result<BoundValue, BindingFailure> {
    match spec.kind {
        _ if spec.source == ParamSource::Context => Ok(BoundValue::Context(ctx.clone())),
        ParamKind::File => bind_file(spec, sources),
        ParamKind::Scalar => {
            let raw = lookup(spec.source, &spec.alias, sources).pop();
            match raw {
                Some(raw) => coerce(&raw, spec.target_type),
                None => absent(spec),
            }
        }
        ParamKind::Array | ParamKind::Collection => {
            let element = spec.element_type.unwrap_or(TargetType::Str);
            let raws = lookup(spec.source, &spec.alias, sources);
            if raws.is_empty() {
                return absent(spec);
            }
            let mut items = Vec::with_capacity(raws.len());
            for raw in raws {
                for part in explode(spec.kind, raw) {
                    items.push(coerce(&part, element)?);
                }
            }
            Ok(BoundValue::List(items))
        }
    }
}

fn bind_file(spec: &ParamSpec, sources: &RawSources) -> Result<BoundValue, BindingFailure> {
    let mut files = sources.files.iter().filter(|f| f.field == spec.alias);
    match (files.next(), files.count()) {
        (Some(file), 0) => Ok(BoundValue::File(file.clone())),
        (None, _) if spec.optional => Ok(BoundValue::Missing),
        (None, _) => Err(BindingFailure::FileArity { found: 0 }),
        (Some(_), extra) => Err(BindingFailure::FileArity { found: extra + 1 }),
    }
}

/// Split array elements on `,`; collections keep each raw value whole.
fn explode(kind: ParamKind, raw: Raw<'_>) -> Vec<Raw<'_>> {
    match (kind, raw) {
        (ParamKind::Array, Raw::Text(text)) => text
            .split(',')
            .map(|part| Raw::Text(Cow::Owned(part.trim().to_string())))
            .collect(),
        (ParamKind::Array | ParamKind::Collection, Raw::Json(Value::Array(items))) => {
            items.iter().map(Raw::Json).collect()
        }
        (_, raw) => vec![raw],
    }
}

/// Every raw value under `alias` in `source`, in arrival order. Scalars use the
/// last one.
fn lookup<'a>(source: ParamSource, alias: &str, sources: &'a RawSources) -> Vec<Raw<'a>> {
    match source {
        ParamSource::Path => sources
            .path
            .iter()
            .filter(|(k, _)| k.as_ref() == alias)
            .map(|(_, v)| Raw::Text(Cow::Borrowed(v.as_str())))
            .collect(),
        ParamSource::Query => sources
            .query
            .iter()
            .filter(|(k, _)| k.as_ref() == alias)
            .map(|(_, v)| Raw::Text(Cow::Borrowed(v.as_str())))
            .collect(),
        ParamSource::Header => sources
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(alias))
            .map(|(_, v)| Raw::Text(Cow::Borrowed(v.as_str())))
            .collect(),
        ParamSource::Body => lookup_body(alias, &sources.body),
        ParamSource::FormFile | ParamSource::Context => Vec::new(),
    }
}

fn lookup_body<'a>(alias: &str, body: &'a Body) -> Vec<Raw<'a>> {
    match body {
        Body::Empty => Vec::new(),
        Body::Json(value) if alias == WHOLE_BODY => vec![Raw::Json(value)],
        Body::Json(value) => match value.get(alias) {
            Some(Value::Null) | None => Vec::new(),
            Some(field) => vec![Raw::Json(field)],
        },
        Body::Form(pairs) if alias == WHOLE_BODY => {
            let text = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter())
                .finish();
            vec![Raw::Text(Cow::Owned(text))]
        }
        Body::Form(pairs) => pairs
            .iter()
            .filter(|(k, _)| k == alias)
            .map(|(_, v)| Raw::Text(Cow::Borrowed(v.as_str())))
            .collect(),
        Body::Text(text) if alias == WHOLE_BODY => vec![Raw::Text(Cow::Borrowed(text.as_str()))],
        Body::Text(_) => Vec::new(),
    }
}

fn absent(spec: &ParamSpec) -> Result<BoundValue, BindingFailure> {
    if let Some(default) = &spec.default {
        let target = spec.element_type.unwrap_or(spec.target_type);
        let raw = Raw::Text(Cow::Borrowed(default.as_str()));
        if spec.target_type == TargetType::List {
            let items = explode(ParamKind::Array, raw)
                .iter()
                .map(|part| coerce(part, target))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(BoundValue::List(items));
        }
        return coerce(&raw, target);
    }
    if spec.optional {
        return Ok(zero_value(spec.target_type).unwrap_or(BoundValue::Missing));
    }
    Err(BindingFailure::Missing)
}

/// Zero value for optional parameters; `None` for types that have none.
fn zero_value(target: TargetType) -> Option<BoundValue> {
    Some(match target {
        TargetType::Str => BoundValue::Str(String::new()),
        TargetType::Bool => BoundValue::Bool(false),
        TargetType::I32 => BoundValue::I32(0),
        TargetType::I64 => BoundValue::I64(0),
        TargetType::U32 => BoundValue::U32(0),
        TargetType::U64 => BoundValue::U64(0),
        TargetType::F32 => BoundValue::F32(0.0),
        TargetType::F64 => BoundValue::F64(0.0),
        TargetType::Json => BoundValue::Json(Value::Null),
        TargetType::List => BoundValue::List(Vec::new()),
        TargetType::Date | TargetType::DateTime | TargetType::File | TargetType::Context => {
            return None
        }
    })
}

fn malformed(raw: &Raw<'_>, detail: impl ToString) -> BindingFailure {
    BindingFailure::Malformed {
        raw: raw.display(),
        detail: detail.to_string(),
    }
}

fn coerce(raw: &Raw<'_>, target: TargetType) -> Result<BoundValue, BindingFailure> {
    match raw {
        Raw::Text(text) => coerce_text(raw, text.trim(), target),
        Raw::Json(value) => coerce_json(raw, value, target),
    }
}

fn parse<T>(raw: &Raw<'_>, text: &str) -> Result<T, BindingFailure>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    text.parse::<T>().map_err(|e| malformed(raw, e))
}

fn coerce_text(raw: &Raw<'_>, text: &str, target: TargetType) -> Result<BoundValue, BindingFailure> {
    Ok(match target {
        TargetType::Str => match raw {
            Raw::Text(original) => BoundValue::Str(original.to_string()),
            Raw::Json(_) => BoundValue::Str(text.to_string()),
        },
        TargetType::Bool => match text.to_ascii_lowercase().as_str() {
            "true" | "1" => BoundValue::Bool(true),
            "false" | "0" => BoundValue::Bool(false),
            _ => return Err(malformed(raw, "expected true, false, 1 or 0")),
        },
        TargetType::I32 => BoundValue::I32(parse(raw, text)?),
        TargetType::I64 => BoundValue::I64(parse(raw, text)?),
        TargetType::U32 => BoundValue::U32(parse(raw, text)?),
        TargetType::U64 => BoundValue::U64(parse(raw, text)?),
        TargetType::F32 => BoundValue::F32(parse(raw, text)?),
        TargetType::F64 => BoundValue::F64(parse(raw, text)?),
        TargetType::Date => BoundValue::Date(
            NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|e| malformed(raw, e))?,
        ),
        TargetType::DateTime => BoundValue::DateTime(
            DateTime::parse_from_rfc3339(text).map_err(|e| malformed(raw, e))?,
        ),
        TargetType::Json => BoundValue::Json(
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
        ),
        TargetType::File | TargetType::Context | TargetType::List => {
            return Err(malformed(raw, format!("{target} cannot be read from text")))
        }
    })
}

fn coerce_json(raw: &Raw<'_>, value: &Value, target: TargetType) -> Result<BoundValue, BindingFailure> {
    match (target, value) {
        (TargetType::Json, v) => Ok(BoundValue::Json(v.clone())),
        (TargetType::Str, Value::String(s)) => Ok(BoundValue::Str(s.clone())),
        (_, Value::String(s)) => coerce_text(raw, s.trim(), target),
        (TargetType::Str, Value::Number(n)) => Ok(BoundValue::Str(n.to_string())),
        (TargetType::Str, Value::Bool(b)) => Ok(BoundValue::Str(b.to_string())),
        (TargetType::Bool, Value::Bool(b)) => Ok(BoundValue::Bool(*b)),
        (_, Value::Number(n)) => coerce_text(raw, &n.to_string(), target),
        _ => Err(malformed(raw, format!("expected {target}"))),
    }
}

/// Check that a spec's default text coerces to its target type.
pub(crate) fn check_default(spec: &ParamSpec, default: &str) -> Result<(), String> {
    let probe = ParamSpec {
        optional: true,
        default: Some(default.to_string()),
        ..spec.clone()
    };
    absent(&probe).map(|_| ()).map_err(|failure| {
        format!("default {default:?} does not coerce to {}: {failure}", spec.target_type)
    })
}
