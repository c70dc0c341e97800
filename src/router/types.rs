//! Route descriptors and parameter specifications.

use http::Method;
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::binder::{self, Args};
use crate::dispatcher::HandlerResponse;

/// Maximum number of path parameters before heap allocation.
/// Most routes have ≤4 path params (e.g., /users/{id}/posts/{post_id}).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated `(name, value)` storage for path and query parameters.
///
/// Names use `Arc<str>` since path parameter names come from the route tree
/// and are cloned on every match.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Set of verbs a route accepts. An empty set rejects every verb.
pub type MethodSet = SmallVec<[Method; 4]>;

/// Shared reference to the handler-group instance that owns an action.
pub type Invoker = Arc<dyn Any + Send + Sync>;

type ActionFn =
    dyn Fn(&(dyn Any + Send + Sync + 'static), Args) -> anyhow::Result<HandlerResponse> + Send + Sync;

/// Type-erased handler function bound to a handler-group type.
#[derive(Clone)]
pub struct Action {
    name: Arc<str>,
    call: Arc<ActionFn>,
}

impl Action {
    /// Erase a `Fn(&G, Args)` so it can be called through an [`Invoker`].
    pub fn new<G, F>(name: &str, f: F) -> Self
    where
        G: Send + Sync + 'static,
        F: Fn(&G, Args) -> anyhow::Result<HandlerResponse> + Send + Sync + 'static,
    {
        let call = move |invoker: &(dyn Any + Send + Sync + 'static), args: Args| match invoker
            .downcast_ref::<G>()
        {
            Some(group) => f(group, args),
            None => Err(anyhow::anyhow!(
                "invoker is not a {}",
                std::any::type_name::<G>()
            )),
        };
        Self {
            name: Arc::from(name),
            call: Arc::new(call),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn invoke(&self, invoker: &Invoker, args: Args) -> anyhow::Result<HandlerResponse> {
        (self.call)(invoker.as_ref(), args)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Action").field(&self.name).finish()
    }
}

/// One invocable endpoint in the route table.
pub struct Route {
    uri: String,
    group: Arc<str>,
    invoker: Invoker,
    action: Action,
    methods: MethodSet,
    params: Vec<ParamSpec>,
}

impl Route {
    /// Create a route. `uri` must already be normalized.
    pub fn new(
        uri: String,
        group: Arc<str>,
        invoker: Invoker,
        action: Action,
        methods: MethodSet,
        params: Vec<ParamSpec>,
    ) -> Self {
        Self {
            uri,
            group,
            invoker,
            action,
            methods,
            params,
        }
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn action_name(&self) -> &str {
        self.action.name()
    }

    /// `group::action`, used in logs and duplicate reports.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.group, self.action.name())
    }

    #[must_use]
    pub fn methods(&self) -> &MethodSet {
        &self.methods
    }

    #[must_use]
    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    #[must_use]
    pub fn invoker(&self) -> &Invoker {
        &self.invoker
    }

    #[inline]
    #[must_use]
    pub fn accepts(&self, method: &Method) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    /// Comma separated verb list, as used in an `Allow` header.
    #[must_use]
    pub fn allow_header(&self) -> String {
        self.methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn invoke(&self, args: Args) -> anyhow::Result<HandlerResponse> {
        self.action.invoke(&self.invoker, args)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("uri", &self.uri)
            .field("group", &self.group)
            .field("action", &self.action.name())
            .field("methods", &self.methods)
            .field("params", &self.params)
            .finish()
    }
}

/// Part of the request that supplies a parameter's raw value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    Path,
    Query,
    Body,
    Header,
    FormFile,
    Context,
}

impl fmt::Display for ParamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamSource::Path => "path",
            ParamSource::Query => "query",
            ParamSource::Body => "body",
            ParamSource::Header => "header",
            ParamSource::FormFile => "form-file",
            ParamSource::Context => "context",
        };
        f.write_str(name)
    }
}

/// Coercion strategy for a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// One value coerced to `target_type`
    Scalar,
    /// Comma separated or repeated values, each coerced to `element_type`
    Array,
    /// Repeated values, each coerced to `element_type`
    Collection,
    /// One uploaded file
    File,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamKind::Scalar => "scalar",
            ParamKind::Array => "array",
            ParamKind::Collection => "collection",
            ParamKind::File => "file",
        };
        f.write_str(name)
    }
}

/// Closed set of types a parameter can be bound to.
///
/// | Variant    | Raw text accepted                         | Zero value |
/// |------------|-------------------------------------------|------------|
/// | `Str`      | anything                                  | `""`       |
/// | `Bool`     | `true`/`false`/`1`/`0` (case-insensitive) | `false`    |
/// | `I32`…`U64`| decimal integers in range                 | `0`        |
/// | `F32`,`F64`| decimal floats                            | `0.0`      |
/// | `Date`     | `YYYY-MM-DD`                              | none       |
/// | `DateTime` | RFC 3339                                  | none       |
/// | `Json`     | JSON text, otherwise a JSON string        | `null`     |
/// | `File`     | uploaded files only                       | none       |
/// | `Context`  | never text; the ambient request context   | n/a        |
/// | `List`     | array/collection kinds only               | `[]`       |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetType {
    Str,
    Bool,
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    Date,
    DateTime,
    Json,
    File,
    Context,
    List,
}

impl TargetType {
    /// Whether the type may appear as a list element.
    #[must_use]
    pub fn is_element_type(self) -> bool {
        !matches!(self, TargetType::File | TargetType::Context | TargetType::List)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetType::Str => "string",
            TargetType::Bool => "bool",
            TargetType::I32 => "i32",
            TargetType::I64 => "i64",
            TargetType::U32 => "u32",
            TargetType::U64 => "u64",
            TargetType::F32 => "f32",
            TargetType::F64 => "f64",
            TargetType::Date => "date",
            TargetType::DateTime => "datetime",
            TargetType::Json => "json",
            TargetType::File => "file",
            TargetType::Context => "context",
            TargetType::List => "list",
        };
        f.write_str(name)
    }
}

/// Describes how to find and coerce one handler argument.
///
/// Specs are positional: the n-th spec of a route binds the n-th argument.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub alias: String,
    pub source: ParamSource,
    pub kind: ParamKind,
    pub target_type: TargetType,
    /// Set iff `kind` is `Array` or `Collection`
    pub element_type: Option<TargetType>,
    pub optional: bool,
    /// Raw text used when the value is absent; implies `optional`
    pub default: Option<String>,
}

impl ParamSpec {
    pub fn scalar(alias: &str, source: ParamSource, target_type: TargetType) -> Self {
        Self {
            alias: alias.to_string(),
            source,
            kind: ParamKind::Scalar,
            target_type,
            element_type: None,
            optional: false,
            default: None,
        }
    }

    pub fn path(alias: &str, target_type: TargetType) -> Self {
        Self::scalar(alias, ParamSource::Path, target_type)
    }

    pub fn query(alias: &str, target_type: TargetType) -> Self {
        Self::scalar(alias, ParamSource::Query, target_type)
    }

    pub fn header(alias: &str, target_type: TargetType) -> Self {
        Self::scalar(alias, ParamSource::Header, target_type)
    }

    /// Field of the request body, or the whole body when `alias` is
    /// [`binder::WHOLE_BODY`].
    pub fn body(alias: &str, target_type: TargetType) -> Self {
        Self::scalar(alias, ParamSource::Body, target_type)
    }

    pub fn array(alias: &str, source: ParamSource, element_type: TargetType) -> Self {
        Self {
            kind: ParamKind::Array,
            element_type: Some(element_type),
            ..Self::scalar(alias, source, TargetType::List)
        }
    }

    pub fn collection(alias: &str, source: ParamSource, element_type: TargetType) -> Self {
        Self {
            kind: ParamKind::Collection,
            element_type: Some(element_type),
            ..Self::scalar(alias, source, TargetType::List)
        }
    }

    pub fn file(alias: &str) -> Self {
        Self {
            kind: ParamKind::File,
            ..Self::scalar(alias, ParamSource::FormFile, TargetType::File)
        }
    }

    /// The ambient request context; never read from client text.
    pub fn context(alias: &str) -> Self {
        Self::scalar(alias, ParamSource::Context, TargetType::Context)
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn with_default(mut self, raw: &str) -> Self {
        self.optional = true;
        self.default = Some(raw.to_string());
        self
    }

    /// Check the parameter's internal consistency.
    pub fn validate(&self) -> Result<(), String> {
        let listy = matches!(self.kind, ParamKind::Array | ParamKind::Collection);
        match (listy, self.element_type) {
            (true, None) => return Err(format!("{} kind requires an element type", self.kind)),
            (false, Some(_)) => {
                return Err(format!("{} kind cannot carry an element type", self.kind))
            }
            (true, Some(element)) if !element.is_element_type() => {
                return Err(format!("{element} cannot be a list element"))
            }
            _ => {}
        }
        if listy != (self.target_type == TargetType::List) {
            return Err(format!(
                "{} kind cannot target {}",
                self.kind, self.target_type
            ));
        }
        if (self.kind == ParamKind::File) != (self.source == ParamSource::FormFile) {
            return Err("file kind and form-file source go together".to_string());
        }
        if (self.kind == ParamKind::File) != (self.target_type == TargetType::File) {
            return Err("file kind must target file".to_string());
        }
        if (self.source == ParamSource::Context) != (self.target_type == TargetType::Context) {
            return Err("context source and context type go together".to_string());
        }
        if let Some(raw) = &self.default {
            if matches!(
                self.source,
                ParamSource::Context | ParamSource::FormFile
            ) {
                return Err(format!("{} parameters take no default", self.source));
            }
            binder::check_default(self, raw)?;
        }
        Ok(())
    }
}
