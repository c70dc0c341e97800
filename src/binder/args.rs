use chrono::{DateTime, FixedOffset, NaiveDate};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::sources::{RequestContext, UploadedFile};

/// A coerced argument value.
#[derive(Debug, Clone)]
pub enum BoundValue {
    /// Optional value without a zero value (dates, files) that was absent
    Missing,
    Str(String),
    Bool(bool),
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Json(Value),
    File(UploadedFile),
    List(Vec<BoundValue>),
    Context(RequestContext),
}

/// Handler-side access to an argument failed.
///
/// Returned to the handler, which normally propagates it with `?`; the
/// dispatcher then answers with the internal-error route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgError {
    pub argument: String,
    pub expected: &'static str,
}

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "argument {} is not bound as {}", self.argument, self.expected)
    }
}

impl std::error::Error for ArgError {}

/// Conversion from a bound value into a handler-side Rust type.
pub trait FromBound: Sized {
    const EXPECTS: &'static str;

    fn from_bound(value: &BoundValue) -> Option<Self>;
}

macro_rules! from_bound {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl FromBound for $ty {
            const EXPECTS: &'static str = $name;

            fn from_bound(value: &BoundValue) -> Option<Self> {
                match value {
                    BoundValue::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

from_bound!(String, Str, "string");
from_bound!(bool, Bool, "bool");
from_bound!(i32, I32, "i32");
from_bound!(i64, I64, "i64");
from_bound!(u32, U32, "u32");
from_bound!(u64, U64, "u64");
from_bound!(f32, F32, "f32");
from_bound!(f64, F64, "f64");
from_bound!(NaiveDate, Date, "date");
from_bound!(DateTime<FixedOffset>, DateTime, "datetime");
from_bound!(Value, Json, "json");
from_bound!(UploadedFile, File, "file");
from_bound!(RequestContext, Context, "context");

impl<T: FromBound> FromBound for Option<T> {
    const EXPECTS: &'static str = T::EXPECTS;

    fn from_bound(value: &BoundValue) -> Option<Self> {
        match value {
            BoundValue::Missing => Some(None),
            other => T::from_bound(other).map(Some),
        }
    }
}

impl<T: FromBound> FromBound for Vec<T> {
    const EXPECTS: &'static str = "list";

    fn from_bound(value: &BoundValue) -> Option<Self> {
        match value {
            BoundValue::List(items) => items.iter().map(T::from_bound).collect(),
            _ => None,
        }
    }
}

/// Bound arguments in parameter-spec order.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<(Arc<str>, BoundValue)>,
}

impl Args {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, alias: &str, value: BoundValue) {
        self.values.push((Arc::from(alias), value));
    }

    /// Argument bound under `alias`, converted to `T`.
    pub fn get<T: FromBound>(&self, alias: &str) -> Result<T, ArgError> {
        self.raw(alias)
            .and_then(T::from_bound)
            .ok_or_else(|| ArgError {
                argument: format!("`{alias}`"),
                expected: T::EXPECTS,
            })
    }

    /// Argument at `position`, converted to `T`.
    pub fn at<T: FromBound>(&self, position: usize) -> Result<T, ArgError> {
        self.values
            .get(position)
            .and_then(|(_, v)| T::from_bound(v))
            .ok_or_else(|| ArgError {
                argument: format!("#{position}"),
                expected: T::EXPECTS,
            })
    }

    #[must_use]
    pub fn raw(&self, alias: &str) -> Option<&BoundValue> {
        self.values
            .iter()
            .find(|(k, _)| k.as_ref() == alias)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BoundValue)> {
        self.values.iter().map(|(k, v)| (k.as_ref(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
