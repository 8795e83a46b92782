use std::{fmt, sync::Arc};

use serde_json::Value as JsonValue;

use super::{Context, entry::Entry, link::Link};

/// Value held by a context slot.
#[derive(Clone)]
pub enum Value {
    /// Plain data.
    Json(JsonValue),
    /// A nested context, possibly acting as a model.
    Context(Context),
    /// A named, possibly lazily computed slot.
    Entry(Arc<Entry>),
}

impl Value {
    pub fn as_json(&self) -> Option<&JsonValue> {
        match self {
            Value::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<&Context> {
        match self {
            Value::Context(context) => Some(context),
            _ => None,
        }
    }

    pub fn as_entry(&self) -> Option<&Arc<Entry>> {
        match self {
            Value::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(JsonValue::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_json().and_then(JsonValue::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(JsonValue::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(JsonValue::as_bool)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Json(left), Value::Json(right)) => left == right,
            (Value::Context(left), Value::Context(right)) => left.ptr_eq(right),
            (Value::Entry(left), Value::Entry(right)) => Arc::ptr_eq(left, right),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Json(value) => write!(f, "{value}"),
            Value::Context(context) => write!(f, "Context({})", context.name()),
            Value::Entry(entry) => write!(f, "Entry({})", entry.name()),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        Value::Json(value)
    }
}

impl From<Context> for Value {
    fn from(context: Context) -> Self {
        Value::Context(context)
    }
}

impl From<Entry> for Value {
    fn from(entry: Entry) -> Self {
        Value::Entry(Arc::new(entry))
    }
}

impl From<Arc<Entry>> for Value {
    fn from(entry: Arc<Entry>) -> Self {
        Value::Entry(entry)
    }
}

macro_rules! json_from {
    ($($source:ty),*) => {
        $(impl From<$source> for Value {
            fn from(value: $source) -> Self {
                Value::Json(JsonValue::from(value))
            }
        })*
    };
}

json_from!(i32, i64, u32, u64, f64, bool, &str, String);

/// Outcome of resolving a path.
///
/// A path that holds the "none" sentinel is reported as [`Lookup::FoundNone`], which is
/// distinct from a path that does not exist at all.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Value),
    FoundNone,
    NotFound,
}

impl Lookup {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    /// True for both `FoundNone` and `NotFound`.
    pub fn is_absent(&self) -> bool {
        !self.is_found()
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Lookup::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&JsonValue> {
        self.value().and_then(Value::as_json)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.value().and_then(Value::as_i64)
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.value().and_then(Value::as_f64)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.value().and_then(Value::as_str)
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.value().and_then(Value::as_bool)
    }

    pub fn as_context(&self) -> Option<&Context> {
        self.value().and_then(Value::as_context)
    }
}

impl From<Option<Value>> for Lookup {
    fn from(value: Option<Value>) -> Self {
        match value {
            Some(value) => Lookup::Found(value),
            None => Lookup::FoundNone,
        }
    }
}

/// Storage cell of a context path.
#[derive(Clone)]
pub(crate) enum Slot {
    Value(Value),
    None,
    Link(Link),
}

impl Slot {
    /// JSON `null` collapses into the none sentinel.
    pub(crate) fn from_value(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Json(JsonValue::Null)) => Slot::None,
            Some(value) => Slot::Value(value),
        }
    }

    pub(crate) fn to_lookup(&self) -> Lookup {
        match self {
            Slot::Value(value) => Lookup::Found(value.clone()),
            Slot::None => Lookup::FoundNone,
            Slot::Link(link) => match link.target() {
                Some(target) if link.offset().is_empty() => Lookup::Found(Value::Context(target)),
                _ => Lookup::NotFound,
            },
        }
    }
}
