//! JSON-superset value model.
//!
//! Everything the engine validates or transforms is a `Value`: the six JSON
//! shapes plus the host-side leaves a schema can describe (undefined, bigint,
//! symbol, date, binary buffer, opaque invocables/generators). Plain JSON
//! round-trips through `From<serde_json::Value>` / `to_json`; the non-JSON
//! leaves are identity handles and lossy on the way out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    /// Doubles as the "absent" sentinel for defaulting.
    Undefined,
    Bool(bool),
    /// Total-ordered so values can be map/set keys.
    Number(OrderedFloat<f64>),
    BigInt(i128),
    String(String),
    /// Identity handle; not content-copyable.
    Symbol(Symbol),
    Date(DateTime<Utc>),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    /// Insertion order preserved; equality is key-set based.
    Object(IndexMap<String, Value>),
    /// Opaque invocable. Matched by `Callable` schemas, never called.
    Func(Opaque),
    /// Opaque generator-shaped handle. Matched by `Iterator`/`AsyncIterator`.
    Iter(Opaque),
}

/// Identity-based symbol handle with an optional description.
#[derive(Clone, Debug)]
pub struct Symbol(Arc<SymbolData>);

#[derive(Debug)]
struct SymbolData {
    id: u64,
    description: Option<String>,
}

/// Identity-based handle for values the engine treats as opaque.
#[derive(Clone, Debug)]
pub struct Opaque(Arc<OpaqueData>);

#[derive(Debug)]
struct OpaqueData {
    id: u64,
    label: Option<String>,
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

fn next_handle_id() -> u64 {
    NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed)
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Symbol {
    pub fn new(description: Option<&str>) -> Self {
        Symbol(Arc::new(SymbolData {
            id: next_handle_id(),
            description: description.map(str::to_string),
        }))
    }

    pub fn description(&self) -> Option<&str> {
        self.0.description.as_deref()
    }

    /// Stable per-process identity, used by `equal`/`hash_value`.
    pub fn id(&self) -> u64 {
        self.0.id
    }
}

impl Opaque {
    pub fn new(label: Option<&str>) -> Self {
        Opaque(Arc::new(OpaqueData {
            id: next_handle_id(),
            label: label.map(str::to_string),
        }))
    }

    pub fn label(&self) -> Option<&str> {
        self.0.label.as_deref()
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }
}

impl Value {
    pub fn number(n: f64) -> Self {
        Value::Number(OrderedFloat(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn date_millis(millis: i64) -> Self {
        Value::Date(Utc.timestamp_millis_opt(millis).single().unwrap_or_default())
    }

    /// Kind tag used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Date(_) => "date",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Func(_) => "function",
            Value::Iter(_) => "iterator",
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(n.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Lossy projection back to JSON. Non-JSON leaves yield `None`; dates
    /// render as RFC 3339 strings, bigints as decimal strings when they
    /// exceed the f64-exact range.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::Null => Some(serde_json::Value::Null),
            Value::Undefined => None,
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::Number(n) => serde_json::Number::from_f64(n.0).map(serde_json::Value::Number),
            Value::BigInt(i) => {
                if let Ok(small) = i64::try_from(*i) {
                    Some(serde_json::Value::from(small))
                } else {
                    Some(serde_json::Value::from(i.to_string()))
                }
            }
            Value::String(s) => Some(serde_json::Value::from(s.clone())),
            Value::Symbol(_) | Value::Func(_) | Value::Iter(_) => None,
            Value::Date(d) => Some(serde_json::Value::from(d.to_rfc3339())),
            Value::Bytes(b) => Some(serde_json::Value::Array(
                b.iter().map(|x| serde_json::Value::from(*x)).collect(),
            )),
            Value::Array(xs) => {
                let mut out = Vec::with_capacity(xs.len());
                for x in xs {
                    out.push(x.to_json()?);
                }
                Some(serde_json::Value::Array(out))
            }
            Value::Object(m) => {
                let mut out = serde_json::Map::new();
                for (k, v) in m {
                    // undefined-valued entries disappear, like serialization would drop them
                    if v.is_undefined() {
                        continue;
                    }
                    out.insert(k.clone(), v.to_json()?);
                }
                Some(serde_json::Value::Object(out))
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(xs) => Value::Array(xs.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(m) => {
                Value::Object(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

// Structural equality; handle leaves compare by identity. Object comparison
// is key-set based (IndexMap equality is order-independent).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a.id() == b.id(),
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => a.id() == b.id(),
            (Value::Iter(a), Value::Iter(b)) => a.id() == b.id(),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        state.write_u64(crate::structural::hash_value(self));
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
