//! Schema model: an immutable tagged variant plus per-node metadata.
//!
//! Nodes are `Arc`-shared and never mutated after construction; every
//! builder returns a fresh node (copy-on-write), so one schema can sit under
//! many concurrent values. Pointer identity is what the cycle guards key on.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// Policy for object keys not named in `properties`.
#[derive(Clone, Debug)]
pub enum Additional {
    /// Unknown keys reject the value.
    Closed,
    /// Unknown keys are ignored.
    Open,
    /// Unknown keys must match this schema.
    Schema(Schema),
}

#[derive(Clone, Debug)]
pub enum SchemaKind {
    Any,
    Unknown,
    Never,
    Null,
    Undefined,
    Void,
    Boolean,
    Number,
    Integer,
    BigInt,
    String,
    Symbol,
    Literal(Value),
    Date,
    Bytes,
    Array {
        items: Schema,
    },
    Tuple {
        items: Vec<Schema>,
    },
    Object {
        properties: IndexMap<String, Schema>,
        required: BTreeSet<String>,
        additional: Additional,
    },
    Record {
        key_pattern: String,
        value: Schema,
    },
    Union(Vec<Schema>),
    Intersect(Vec<Schema>),
    Ref(String),
    /// Opaque: matches any invocable value, never deeply checked.
    Callable,
    /// Opaque: matches any generator-shaped value.
    Iterator,
    AsyncIterator,
    /// Third-party kind; its check predicate lives in the kind registry.
    Custom(String),
}

/// Transform attached to a codec-bearing node. The `String` error becomes a
/// `Codec` engine error with the value path attached.
pub type TransformFn = Arc<dyn Fn(Value) -> Result<Value, String> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Codec {
    pub decode: Option<TransformFn>,
    pub encode: Option<TransformFn>,
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("decode", &self.decode.is_some())
            .field("encode", &self.encode.is_some())
            .finish()
    }
}

/// Validation constraints a node may carry beside its kind.
#[derive(Clone, Debug, Default)]
pub struct Constraints {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub multiple_of: Option<f64>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub min_properties: Option<usize>,
    pub max_properties: Option<usize>,
    pub pattern: Option<String>,
    pub format: Option<String>,
    pub unique_items: bool,
    pub contains: Option<Schema>,
    pub min_contains: Option<usize>,
    pub max_contains: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct SchemaNode {
    pub kind: SchemaKind,
    pub constraints: Constraints,
    pub default: Option<Value>,
    pub codec: Option<Codec>,
}

/// Shared, immutable schema handle.
#[derive(Clone, Debug)]
pub struct Schema(Arc<SchemaNode>);

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTORS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    fn of(kind: SchemaKind) -> Self {
        Schema(Arc::new(SchemaNode {
            kind,
            constraints: Constraints::default(),
            default: None,
            codec: None,
        }))
    }

    pub fn any() -> Self {
        Self::of(SchemaKind::Any)
    }
    pub fn unknown() -> Self {
        Self::of(SchemaKind::Unknown)
    }
    pub fn never() -> Self {
        Self::of(SchemaKind::Never)
    }
    pub fn null() -> Self {
        Self::of(SchemaKind::Null)
    }
    pub fn undefined() -> Self {
        Self::of(SchemaKind::Undefined)
    }
    pub fn void() -> Self {
        Self::of(SchemaKind::Void)
    }
    pub fn boolean() -> Self {
        Self::of(SchemaKind::Boolean)
    }
    pub fn number() -> Self {
        Self::of(SchemaKind::Number)
    }
    pub fn integer() -> Self {
        Self::of(SchemaKind::Integer)
    }
    pub fn bigint() -> Self {
        Self::of(SchemaKind::BigInt)
    }
    pub fn string() -> Self {
        Self::of(SchemaKind::String)
    }
    pub fn symbol() -> Self {
        Self::of(SchemaKind::Symbol)
    }
    pub fn literal(value: Value) -> Self {
        Self::of(SchemaKind::Literal(value))
    }
    pub fn date() -> Self {
        Self::of(SchemaKind::Date)
    }
    pub fn bytes() -> Self {
        Self::of(SchemaKind::Bytes)
    }
    pub fn callable() -> Self {
        Self::of(SchemaKind::Callable)
    }
    pub fn iterator() -> Self {
        Self::of(SchemaKind::Iterator)
    }
    pub fn async_iterator() -> Self {
        Self::of(SchemaKind::AsyncIterator)
    }
    pub fn custom(name: impl Into<String>) -> Self {
        Self::of(SchemaKind::Custom(name.into()))
    }

    pub fn array(items: Schema) -> Self {
        Self::of(SchemaKind::Array { items })
    }

    pub fn tuple(items: Vec<Schema>) -> Self {
        Self::of(SchemaKind::Tuple { items })
    }

    /// Open object where every listed property is required.
    pub fn object(properties: Vec<(&str, Schema)>) -> Self {
        let required = properties.iter().map(|(k, _)| k.to_string()).collect();
        Self::object_with(properties, required, Additional::Open)
    }

    pub fn object_with(
        properties: Vec<(&str, Schema)>,
        required: BTreeSet<String>,
        additional: Additional,
    ) -> Self {
        let properties: IndexMap<String, Schema> = properties
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        // required must name declared properties only
        debug_assert!(required.iter().all(|k| properties.contains_key(k)));
        Self::of(SchemaKind::Object {
            properties,
            required,
            additional,
        })
    }

    pub fn record(key_pattern: impl Into<String>, value: Schema) -> Self {
        Self::of(SchemaKind::Record {
            key_pattern: key_pattern.into(),
            value,
        })
    }

    pub fn union(variants: Vec<Schema>) -> Self {
        Self::of(SchemaKind::Union(variants))
    }

    pub fn intersect(members: Vec<Schema>) -> Self {
        Self::of(SchemaKind::Intersect(members))
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Self::of(SchemaKind::Ref(name.into()))
    }
}

// ————————————————————————————————————————————————————————————————————————————
// COPY-ON-WRITE BUILDERS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    fn rebuild(&self, edit: impl FnOnce(&mut SchemaNode)) -> Schema {
        let mut node = (*self.0).clone();
        edit(&mut node);
        Schema(Arc::new(node))
    }

    pub fn with_default(&self, value: Value) -> Schema {
        self.rebuild(|n| n.default = Some(value))
    }

    pub fn with_constraints(&self, constraints: Constraints) -> Schema {
        self.rebuild(|n| n.constraints = constraints)
    }

    pub fn with_pattern(&self, pattern: impl Into<String>) -> Schema {
        let pattern = pattern.into();
        self.rebuild(|n| n.constraints.pattern = Some(pattern))
    }

    pub fn with_format(&self, format: impl Into<String>) -> Schema {
        let format = format.into();
        self.rebuild(|n| n.constraints.format = Some(format))
    }

    pub fn with_range(&self, minimum: Option<f64>, maximum: Option<f64>) -> Schema {
        self.rebuild(|n| {
            n.constraints.minimum = minimum;
            n.constraints.maximum = maximum;
        })
    }

    pub fn with_length(&self, min: Option<usize>, max: Option<usize>) -> Schema {
        self.rebuild(|n| {
            n.constraints.min_length = min;
            n.constraints.max_length = max;
        })
    }

    pub fn with_items_bounds(&self, min: Option<usize>, max: Option<usize>) -> Schema {
        self.rebuild(|n| {
            n.constraints.min_items = min;
            n.constraints.max_items = max;
        })
    }

    pub fn with_unique_items(&self) -> Schema {
        self.rebuild(|n| n.constraints.unique_items = true)
    }

    pub fn with_contains(
        &self,
        contains: Schema,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Schema {
        self.rebuild(|n| {
            n.constraints.contains = Some(contains);
            n.constraints.min_contains = min;
            n.constraints.max_contains = max;
        })
    }

    pub fn with_codec(&self, codec: Codec) -> Schema {
        self.rebuild(|n| n.codec = Some(codec))
    }

    pub fn with_decode(
        &self,
        decode: impl Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Schema {
        let mut codec = self.0.codec.clone().unwrap_or_default();
        codec.decode = Some(Arc::new(decode));
        self.with_codec(codec)
    }

    pub fn with_encode(
        &self,
        encode: impl Fn(Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Schema {
        let mut codec = self.0.codec.clone().unwrap_or_default();
        codec.encode = Some(Arc::new(encode));
        self.with_codec(codec)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ACCESSORS
// ————————————————————————————————————————————————————————————————————————————

impl Schema {
    pub fn kind(&self) -> &SchemaKind {
        &self.0.kind
    }

    pub fn constraints(&self) -> &Constraints {
        &self.0.constraints
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.0.default.as_ref()
    }

    pub fn codec(&self) -> Option<&Codec> {
        self.0.codec.as_ref()
    }

    /// Pointer identity; cycle guards key on this.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.0.kind {
            SchemaKind::Any => "any",
            SchemaKind::Unknown => "unknown",
            SchemaKind::Never => "never",
            SchemaKind::Null => "null",
            SchemaKind::Undefined => "undefined",
            SchemaKind::Void => "void",
            SchemaKind::Boolean => "boolean",
            SchemaKind::Number => "number",
            SchemaKind::Integer => "integer",
            SchemaKind::BigInt => "bigint",
            SchemaKind::String => "string",
            SchemaKind::Symbol => "symbol",
            SchemaKind::Literal(_) => "literal",
            SchemaKind::Date => "date",
            SchemaKind::Bytes => "bytes",
            SchemaKind::Array { .. } => "array",
            SchemaKind::Tuple { .. } => "tuple",
            SchemaKind::Object { .. } => "object",
            SchemaKind::Record { .. } => "record",
            SchemaKind::Union(_) => "union",
            SchemaKind::Intersect(_) => "intersect",
            SchemaKind::Ref(_) => "ref",
            SchemaKind::Callable => "callable",
            SchemaKind::Iterator => "iterator",
            SchemaKind::AsyncIterator => "async-iterator",
            SchemaKind::Custom(_) => "custom",
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGEX CACHE
// ————————————————————————————————————————————————————————————————————————————

// Compile each distinct pattern once, process-wide. Invalid patterns cache as
// `None` and match nothing, so validation fails closed.
static REGEX_CACHE: Lazy<RwLock<HashMap<String, Option<Regex>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub(crate) fn pattern_matches(pattern: &str, input: &str) -> bool {
    if let Some(cached) = REGEX_CACHE
        .read()
        .expect("regex cache poisoned")
        .get(pattern)
    {
        return cached.as_ref().is_some_and(|rx| rx.is_match(input));
    }
    let compiled = Regex::new(pattern).ok();
    let hit = compiled.as_ref().is_some_and(|rx| rx.is_match(input));
    REGEX_CACHE
        .write()
        .expect("regex cache poisoned")
        .insert(pattern.to_string(), compiled);
    hit
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_copy_on_write() {
        let base = Schema::number();
        let bounded = base.with_range(Some(0.0), Some(10.0));
        assert!(base.constraints().minimum.is_none());
        assert_eq!(bounded.constraints().minimum, Some(0.0));
        assert_ne!(base.id(), bounded.id());
    }

    #[test]
    fn clones_share_identity() {
        let a = Schema::string();
        let b = a.clone();
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn invalid_pattern_matches_nothing() {
        assert!(!pattern_matches("([unclosed", "anything"));
        // cached miss stays a miss
        assert!(!pattern_matches("([unclosed", "anything"));
    }

    #[test]
    fn valid_pattern_matches() {
        assert!(pattern_matches("^a+$", "aaa"));
        assert!(!pattern_matches("^a+$", "ab"));
    }
}
