//! Codec pipeline: paired decode/encode transforms attached to schema nodes.
//!
//! `decode` runs clone → default → convert → clean → assert, then executes
//! node decodes innermost-first, so a node `B` wrapping `A` decodes as
//! `B.decode(A.decode(raw))`. `encode` mirrors it: node encodes run
//! outermost-first (`A.encode(B.encode(value))`), then the re-encoded value
//! is asserted against the raw shape. A codec reachable through several
//! intersection members executes once per logical position, keyed by
//! (schema identity, path).

use std::collections::HashSet;

use crate::check::check;
use crate::context::Context;
use crate::diagnostics::collect_errors;
use crate::error::EngineError;
use crate::normalize::{clean, convert, default_value};
use crate::schema::{Schema, SchemaKind};
use crate::structural::clone_value;
use crate::value::Value;

pub fn decode(ctx: &Context, schema: &Schema, value: &Value) -> Result<Value, EngineError> {
    let v = clone_value(value);
    let v = default_value(ctx, schema, v);
    let v = convert(ctx, schema, v);
    let v = clean(ctx, schema, v);
    if !check(ctx, schema, &v) {
        return Err(EngineError::Assert(collect_errors(ctx, schema, &v)));
    }
    let mut executed = HashSet::new();
    run_decode(ctx, schema, v, "", &mut executed)
}

pub fn encode(ctx: &Context, schema: &Schema, value: &Value) -> Result<Value, EngineError> {
    let mut executed = HashSet::new();
    let v = run_encode(ctx, schema, clone_value(value), "", &mut executed)?;
    if !check(ctx, schema, &v) {
        return Err(EngineError::Assert(collect_errors(ctx, schema, &v)));
    }
    Ok(v)
}

// Each codec executes once per logical position.
type Executed = HashSet<(usize, String)>;

/// Runs the decode transforms alone, without the normalization prefix.
pub(crate) fn decode_transforms(
    ctx: &Context,
    schema: &Schema,
    value: Value,
) -> Result<Value, EngineError> {
    let mut executed = HashSet::new();
    run_decode(ctx, schema, value, "", &mut executed)
}

// ————————————————————————————————————————————————————————————————————————————
// DECODE (innermost-first)
// ————————————————————————————————————————————————————————————————————————————

fn run_decode(
    ctx: &Context,
    schema: &Schema,
    value: Value,
    path: &str,
    executed: &mut Executed,
) -> Result<Value, EngineError> {
    let Some(node) = ctx.deref(schema) else {
        return Ok(value);
    };
    let node = node.clone();
    let value = decode_children(ctx, &node, value, path, executed)?;
    apply_codec(&node, value, path, executed, Direction::Decode)
}

fn decode_children(
    ctx: &Context,
    schema: &Schema,
    value: Value,
    path: &str,
    executed: &mut Executed,
) -> Result<Value, EngineError> {
    match schema.kind() {
        SchemaKind::Array { items } => match value {
            Value::Array(xs) => {
                let mut out = Vec::with_capacity(xs.len());
                for (i, x) in xs.into_iter().enumerate() {
                    out.push(run_decode(ctx, items, x, &seg(path, i), executed)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other),
        },
        SchemaKind::Tuple { items } => match value {
            Value::Array(xs) => {
                let mut out = Vec::with_capacity(xs.len());
                for (i, x) in xs.into_iter().enumerate() {
                    match items.get(i) {
                        Some(s) => out.push(run_decode(ctx, s, x, &seg(path, i), executed)?),
                        None => out.push(x),
                    }
                }
                Ok(Value::Array(out))
            }
            other => Ok(other),
        },
        SchemaKind::Object { properties, .. } => match value {
            Value::Object(map) => {
                let mut out = indexmap::IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    match properties.get(&k) {
                        Some(prop) => {
                            let decoded = run_decode(ctx, prop, v, &key(path, &k), executed)?;
                            out.insert(k, decoded);
                        }
                        None => {
                            out.insert(k, v);
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            other => Ok(other),
        },
        SchemaKind::Record { value: vs, .. } => match value {
            Value::Object(map) => {
                let mut out = indexmap::IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    let decoded = run_decode(ctx, vs, v, &key(path, &k), executed)?;
                    out.insert(k, decoded);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other),
        },
        SchemaKind::Union(variants) => {
            // the asserted value selects its variant structurally
            for variant in variants {
                if check(ctx, variant, &value) {
                    return run_decode(ctx, variant, value, path, executed);
                }
            }
            Ok(value)
        }
        SchemaKind::Intersect(members) => {
            let mut v = value;
            for m in members {
                v = run_decode(ctx, m, v, path, executed)?;
            }
            Ok(v)
        }
        _ => Ok(value),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// ENCODE (outermost-first)
// ————————————————————————————————————————————————————————————————————————————

fn run_encode(
    ctx: &Context,
    schema: &Schema,
    value: Value,
    path: &str,
    executed: &mut Executed,
) -> Result<Value, EngineError> {
    let Some(node) = ctx.deref(schema) else {
        return Ok(value);
    };
    let node = node.clone();
    let value = apply_codec(&node, value, path, executed, Direction::Encode)?;
    encode_children(ctx, &node, value, path, executed)
}

fn encode_children(
    ctx: &Context,
    schema: &Schema,
    value: Value,
    path: &str,
    executed: &mut Executed,
) -> Result<Value, EngineError> {
    match schema.kind() {
        SchemaKind::Array { items } => match value {
            Value::Array(xs) => {
                let mut out = Vec::with_capacity(xs.len());
                for (i, x) in xs.into_iter().enumerate() {
                    out.push(run_encode(ctx, items, x, &seg(path, i), executed)?);
                }
                Ok(Value::Array(out))
            }
            other => Ok(other),
        },
        SchemaKind::Tuple { items } => match value {
            Value::Array(xs) => {
                let mut out = Vec::with_capacity(xs.len());
                for (i, x) in xs.into_iter().enumerate() {
                    match items.get(i) {
                        Some(s) => out.push(run_encode(ctx, s, x, &seg(path, i), executed)?),
                        None => out.push(x),
                    }
                }
                Ok(Value::Array(out))
            }
            other => Ok(other),
        },
        SchemaKind::Object { properties, .. } => match value {
            Value::Object(map) => {
                let mut out = indexmap::IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    match properties.get(&k) {
                        Some(prop) => {
                            let encoded = run_encode(ctx, prop, v, &key(path, &k), executed)?;
                            out.insert(k, encoded);
                        }
                        None => {
                            out.insert(k, v);
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            other => Ok(other),
        },
        SchemaKind::Record { value: vs, .. } => match value {
            Value::Object(map) => {
                let mut out = indexmap::IndexMap::with_capacity(map.len());
                for (k, v) in map {
                    let encoded = run_encode(ctx, vs, v, &key(path, &k), executed)?;
                    out.insert(k, encoded);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other),
        },
        SchemaKind::Union(variants) => {
            // pick the first variant whose encoding lands on its raw shape
            for variant in variants {
                let mut scratch = executed.clone();
                if let Ok(candidate) =
                    run_encode(ctx, variant, clone_value(&value), path, &mut scratch)
                {
                    if check(ctx, variant, &candidate) {
                        *executed = scratch;
                        return Ok(candidate);
                    }
                }
            }
            Ok(value)
        }
        SchemaKind::Intersect(members) => {
            let mut v = value;
            for m in members {
                v = run_encode(ctx, m, v, path, executed)?;
            }
            Ok(v)
        }
        _ => Ok(value),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SHARED
// ————————————————————————————————————————————————————————————————————————————

enum Direction {
    Decode,
    Encode,
}

fn apply_codec(
    schema: &Schema,
    value: Value,
    path: &str,
    executed: &mut Executed,
    direction: Direction,
) -> Result<Value, EngineError> {
    let Some(codec) = schema.codec() else {
        return Ok(value);
    };
    if !executed.insert((schema.id(), path.to_string())) {
        return Ok(value); // already ran at this logical position
    }
    let transform = match direction {
        Direction::Decode => codec.decode.as_ref().ok_or(EngineError::MissingDecode)?,
        Direction::Encode => codec.encode.as_ref().ok_or(EngineError::MissingEncode)?,
    };
    transform(value).map_err(|message| EngineError::Codec {
        path: path.to_string(),
        message,
    })
}

fn seg(path: &str, index: usize) -> String {
    format!("{path}/{index}")
}

fn key(path: &str, name: &str) -> String {
    format!("{path}/{name}")
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
