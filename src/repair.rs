//! Best-effort value reconstruction.
//!
//! `repair` goes further than `convert` (scalar coercion only) and `clean`
//! (removal only): when a position is structurally wrong it fabricates a
//! replacement of the declared kind, seeds it from the node default when one
//! exists, then adjusts it toward the declared constraints. It errors only
//! when a constraint cannot be honored without silently losing data, which
//! the caller should decide on explicitly.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::check::check;
use crate::context::Context;
use crate::error::EngineError;
use crate::normalize::convert;
use crate::schema::{Additional, Schema, SchemaKind, pattern_matches};
use crate::structural::clone_value;
use crate::value::Value;

pub fn repair(ctx: &Context, schema: &Schema, value: &Value) -> Result<Value, EngineError> {
    repair_rec(ctx, schema, value)
}

fn repair_rec(ctx: &Context, schema: &Schema, value: &Value) -> Result<Value, EngineError> {
    if let SchemaKind::Ref(name) = schema.kind() {
        let Some(target) = ctx.deref(schema) else {
            return Err(EngineError::UnknownReference(name.clone()));
        };
        let target = target.clone();
        return repair_rec(ctx, &target, value);
    }
    if check(ctx, schema, value) {
        return Ok(clone_value(value));
    }
    match schema.kind() {
        SchemaKind::Any | SchemaKind::Unknown => Ok(clone_value(value)),
        SchemaKind::Never => Err(EngineError::Unrepairable(
            "no value satisfies the empty type".to_string(),
        )),
        SchemaKind::Null => Ok(Value::Null),
        SchemaKind::Undefined | SchemaKind::Void => Ok(Value::Undefined),
        SchemaKind::Literal(lit) => Ok(clone_value(lit)),
        SchemaKind::Boolean => Ok(scalar_seed(ctx, schema, value, Value::Bool(false))),
        SchemaKind::Number | SchemaKind::Integer => {
            let seed = scalar_seed(ctx, schema, value, Value::number(0.0));
            let mut n = seed.as_f64().unwrap_or(0.0);
            n = clamp_number(schema, n);
            if matches!(schema.kind(), SchemaKind::Integer) {
                n = n.trunc();
                n = clamp_number(schema, n);
            }
            Ok(Value::number(n))
        }
        SchemaKind::BigInt => {
            let seed = scalar_seed(ctx, schema, value, Value::BigInt(0));
            match seed {
                Value::BigInt(n) => {
                    let c = schema.constraints();
                    let mut n = n;
                    if let Some(min) = c.minimum {
                        n = n.max(min as i128);
                    }
                    if let Some(max) = c.maximum {
                        n = n.min(max as i128);
                    }
                    Ok(Value::BigInt(n))
                }
                _ => Ok(Value::BigInt(0)),
            }
        }
        SchemaKind::String => {
            let seed = scalar_seed(ctx, schema, value, Value::string(""));
            let Value::String(mut s) = seed else {
                return Ok(Value::string(""));
            };
            if let Some(max) = schema.constraints().max_length {
                if s.chars().count() > max {
                    s = s.chars().take(max).collect();
                }
            }
            Ok(Value::String(s))
        }
        SchemaKind::Date => Ok(scalar_seed(ctx, schema, value, Value::date_millis(0))),
        SchemaKind::Bytes => match value {
            Value::Bytes(_) => Ok(clone_value(value)),
            _ => Ok(fabricate_seed(schema, Value::Bytes(Vec::new()))),
        },
        SchemaKind::Array { items } => repair_array(ctx, schema, items, value),
        SchemaKind::Tuple { items } => {
            let existing = match value {
                Value::Array(xs) => xs.as_slice(),
                _ => &[],
            };
            let mut out = Vec::with_capacity(items.len());
            for (i, item) in items.iter().enumerate() {
                let source = existing.get(i).unwrap_or(&Value::Undefined);
                out.push(repair_rec(ctx, item, source)?);
            }
            Ok(Value::Array(out))
        }
        SchemaKind::Object {
            properties,
            required,
            additional,
        } => {
            let mut map = match value {
                Value::Object(m) => m.clone(),
                _ => match fabricate_seed(schema, Value::Object(IndexMap::new())) {
                    Value::Object(m) => m,
                    _ => IndexMap::new(),
                },
            };
            for (name, prop) in properties {
                match map.get(name) {
                    Some(v) => {
                        let repaired = repair_rec(ctx, prop, v)?;
                        map.insert(name.clone(), repaired);
                    }
                    None => {
                        if required.contains(name) {
                            map.insert(name.clone(), repair_rec(ctx, prop, &Value::Undefined)?);
                        }
                    }
                }
            }
            match additional {
                Additional::Closed => {
                    map.retain(|k, _| properties.contains_key(k));
                }
                Additional::Schema(extra) => {
                    let unknown: Vec<String> = map
                        .keys()
                        .filter(|k| !properties.contains_key(*k))
                        .cloned()
                        .collect();
                    for k in unknown {
                        let repaired = repair_rec(ctx, extra, &map[k.as_str()])?;
                        map.insert(k, repaired);
                    }
                }
                Additional::Open => {}
            }
            Ok(Value::Object(map))
        }
        SchemaKind::Record {
            key_pattern,
            value: vs,
        } => {
            let mut out = IndexMap::new();
            if let Value::Object(map) = value {
                for (k, v) in map {
                    if pattern_matches(key_pattern, k) {
                        out.insert(k.clone(), repair_rec(ctx, vs, v)?);
                    }
                }
            }
            Ok(Value::Object(out))
        }
        SchemaKind::Union(variants) => {
            if variants.is_empty() {
                return Err(EngineError::Unrepairable(
                    "no value satisfies an empty union".to_string(),
                ));
            }
            // prefer a variant whose repair actually lands on the variant
            let mut first_err = None;
            for variant in variants {
                match repair_rec(ctx, variant, value) {
                    Ok(candidate) if check(ctx, variant, &candidate) => return Ok(candidate),
                    Ok(_) => {}
                    Err(e) => first_err = first_err.or(Some(e)),
                }
            }
            for variant in variants {
                if let Ok(candidate) = repair_rec(ctx, variant, value) {
                    return Ok(candidate);
                }
            }
            Err(first_err.unwrap_or_else(|| {
                EngineError::Unrepairable("no union variant is repairable".to_string())
            }))
        }
        SchemaKind::Intersect(members) => {
            let mut v = clone_value(value);
            for m in members {
                v = repair_rec(ctx, m, &v)?;
            }
            Ok(v)
        }
        SchemaKind::Callable | SchemaKind::Iterator | SchemaKind::AsyncIterator => {
            Err(EngineError::Unrepairable(format!(
                "cannot fabricate an opaque {} handle",
                schema.kind_name()
            )))
        }
        SchemaKind::Symbol => Err(EngineError::Unrepairable(
            "cannot fabricate a symbol with a meaningful identity".to_string(),
        )),
        SchemaKind::Custom(name) => Err(EngineError::Unrepairable(format!(
            "custom kind '{name}' has no fabrication rule"
        ))),
        SchemaKind::Ref(_) => unreachable!("refs are resolved above"),
    }
}

/// Coerce through `convert`; fall back to the node default, then to `zero`.
fn scalar_seed(ctx: &Context, schema: &Schema, value: &Value, zero: Value) -> Value {
    let coerced = convert(ctx, schema, clone_value(value));
    if check(ctx, schema, &coerced) {
        return coerced;
    }
    if coerced.kind_name() == zero.kind_name() {
        return coerced;
    }
    fabricate_seed(schema, zero)
}

fn fabricate_seed(schema: &Schema, zero: Value) -> Value {
    match schema.default_value() {
        Some(d) => clone_value(d),
        None => zero,
    }
}

fn clamp_number(schema: &Schema, n: f64) -> f64 {
    let c = schema.constraints();
    let mut n = n;
    if let Some(m) = c.multiple_of {
        if m > 0.0 {
            n = (n / m).round() * m;
        }
    }
    if let Some(min) = c.minimum {
        n = n.max(min);
    }
    if let Some(max) = c.maximum {
        n = n.min(max);
    }
    n
}

fn repair_array(
    ctx: &Context,
    schema: &Schema,
    items: &Schema,
    value: &Value,
) -> Result<Value, EngineError> {
    let c = schema.constraints();
    let mut xs = match value {
        Value::Array(xs) => {
            let mut out = Vec::with_capacity(xs.len());
            for x in xs {
                out.push(repair_rec(ctx, items, x)?);
            }
            out
        }
        _ => match fabricate_seed(schema, Value::Array(Vec::new())) {
            Value::Array(seed) => {
                let mut out = Vec::with_capacity(seed.len());
                for x in &seed {
                    out.push(repair_rec(ctx, items, x)?);
                }
                out
            }
            _ => Vec::new(),
        },
    };
    if c.unique_items {
        let mut seen = HashSet::new();
        xs.retain(|x| seen.insert(clone_value(x)));
    }
    if let Some(max) = c.max_items {
        xs.truncate(max);
    }
    if let Some(min) = c.min_items {
        if xs.len() < min {
            if c.unique_items {
                return Err(EngineError::Unrepairable(format!(
                    "array has {} distinct items but uniqueItems requires at least {min}",
                    xs.len()
                )));
            }
            let filler = repair_rec(ctx, items, &Value::Undefined)?;
            while xs.len() < min {
                xs.push(clone_value(&filler));
            }
        }
    }
    Ok(Value::Array(xs))
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structural::equal;
    use serde_json::json;

    fn v(j: serde_json::Value) -> Value {
        Value::from(j)
    }

    fn rep(schema: &Schema, value: serde_json::Value) -> Result<Value, EngineError> {
        repair(&Context::new(), schema, &v(value))
    }

    #[test]
    fn valid_values_pass_through_unchanged() {
        let s = Schema::object(vec![("x", Schema::number())]);
        let out = rep(&s, json!({"x": 1.0})).unwrap();
        assert!(equal(&out, &v(json!({"x": 1.0}))));
    }

    #[test]
    fn wrong_kind_positions_are_fabricated() {
        let s = Schema::object(vec![
            ("xs", Schema::array(Schema::number())),
            ("name", Schema::string()),
        ]);
        let out = rep(&s, json!({"xs": "nope", "name": 7})).unwrap();
        assert!(equal(&out, &v(json!({"xs": [], "name": "7"}))));
    }

    #[test]
    fn missing_required_properties_use_defaults() {
        let s = Schema::object(vec![(
            "port",
            Schema::number().with_default(Value::number(8080.0)),
        )]);
        let out = rep(&s, json!({})).unwrap();
        assert!(equal(&out, &v(json!({"port": 8080.0}))));
    }

    #[test]
    fn numbers_are_clamped_into_range() {
        let s = Schema::number().with_range(Some(0.0), Some(10.0));
        assert!(equal(&rep(&s, json!(-3)).unwrap(), &Value::number(0.0)));
        assert!(equal(&rep(&s, json!(99)).unwrap(), &Value::number(10.0)));
    }

    #[test]
    fn arrays_pad_to_min_items_and_trim_to_max() {
        let s = Schema::array(Schema::number().with_default(Value::number(0.0)))
            .with_items_bounds(Some(3), None);
        let out = rep(&s, json!([1])).unwrap();
        assert!(equal(&out, &v(json!([1.0, 0.0, 0.0]))));

        let s = Schema::array(Schema::number()).with_items_bounds(None, Some(2));
        let out = rep(&s, json!([1, 2, 3, 4])).unwrap();
        assert!(equal(&out, &v(json!([1.0, 2.0]))));
    }

    #[test]
    fn unique_items_dedup_keeps_encounter_order() {
        let s = Schema::array(Schema::number()).with_unique_items();
        let out = rep(&s, json!([3, 1, 3, 2, 1])).unwrap();
        assert!(equal(&out, &v(json!([3.0, 1.0, 2.0]))));
    }

    #[test]
    fn unique_min_items_conflict_is_unrepairable() {
        let s = Schema::array(Schema::number())
            .with_unique_items()
            .with_items_bounds(Some(3), None);
        assert!(matches!(
            rep(&s, json!([1, 1, 1])),
            Err(EngineError::Unrepairable(_))
        ));
    }

    #[test]
    fn tuples_are_resized_and_repaired_per_position() {
        let s = Schema::tuple(vec![Schema::number(), Schema::string()]);
        let out = rep(&s, json!([1, 2, 3])).unwrap();
        assert!(equal(&out, &v(json!([1.0, "2"]))));
        let out = rep(&s, json!("scalar")).unwrap();
        assert!(equal(&out, &v(json!([0.0, ""]))));
    }

    #[test]
    fn closed_objects_shed_unknown_keys() {
        let s = Schema::object_with(
            vec![("x", Schema::number())],
            ["x".to_string()].into(),
            Additional::Closed,
        );
        let out = rep(&s, json!({"x": 1, "junk": true})).unwrap();
        assert!(equal(&out, &v(json!({"x": 1.0}))));
    }

    #[test]
    fn union_repairs_toward_the_closest_variant() {
        let s = Schema::union(vec![Schema::number(), Schema::string()]);
        assert!(equal(&rep(&s, json!("12")).unwrap(), &Value::string("12")));
        assert!(equal(&rep(&s, json!(true)).unwrap(), &Value::number(1.0)));
    }

    #[test]
    fn dangling_reference_is_an_unknown_reference_error() {
        let s = Schema::reference("Missing");
        assert!(matches!(
            rep(&s, json!(1)),
            Err(EngineError::UnknownReference(name)) if name == "Missing"
        ));
    }
}
