//! Normalization pipeline: `default_value`, `convert`, `clean`.
//!
//! All three consume the value and rebuild only what changes, never throw,
//! and agree with what `check` accepts: defaulting fills gaps, convert is a
//! scalar-only coercion table, clean removes what the schema cannot reach.
//! `Value::Undefined` is the missing sentinel at the root; inside objects,
//! key absence is the sentinel.

use chrono::{DateTime, TimeZone, Utc};
use indexmap::IndexMap;

use crate::check::check;
use crate::context::Context;
use crate::schema::{Additional, Schema, SchemaKind, pattern_matches};
use crate::structural::clone_value;
use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// DEFAULT
// ————————————————————————————————————————————————————————————————————————————

/// Substitutes declared defaults into missing positions, recursing through
/// present composite members. Never removes validity from already-valid
/// input.
pub fn default_value(ctx: &Context, schema: &Schema, value: Value) -> Value {
    let Some(schema) = ctx.deref(schema) else {
        return value;
    };
    let value = match (&value, schema.default_value()) {
        (Value::Undefined, Some(d)) => clone_value(d),
        _ => value,
    };
    match schema.kind() {
        SchemaKind::Object { properties, .. } => {
            let Value::Object(mut map) = value else {
                return value;
            };
            for (name, prop) in properties {
                match map.get_mut(name) {
                    Some(slot) => {
                        let present = std::mem::replace(slot, Value::Undefined);
                        *slot = default_value(ctx, prop, present);
                    }
                    None => {
                        // insert only when the property's own defaulting
                        // produces something
                        let filled = default_value(ctx, prop, Value::Undefined);
                        if !filled.is_undefined() {
                            map.insert(name.clone(), filled);
                        }
                    }
                }
            }
            Value::Object(map)
        }
        SchemaKind::Array { items } => match value {
            Value::Array(xs) => Value::Array(
                xs.into_iter()
                    .map(|x| default_value(ctx, items, x))
                    .collect(),
            ),
            other => other,
        },
        SchemaKind::Tuple { items } => match value {
            Value::Array(xs) => Value::Array(
                xs.into_iter()
                    .enumerate()
                    .map(|(i, x)| match items.get(i) {
                        Some(s) => default_value(ctx, s, x),
                        None => x,
                    })
                    .collect(),
            ),
            other => other,
        },
        SchemaKind::Record { value: vs, .. } => match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, default_value(ctx, vs, v)))
                    .collect(),
            ),
            other => other,
        },
        SchemaKind::Union(variants) => {
            // first variant whose defaulting reconciles the value wins
            for variant in variants {
                let candidate = default_value(ctx, variant, clone_value(&value));
                if check(ctx, variant, &candidate) {
                    return candidate;
                }
            }
            value
        }
        SchemaKind::Intersect(members) => {
            // each member sees the previous member's result
            members
                .iter()
                .fold(value, |v, m| default_value(ctx, m, v))
        }
        _ => value,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONVERT
// ————————————————————————————————————————————————————————————————————————————

/// Scalar-only coercion toward the schema's kind. Non-convertible
/// combinations pass through unchanged; this never throws.
pub fn convert(ctx: &Context, schema: &Schema, value: Value) -> Value {
    let Some(schema) = ctx.deref(schema) else {
        return value;
    };
    match schema.kind() {
        SchemaKind::Boolean => convert_boolean(value),
        SchemaKind::Number => convert_number(value),
        SchemaKind::Integer => convert_integer(value),
        SchemaKind::BigInt => convert_bigint(value),
        SchemaKind::String => convert_string(value),
        SchemaKind::Date => convert_date(value),
        SchemaKind::Array { items } => match value {
            Value::Array(xs) => {
                Value::Array(xs.into_iter().map(|x| convert(ctx, items, x)).collect())
            }
            other => other,
        },
        SchemaKind::Tuple { items } => match value {
            Value::Array(xs) => Value::Array(
                xs.into_iter()
                    .enumerate()
                    .map(|(i, x)| match items.get(i) {
                        Some(s) => convert(ctx, s, x),
                        None => x,
                    })
                    .collect(),
            ),
            other => other,
        },
        SchemaKind::Object { properties, .. } => match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| match properties.get(&k) {
                        Some(prop) => {
                            let converted = convert(ctx, prop, v);
                            (k, converted)
                        }
                        None => (k, v),
                    })
                    .collect(),
            ),
            other => other,
        },
        SchemaKind::Record { value: vs, .. } => match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, convert(ctx, vs, v)))
                    .collect(),
            ),
            other => other,
        },
        SchemaKind::Union(variants) => {
            if variants.iter().any(|v| check(ctx, v, &value)) {
                return value; // already acceptable somewhere, leave it alone
            }
            for variant in variants {
                let candidate = convert(ctx, variant, clone_value(&value));
                if check(ctx, variant, &candidate) {
                    return candidate;
                }
            }
            value
        }
        SchemaKind::Intersect(members) => {
            members.iter().fold(value, |v, m| convert(ctx, m, v))
        }
        _ => value,
    }
}

fn convert_boolean(value: Value) -> Value {
    match &value {
        Value::String(s) => {
            if s.eq_ignore_ascii_case("true") || s == "1" {
                Value::Bool(true)
            } else if s.eq_ignore_ascii_case("false") || s == "0" {
                Value::Bool(false)
            } else {
                value
            }
        }
        Value::Number(n) if n.0 == 1.0 => Value::Bool(true),
        Value::Number(n) if n.0 == 0.0 => Value::Bool(false),
        Value::BigInt(1) => Value::Bool(true),
        Value::BigInt(0) => Value::Bool(false),
        _ => value,
    }
}

fn convert_number(value: Value) -> Value {
    match &value {
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Value::number(n),
            _ => value,
        },
        Value::Bool(b) => Value::number(if *b { 1.0 } else { 0.0 }),
        Value::BigInt(i) => Value::number(*i as f64),
        _ => value,
    }
}

fn convert_integer(value: Value) -> Value {
    match convert_number(value) {
        Value::Number(n) if n.0.is_finite() && n.0.fract() == 0.0 => Value::Number(n),
        other => other,
    }
}

fn convert_bigint(value: Value) -> Value {
    match &value {
        // integer truncation of the numeric parse
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Value::BigInt(n.trunc() as i128),
            _ => value,
        },
        Value::Number(n) if n.0.is_finite() => Value::BigInt(n.0.trunc() as i128),
        Value::Bool(b) => Value::BigInt(i128::from(*b)),
        _ => value,
    }
}

fn convert_string(value: Value) -> Value {
    match &value {
        Value::Number(n) => Value::String(n.0.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::BigInt(i) => Value::String(i.to_string()),
        _ => value,
    }
}

fn convert_date(value: Value) -> Value {
    match &value {
        Value::Number(n) if n.0.is_finite() && n.0.fract() == 0.0 => {
            match Utc.timestamp_millis_opt(n.0 as i64).single() {
                Some(d) => Value::Date(d),
                None => value,
            }
        }
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(d) => Value::Date(d.with_timezone(&Utc)),
            Err(_) => value,
        },
        _ => value,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CLEAN
// ————————————————————————————————————————————————————————————————————————————

/// Removes values unreachable from the schema's shape: closed-object
/// extraneous keys, tuple overflow, record keys failing the key pattern.
pub fn clean(ctx: &Context, schema: &Schema, value: Value) -> Value {
    let Some(schema) = ctx.deref(schema) else {
        return value;
    };
    match schema.kind() {
        SchemaKind::Object {
            properties,
            additional,
            ..
        } => {
            let Value::Object(map) = value else {
                return value;
            };
            let mut out = IndexMap::with_capacity(map.len());
            for (k, v) in map {
                match properties.get(&k) {
                    Some(prop) => {
                        out.insert(k, clean(ctx, prop, v));
                    }
                    None => match additional {
                        Additional::Closed => {} // dropped
                        Additional::Open => {
                            out.insert(k, v);
                        }
                        Additional::Schema(extra) => {
                            out.insert(k, clean(ctx, extra, v));
                        }
                    },
                }
            }
            Value::Object(out)
        }
        SchemaKind::Tuple { items } => match value {
            Value::Array(mut xs) => {
                xs.truncate(items.len());
                Value::Array(
                    xs.into_iter()
                        .enumerate()
                        .map(|(i, x)| clean(ctx, &items[i], x))
                        .collect(),
                )
            }
            other => other,
        },
        SchemaKind::Array { items } => match value {
            Value::Array(xs) => {
                Value::Array(xs.into_iter().map(|x| clean(ctx, items, x)).collect())
            }
            other => other,
        },
        SchemaKind::Record { key_pattern, value: vs } => match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .filter(|(k, _)| pattern_matches(key_pattern, k))
                    .map(|(k, v)| (k, clean(ctx, vs, v)))
                    .collect(),
            ),
            other => other,
        },
        SchemaKind::Union(variants) => {
            // clean against the first variant the unmodified value satisfies
            for variant in variants {
                if check(ctx, variant, &value) {
                    return clean(ctx, variant, value);
                }
            }
            value
        }
        SchemaKind::Intersect(members) => {
            members.iter().fold(value, |v, m| clean(ctx, m, v))
        }
        _ => value,
    }
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

    #[test]
    fn defaults_fill_missing_object_properties() {
        let s = Schema::object_with(
            vec![
                ("x", Schema::number().with_default(Value::number(1.0))),
                ("y", Schema::number().with_default(Value::number(2.0))),
            ],
            std::collections::BTreeSet::new(),
            Additional::Open,
        );
        let ctx = Context::new();
        let out = default_value(&ctx, &s, v(json!({})));
        assert!(equal(&out, &v(json!({"x": 1.0, "y": 2.0}))));
        assert!(check(&ctx, &s, &out));
    }

    #[test]
    fn defaulting_preserves_existing_values() {
        let s = Schema::object(vec![(
            "x",
            Schema::number().with_default(Value::number(1.0)),
        )]);
        let out = default_value(&Context::new(), &s, v(json!({"x": 9})));
        assert!(equal(&out, &v(json!({"x": 9}))));
    }

    #[test]
    fn default_is_idempotent() {
        let s = Schema::object_with(
            vec![("x", Schema::number().with_default(Value::number(1.0)))],
            std::collections::BTreeSet::new(),
            Additional::Open,
        );
        let ctx = Context::new();
        let once = default_value(&ctx, &s, v(json!({})));
        let twice = default_value(&ctx, &s, clone_value(&once));
        assert!(equal(&once, &twice));
    }

    #[test]
    fn union_defaulting_prefers_first_reconciling_variant() {
        let a = Schema::object(vec![("kind", Schema::literal(Value::string("a")))])
            .with_default(Value::from(json!({"kind": "a"})));
        let b = Schema::object(vec![("kind", Schema::literal(Value::string("b")))])
            .with_default(Value::from(json!({"kind": "b"})));
        let s = Schema::union(vec![a, b]);
        let out = default_value(&Context::new(), &s, Value::Undefined);
        assert!(equal(&out, &v(json!({"kind": "a"}))));
    }

    #[test]
    fn intersect_defaulting_threads_members_in_order() {
        let a = Schema::object_with(
            vec![("x", Schema::number().with_default(Value::number(1.0)))],
            std::collections::BTreeSet::new(),
            Additional::Open,
        );
        let b = Schema::object_with(
            vec![("y", Schema::number().with_default(Value::number(2.0)))],
            std::collections::BTreeSet::new(),
            Additional::Open,
        );
        let out = default_value(&Context::new(), &Schema::intersect(vec![a, b]), v(json!({})));
        assert!(equal(&out, &v(json!({"x": 1.0, "y": 2.0}))));
    }

    #[test]
    fn convert_scalar_table() {
        let ctx = Context::new();
        assert!(equal(
            &convert(&ctx, &Schema::number(), v(json!("42.5"))),
            &Value::number(42.5)
        ));
        assert!(equal(
            &convert(&ctx, &Schema::boolean(), v(json!("TRUE"))),
            &Value::Bool(true)
        ));
        assert!(equal(
            &convert(&ctx, &Schema::boolean(), v(json!(0))),
            &Value::Bool(false)
        ));
        assert!(equal(
            &convert(&ctx, &Schema::number(), v(json!(true))),
            &Value::number(1.0)
        ));
        assert!(equal(
            &convert(&ctx, &Schema::string(), v(json!(3.0))),
            &Value::string("3")
        ));
        // bigint via integer truncation of the numeric parse
        assert!(equal(
            &convert(&ctx, &Schema::bigint(), v(json!("12.9"))),
            &Value::BigInt(12)
        ));
    }

    #[test]
    fn convert_passes_through_inconvertible_values() {
        let ctx = Context::new();
        let out = convert(&ctx, &Schema::number(), v(json!("not a number")));
        assert!(equal(&out, &v(json!("not a number"))));
        let out = convert(&ctx, &Schema::boolean(), v(json!([1, 2])));
        assert!(equal(&out, &v(json!([1, 2]))));
    }

    #[test]
    fn convert_recurses_into_composites() {
        let s = Schema::object(vec![("n", Schema::number()), ("b", Schema::boolean())]);
        let out = convert(&Context::new(), &s, v(json!({"n": "7", "b": "false"})));
        assert!(equal(&out, &v(json!({"n": 7.0, "b": false}))));
    }

    #[test]
    fn convert_number_to_date() {
        let out = convert(&Context::new(), &Schema::date(), v(json!(0)));
        assert!(matches!(out, Value::Date(d) if d.timestamp_millis() == 0));
    }

    #[test]
    fn clean_drops_closed_object_extras() {
        let s = Schema::object_with(
            vec![("x", Schema::number())],
            ["x".to_string()].into(),
            Additional::Closed,
        );
        let out = clean(&Context::new(), &s, v(json!({"x": 1, "junk": true})));
        assert!(equal(&out, &v(json!({"x": 1}))));
    }

    #[test]
    fn clean_truncates_tuple_overflow() {
        let s = Schema::tuple(vec![Schema::number(), Schema::number()]);
        let out = clean(&Context::new(), &s, v(json!([1, 2, 3])));
        assert!(equal(&out, &v(json!([1, 2]))));
    }

    #[test]
    fn clean_filters_record_keys() {
        let s = Schema::record("^[a-z]+$", Schema::number());
        let out = clean(&Context::new(), &s, v(json!({"ok": 1, "NOPE": 2})));
        assert!(equal(&out, &v(json!({"ok": 1}))));
    }

    #[test]
    fn clean_is_idempotent() {
        let s = Schema::object_with(
            vec![("x", Schema::tuple(vec![Schema::number()]))],
            ["x".to_string()].into(),
            Additional::Closed,
        );
        let ctx = Context::new();
        let once = clean(&ctx, &s, v(json!({"x": [1, 2], "junk": 0})));
        let twice = clean(&ctx, &s, clone_value(&once));
        assert!(equal(&once, &twice));
        assert!(equal(&once, &v(json!({"x": [1]}))));
    }

    #[test]
    fn clean_union_uses_first_satisfying_variant() {
        let closed = Schema::object_with(
            vec![("x", Schema::number())],
            ["x".to_string()].into(),
            Additional::Closed,
        );
        let open = Schema::object(vec![("x", Schema::number())]);
        let s = Schema::union(vec![closed, open.clone()]);
        // value satisfies only the open variant unmodified, so extras survive
        let out = clean(&Context::new(), &s, v(json!({"x": 1, "extra": 2})));
        assert!(equal(&out, &v(json!({"x": 1, "extra": 2}))));
        // a value already matching the closed variant cleans against it
        let out = clean(&Context::new(), &s, v(json!({"x": 1})));
        assert!(equal(&out, &v(json!({"x": 1}))));
    }
}
