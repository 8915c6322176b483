//! Boolean validation: pure structural match, no diagnostics allocated.
//!
//! Composite handling mirrors the subtype relation's dispatch. Intersections
//! carry the cross-member rule: when any member closes its properties, only
//! keys evaluated by *some* member are permitted, so individual members are
//! checked with their own closing relaxed and the unevaluated-key sweep runs
//! once over the whole intersection.

use std::collections::HashSet;

use crate::context::Context;
use crate::schema::{Additional, Constraints, Schema, SchemaKind, pattern_matches};
use crate::settings;
use crate::structural::equal;
use crate::value::Value;

pub fn check(ctx: &Context, schema: &Schema, value: &Value) -> bool {
    let mut guard = HashSet::new();
    check_rec(ctx, schema, value, &mut guard, false)
}

// Guard keys: (schema identity, value address). Cycles in a schema graph must
// traverse a Ref, so the guard is maintained at reference resolution.
type Guard = HashSet<(usize, usize)>;

fn value_addr(value: &Value) -> usize {
    value as *const Value as usize
}

pub(crate) fn check_rec(
    ctx: &Context,
    schema: &Schema,
    value: &Value,
    guard: &mut Guard,
    relax_closed: bool,
) -> bool {
    let c = schema.constraints();
    match schema.kind() {
        SchemaKind::Any | SchemaKind::Unknown => true,
        SchemaKind::Never => false,
        SchemaKind::Null => matches!(value, Value::Null),
        SchemaKind::Undefined | SchemaKind::Void => matches!(value, Value::Undefined),
        SchemaKind::Boolean => matches!(value, Value::Bool(_)),
        SchemaKind::Number => match value {
            Value::Number(n) => numeric_ok(c, n.0),
            _ => false,
        },
        SchemaKind::Integer => match value {
            Value::Number(n) => n.0.fract() == 0.0 && n.0.is_finite() && numeric_ok(c, n.0),
            _ => false,
        },
        SchemaKind::BigInt => match value {
            Value::BigInt(i) => numeric_ok(c, *i as f64),
            _ => false,
        },
        SchemaKind::String => match value {
            Value::String(s) => string_ok(c, s),
            _ => false,
        },
        SchemaKind::Symbol => matches!(value, Value::Symbol(_)),
        SchemaKind::Literal(expected) => equal(expected, value),
        SchemaKind::Date => matches!(value, Value::Date(_)),
        SchemaKind::Bytes => match value {
            Value::Bytes(b) => length_ok(c, b.len()),
            _ => false,
        },
        SchemaKind::Array { items } => match value {
            Value::Array(xs) => array_ok(ctx, c, items, xs, guard),
            _ => false,
        },
        SchemaKind::Tuple { items } => match value {
            Value::Array(xs) => {
                xs.len() == items.len()
                    && items
                        .iter()
                        .zip(xs)
                        .all(|(s, v)| check_rec(ctx, s, v, guard, false))
            }
            _ => false,
        },
        SchemaKind::Object {
            properties,
            required,
            additional,
        } => match value {
            Value::Object(map) => object_ok(
                ctx,
                c,
                properties,
                required,
                additional,
                map,
                guard,
                relax_closed,
            ),
            _ => false,
        },
        SchemaKind::Record { key_pattern, value: vs } => match value {
            Value::Object(map) => {
                if !property_count_ok(c, map.len()) {
                    return false;
                }
                map.iter().all(|(k, v)| {
                    pattern_matches(key_pattern, k) && check_rec(ctx, vs, v, guard, false)
                })
            }
            _ => false,
        },
        SchemaKind::Union(variants) => variants
            .iter()
            .any(|v| check_rec(ctx, v, value, guard, false)),
        SchemaKind::Intersect(members) => {
            check_intersect(ctx, members, value, guard)
        }
        SchemaKind::Ref(name) => {
            let key = (schema.id(), value_addr(value));
            if !guard.insert(key) {
                return true; // already on the active path; close the branch
            }
            let out = match ctx.resolve(name) {
                Some(target) => check_rec(ctx, target, value, guard, relax_closed),
                None => false, // dangling reference: mismatch, not a panic
            };
            guard.remove(&key);
            out
        }
        SchemaKind::Callable => matches!(value, Value::Func(_)),
        SchemaKind::Iterator | SchemaKind::AsyncIterator => matches!(value, Value::Iter(_)),
        SchemaKind::Custom(name) => settings::check_kind(name, value),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// CONSTRAINT ARMS
// ————————————————————————————————————————————————————————————————————————————

fn numeric_ok(c: &Constraints, n: f64) -> bool {
    if c.minimum.is_some_and(|m| n < m) {
        return false;
    }
    if c.maximum.is_some_and(|m| n > m) {
        return false;
    }
    if c.exclusive_minimum.is_some_and(|m| n <= m) {
        return false;
    }
    if c.exclusive_maximum.is_some_and(|m| n >= m) {
        return false;
    }
    if c.multiple_of.is_some_and(|m| m != 0.0 && n % m != 0.0) {
        return false;
    }
    true
}

fn string_ok(c: &Constraints, s: &str) -> bool {
    let chars = s.chars().count();
    if c.min_length.is_some_and(|m| chars < m) {
        return false;
    }
    if c.max_length.is_some_and(|m| chars > m) {
        return false;
    }
    if let Some(pattern) = &c.pattern {
        if !pattern_matches(pattern, s) {
            return false;
        }
    }
    if let Some(format) = &c.format {
        if !settings::check_format(format, s) {
            return false;
        }
    }
    true
}

fn length_ok(c: &Constraints, len: usize) -> bool {
    !c.min_length.is_some_and(|m| len < m) && !c.max_length.is_some_and(|m| len > m)
}

fn property_count_ok(c: &Constraints, count: usize) -> bool {
    !c.min_properties.is_some_and(|m| count < m) && !c.max_properties.is_some_and(|m| count > m)
}

fn array_ok(
    ctx: &Context,
    c: &Constraints,
    items: &Schema,
    xs: &[Value],
    guard: &mut Guard,
) -> bool {
    if c.min_items.is_some_and(|m| xs.len() < m) {
        return false;
    }
    if c.max_items.is_some_and(|m| xs.len() > m) {
        return false;
    }
    if !xs.iter().all(|v| check_rec(ctx, items, v, guard, false)) {
        return false;
    }
    if c.unique_items {
        let mut seen: HashSet<&Value> = HashSet::with_capacity(xs.len());
        if !xs.iter().all(|v| seen.insert(v)) {
            return false;
        }
    }
    // min/max contains only apply when a contains schema is declared
    if let Some(contains) = &c.contains {
        let hits = xs
            .iter()
            .filter(|v| check_rec(ctx, contains, v, guard, false))
            .count();
        let floor = c.min_contains.unwrap_or(1);
        if hits < floor {
            return false;
        }
        if c.max_contains.is_some_and(|m| hits > m) {
            return false;
        }
    }
    true
}

#[allow(clippy::too_many_arguments)]
fn object_ok(
    ctx: &Context,
    c: &Constraints,
    properties: &indexmap::IndexMap<String, Schema>,
    required: &std::collections::BTreeSet<String>,
    additional: &Additional,
    map: &indexmap::IndexMap<String, Value>,
    guard: &mut Guard,
    relax_closed: bool,
) -> bool {
    if !property_count_ok(c, map.len()) {
        return false;
    }
    let exact_optional = settings::get().exact_optional_property_types;
    for (name, prop) in properties {
        match map.get(name) {
            Some(v) => {
                // An explicit undefined on an optional property counts as
                // absent unless exactOptionalPropertyTypes is set.
                if v.is_undefined() && !required.contains(name) && !exact_optional {
                    continue;
                }
                if !check_rec(ctx, prop, v, guard, false) {
                    return false;
                }
            }
            None => {
                if required.contains(name) {
                    return false;
                }
            }
        }
    }
    match additional {
        Additional::Open => true,
        Additional::Closed => {
            relax_closed || map.keys().all(|k| properties.contains_key(k))
        }
        Additional::Schema(extra) => map
            .iter()
            .filter(|(k, _)| !properties.contains_key(*k))
            .all(|(_, v)| check_rec(ctx, extra, v, guard, false)),
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERSECTION
// ————————————————————————————————————————————————————————————————————————————

fn check_intersect(ctx: &Context, members: &[Schema], value: &Value, guard: &mut Guard) -> bool {
    // Members are checked with their own closing relaxed; the cross-member
    // unevaluated-key sweep below restores strictness for the whole group.
    if !members
        .iter()
        .all(|m| check_rec(ctx, m, value, guard, true))
    {
        return false;
    }
    if let Value::Object(map) = value {
        if members.iter().any(|m| declares_closed(ctx, m, 0)) {
            for key in map.keys() {
                if !members.iter().any(|m| claims_key(ctx, m, key, 0)) {
                    return false;
                }
            }
        }
    }
    true
}

// Depth cap keeps pathological ref chains from spinning; real schemas are
// nowhere near it.
const MEMBER_SCAN_DEPTH: usize = 64;

fn declares_closed(ctx: &Context, schema: &Schema, depth: usize) -> bool {
    if depth > MEMBER_SCAN_DEPTH {
        return false;
    }
    match schema.kind() {
        SchemaKind::Object { additional, .. } => matches!(additional, Additional::Closed),
        SchemaKind::Intersect(members) => {
            members.iter().any(|m| declares_closed(ctx, m, depth + 1))
        }
        SchemaKind::Ref(name) => ctx
            .resolve(name)
            .is_some_and(|t| declares_closed(ctx, t, depth + 1)),
        _ => false,
    }
}

fn claims_key(ctx: &Context, schema: &Schema, key: &str, depth: usize) -> bool {
    if depth > MEMBER_SCAN_DEPTH {
        return false;
    }
    match schema.kind() {
        SchemaKind::Object {
            properties,
            additional,
            ..
        } => {
            properties.contains_key(key) || matches!(additional, Additional::Schema(_))
        }
        SchemaKind::Record { key_pattern, .. } => pattern_matches(key_pattern, key),
        SchemaKind::Intersect(members) => {
            members.iter().any(|m| claims_key(ctx, m, key, depth + 1))
        }
        SchemaKind::Union(variants) => {
            variants.iter().any(|v| claims_key(ctx, v, key, depth + 1))
        }
        SchemaKind::Ref(name) => ctx
            .resolve(name)
            .is_some_and(|t| claims_key(ctx, t, key, depth + 1)),
        _ => false,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Additional;
    use serde_json::json;

    fn ok(schema: &Schema, v: serde_json::Value) -> bool {
        check(&Context::new(), schema, &Value::from(v))
    }

    #[test]
    fn leaf_kinds_match() {
        assert!(ok(&Schema::number(), json!(1.5)));
        assert!(!ok(&Schema::number(), json!("1.5")));
        assert!(ok(&Schema::integer(), json!(3)));
        assert!(!ok(&Schema::integer(), json!(3.5)));
        assert!(ok(&Schema::null(), json!(null)));
        assert!(!ok(&Schema::never(), json!(null)));
        assert!(ok(&Schema::any(), json!({"anything": true})));
    }

    #[test]
    fn numeric_constraints_apply() {
        let s = Schema::number().with_range(Some(0.0), Some(10.0));
        assert!(ok(&s, json!(5)));
        assert!(!ok(&s, json!(-1)));
        assert!(!ok(&s, json!(11)));
        let mut c = Constraints::default();
        c.multiple_of = Some(4.0);
        let s = Schema::integer().with_constraints(c);
        assert!(ok(&s, json!(8)));
        assert!(!ok(&s, json!(9)));
    }

    #[test]
    fn string_pattern_and_length() {
        let s = Schema::string()
            .with_length(Some(2), Some(4))
            .with_pattern("^[a-z]+$");
        assert!(ok(&s, json!("abc")));
        assert!(!ok(&s, json!("a")));
        assert!(!ok(&s, json!("abcde")));
        assert!(!ok(&s, json!("AB")));
    }

    #[test]
    fn format_consults_registry() {
        settings::register_format("hex4", |s: &str| {
            s.len() == 4 && s.bytes().all(|b| b.is_ascii_hexdigit())
        });
        let s = Schema::string().with_format("hex4");
        assert!(ok(&s, json!("a0f3")));
        assert!(!ok(&s, json!("zzzz")));
        settings::unregister_format("hex4");
        // unknown format fails closed
        assert!(!ok(&s, json!("a0f3")));
    }

    #[test]
    fn closed_object_rejects_unknown_keys() {
        let s = Schema::object_with(
            vec![("x", Schema::number())],
            ["x".to_string()].into(),
            Additional::Closed,
        );
        assert!(ok(&s, json!({"x": 1})));
        assert!(!ok(&s, json!({"x": 1, "y": 2})));
        assert!(!ok(&s, json!({})));
    }

    #[test]
    fn additional_schema_checks_unknown_keys() {
        let s = Schema::object_with(
            vec![("x", Schema::number())],
            ["x".to_string()].into(),
            Additional::Schema(Schema::string()),
        );
        assert!(ok(&s, json!({"x": 1, "note": "fine"})));
        assert!(!ok(&s, json!({"x": 1, "note": 2})));
    }

    #[test]
    fn optional_undefined_depends_on_exact_optional() {
        let s = Schema::object_with(
            vec![("x", Schema::number())],
            std::collections::BTreeSet::new(),
            Additional::Open,
        );
        let mut m = indexmap::IndexMap::new();
        m.insert("x".to_string(), Value::Undefined);
        let v = Value::Object(m);
        settings::with_settings(settings::Settings::default(), || {
            assert!(check(&Context::new(), &s, &v));
        });
        settings::with_settings(
            settings::Settings {
                exact_optional_property_types: true,
                ..Default::default()
            },
            || assert!(!check(&Context::new(), &s, &v)),
        );
    }

    #[test]
    fn tuple_requires_exact_length() {
        let s = Schema::tuple(vec![Schema::number(), Schema::number()]);
        assert!(ok(&s, json!([1, 2])));
        assert!(!ok(&s, json!([1, 2, 3])));
        assert!(!ok(&s, json!([1])));
    }

    #[test]
    fn union_needs_one_variant() {
        let s = Schema::union(vec![Schema::number(), Schema::string()]);
        assert!(ok(&s, json!(1)));
        assert!(ok(&s, json!("x")));
        assert!(!ok(&s, json!(true)));
        assert!(!ok(&Schema::union(vec![]), json!(1)));
    }

    #[test]
    fn intersect_tracks_unevaluated_properties() {
        let a = Schema::object_with(
            vec![("x", Schema::number())],
            ["x".to_string()].into(),
            Additional::Closed,
        );
        let b = Schema::object(vec![("y", Schema::number())]);
        let s = Schema::intersect(vec![a, b]);
        // y is evaluated by the second member even though the first closes
        assert!(ok(&s, json!({"x": 1, "y": 2})));
        // z is evaluated by no member
        assert!(!ok(&s, json!({"x": 1, "y": 2, "z": 3})));
    }

    #[test]
    fn open_intersect_allows_extra_keys() {
        let a = Schema::object(vec![("x", Schema::number())]);
        let b = Schema::object(vec![("y", Schema::number())]);
        let s = Schema::intersect(vec![a, b]);
        assert!(ok(&s, json!({"x": 1, "y": 2, "z": 3})));
    }

    #[test]
    fn contains_bounds_count_matching_items() {
        let s = Schema::array(Schema::any()).with_contains(Schema::number(), Some(2), Some(3));
        assert!(ok(&s, json!([1, "a", 2])));
        assert!(!ok(&s, json!([1, "a"])));
        assert!(!ok(&s, json!([1, 2, 3, 4])));
        // without a contains schema the bounds are ignored
        let mut c = Constraints::default();
        c.min_contains = Some(5);
        let s = Schema::array(Schema::any()).with_constraints(c);
        assert!(ok(&s, json!([])));
    }

    #[test]
    fn unique_items_rejects_structural_duplicates() {
        let s = Schema::array(Schema::any()).with_unique_items();
        assert!(ok(&s, json!([{"a": 1}, {"a": 2}])));
        assert!(!ok(&s, json!([{"a": 1}, {"a": 1}])));
    }

    #[test]
    fn record_keys_must_match_pattern() {
        let s = Schema::record("^[a-z]+$", Schema::number());
        assert!(ok(&s, json!({"abc": 1, "de": 2})));
        assert!(!ok(&s, json!({"abc": 1, "DE": 2})));
        assert!(!ok(&s, json!({"abc": "not a number"})));
    }

    #[test]
    fn recursive_schema_terminates() {
        let node = Schema::object_with(
            vec![
                ("value", Schema::number()),
                ("next", Schema::union(vec![Schema::null(), Schema::reference("node")])),
            ],
            ["value".to_string(), "next".to_string()].into(),
            Additional::Open,
        );
        let ctx = Context::new().with("node", node);
        let s = Schema::reference("node");
        let good = Value::from(json!({"value": 1, "next": {"value": 2, "next": null}}));
        let bad = Value::from(json!({"value": 1, "next": {"value": "x", "next": null}}));
        assert!(check(&ctx, &s, &good));
        assert!(!check(&ctx, &s, &bad));
    }

    #[test]
    fn custom_kind_dispatches_through_registry() {
        settings::register_kind("positive", |v: &Value| v.as_f64().is_some_and(|n| n > 0.0));
        let s = Schema::custom("positive");
        assert!(ok(&s, json!(3)));
        assert!(!ok(&s, json!(-3)));
        settings::unregister_kind("positive");
        assert!(!ok(&s, json!(3)));
    }

    #[test]
    fn opaque_kinds_match_handles_only() {
        use crate::value::Opaque;
        assert!(check(
            &Context::new(),
            &Schema::callable(),
            &Value::Func(Opaque::new(None))
        ));
        assert!(!ok(&Schema::callable(), json!({})));
        assert!(check(
            &Context::new(),
            &Schema::iterator(),
            &Value::Iter(Opaque::new(None))
        ));
        assert!(check(
            &Context::new(),
            &Schema::async_iterator(),
            &Value::Iter(Opaque::new(None))
        ));
    }
}
