//! Diagnostic enumeration: a finite, bounded sequence of `ValueError`s.
//!
//! Depth-first over (schema, value), stopping as soon as the process-wide
//! `max_errors` bound is reached so a pathological or cyclic schema cannot
//! turn diagnosis into a denial of service. A bound of zero disables
//! collection entirely; `check` is unaffected. Union mismatches report
//! against the closest variant (fewest structural mismatches) instead of
//! spraying every variant's complaints.

use std::collections::HashSet;

use crate::check::check_rec;
use crate::context::Context;
use crate::error::ValueError;
use crate::schema::{Additional, Schema, SchemaKind, pattern_matches};
use crate::settings;
use crate::structural::equal;
use crate::value::Value;

/// Finite iterator over collected diagnostics. Callers may stop pulling
/// early; the traversal cost was already bounded by `max_errors`.
pub struct ErrorIter {
    inner: std::vec::IntoIter<ValueError>,
}

impl Iterator for ErrorIter {
    type Item = ValueError;

    fn next(&mut self) -> Option<ValueError> {
        self.inner.next()
    }
}

pub fn errors(ctx: &Context, schema: &Schema, value: &Value) -> ErrorIter {
    ErrorIter {
        inner: collect_errors(ctx, schema, value).into_iter(),
    }
}

pub(crate) fn collect_errors(ctx: &Context, schema: &Schema, value: &Value) -> Vec<ValueError> {
    let limit = settings::get().max_errors;
    let mut col = Collector {
        out: Vec::new(),
        limit,
    };
    if limit > 0 {
        let mut guard = HashSet::new();
        visit(ctx, schema, value, "", &mut col, &mut guard, false);
    }
    col.out
}

// ————————————————————————————————————————————————————————————————————————————
// COLLECTOR
// ————————————————————————————————————————————————————————————————————————————

struct Collector {
    out: Vec<ValueError>,
    limit: usize,
}

impl Collector {
    fn full(&self) -> bool {
        self.out.len() >= self.limit
    }

    fn push(&mut self, path: &str, schema: &Schema, value: &Value, message: String) {
        if !self.full() {
            self.out.push(ValueError {
                path: path.to_string(),
                schema: schema.clone(),
                value: value.clone(),
                message,
            });
        }
    }
}

fn child(path: &str, segment: &str) -> String {
    format!("{path}/{segment}")
}

type Guard = HashSet<(usize, usize)>;

fn value_addr(value: &Value) -> usize {
    value as *const Value as usize
}

// ————————————————————————————————————————————————————————————————————————————
// TRAVERSAL
// ————————————————————————————————————————————————————————————————————————————

// `relax_closed` suppresses a member's own Closed policy inside an
// intersection; the cross-member unevaluated sweep restores strictness.
fn visit(
    ctx: &Context,
    schema: &Schema,
    value: &Value,
    path: &str,
    col: &mut Collector,
    guard: &mut Guard,
    relax_closed: bool,
) {
    if col.full() {
        return;
    }
    let c = schema.constraints();
    match schema.kind() {
        SchemaKind::Any | SchemaKind::Unknown => {}
        SchemaKind::Never => col.push(path, schema, value, "no value satisfies never".into()),
        SchemaKind::Null
        | SchemaKind::Undefined
        | SchemaKind::Void
        | SchemaKind::Boolean
        | SchemaKind::Number
        | SchemaKind::Integer
        | SchemaKind::BigInt
        | SchemaKind::String
        | SchemaKind::Symbol
        | SchemaKind::Date
        | SchemaKind::Bytes
        | SchemaKind::Callable
        | SchemaKind::Iterator
        | SchemaKind::AsyncIterator
        | SchemaKind::Custom(_) => {
            let mut leaf_guard = HashSet::new();
            if !check_rec(ctx, schema, value, &mut leaf_guard, false) {
                col.push(
                    path,
                    schema,
                    value,
                    format!("expected {}, found {}", schema.kind_name(), value.kind_name()),
                );
            }
        }
        SchemaKind::Literal(expected) => {
            if !equal(expected, value) {
                col.push(
                    path,
                    schema,
                    value,
                    format!("expected literal {}, found {}", expected.kind_name(), value.kind_name()),
                );
            }
        }
        SchemaKind::Array { items } => match value {
            Value::Array(xs) => {
                if let Some(m) = c.min_items.filter(|m| xs.len() < *m) {
                    col.push(path, schema, value, format!("expected at least {m} items, found {}", xs.len()));
                }
                if let Some(m) = c.max_items.filter(|m| xs.len() > *m) {
                    col.push(path, schema, value, format!("expected at most {m} items, found {}", xs.len()));
                }
                if c.unique_items {
                    let mut seen: HashSet<&Value> = HashSet::new();
                    for (i, x) in xs.iter().enumerate() {
                        if !seen.insert(x) {
                            col.push(&child(path, &i.to_string()), schema, x, "duplicate item in unique array".into());
                        }
                    }
                }
                if let Some(contains) = &c.contains {
                    let mut leaf_guard = HashSet::new();
                    let hits = xs
                        .iter()
                        .filter(|v| check_rec(ctx, contains, v, &mut leaf_guard, false))
                        .count();
                    let floor = c.min_contains.unwrap_or(1);
                    if hits < floor {
                        col.push(path, schema, value, format!("expected at least {floor} matching items, found {hits}"));
                    }
                    if let Some(m) = c.max_contains.filter(|m| hits > *m) {
                        col.push(path, schema, value, format!("expected at most {m} matching items, found {hits}"));
                    }
                }
                for (i, x) in xs.iter().enumerate() {
                    if col.full() {
                        return;
                    }
                    visit(ctx, items, x, &child(path, &i.to_string()), col, guard, false);
                }
            }
            _ => col.push(path, schema, value, format!("expected array, found {}", value.kind_name())),
        },
        SchemaKind::Tuple { items } => match value {
            Value::Array(xs) => {
                if xs.len() != items.len() {
                    col.push(path, schema, value, format!("expected tuple of length {}, found {}", items.len(), xs.len()));
                }
                for (i, (s, x)) in items.iter().zip(xs).enumerate() {
                    if col.full() {
                        return;
                    }
                    visit(ctx, s, x, &child(path, &i.to_string()), col, guard, false);
                }
            }
            _ => col.push(path, schema, value, format!("expected tuple, found {}", value.kind_name())),
        },
        SchemaKind::Object {
            properties,
            required,
            additional,
        } => match value {
            Value::Object(map) => {
                let exact_optional = settings::get().exact_optional_property_types;
                for (name, prop) in properties {
                    if col.full() {
                        return;
                    }
                    match map.get(name) {
                        Some(v) => {
                            if v.is_undefined() && !required.contains(name) && !exact_optional {
                                continue;
                            }
                            visit(ctx, prop, v, &child(path, name), col, guard, false);
                        }
                        None => {
                            if required.contains(name) {
                                col.push(&child(path, name), prop, &Value::Undefined, format!("missing required property '{name}'"));
                            }
                        }
                    }
                }
                match additional {
                    Additional::Closed if !relax_closed => {
                        for key in map.keys() {
                            if !properties.contains_key(key) {
                                col.push(&child(path, key), schema, &map[key.as_str()], format!("unexpected property '{key}'"));
                            }
                        }
                    }
                    Additional::Schema(extra) => {
                        for (key, v) in map {
                            if !properties.contains_key(key) {
                                visit(ctx, extra, v, &child(path, key), col, guard, false);
                            }
                        }
                    }
                    Additional::Open | Additional::Closed => {}
                }
            }
            _ => col.push(path, schema, value, format!("expected object, found {}", value.kind_name())),
        },
        SchemaKind::Record { key_pattern, value: vs } => match value {
            Value::Object(map) => {
                for (key, v) in map {
                    if col.full() {
                        return;
                    }
                    if !pattern_matches(key_pattern, key) {
                        col.push(&child(path, key), schema, v, format!("key '{key}' does not match pattern {key_pattern}"));
                        continue;
                    }
                    visit(ctx, vs, v, &child(path, key), col, guard, false);
                }
            }
            _ => col.push(path, schema, value, format!("expected record object, found {}", value.kind_name())),
        },
        SchemaKind::Union(variants) => {
            let mut whole_guard = HashSet::new();
            if check_rec(ctx, schema, value, &mut whole_guard, false) {
                return;
            }
            if variants.is_empty() {
                col.push(path, schema, value, "no value satisfies an empty union".into());
                return;
            }
            // Report against the closest variant only, to keep messages
            // actionable instead of enumerating every branch's complaints.
            if let Some(closest) = variants.iter().min_by_key(|v| mismatch_count(ctx, v, value)) {
                visit(ctx, closest, value, path, col, guard, false);
            }
        }
        SchemaKind::Intersect(members) => {
            for m in members {
                if col.full() {
                    return;
                }
                visit(ctx, m, value, path, col, guard, true);
            }
            if let Value::Object(map) = value {
                if members.iter().any(|m| super_closed(ctx, m)) {
                    for key in map.keys() {
                        if !members.iter().any(|m| member_claims(ctx, m, key)) {
                            col.push(&child(path, key), schema, &map[key.as_str()], format!("property '{key}' is not evaluated by any intersection member"));
                        }
                    }
                }
            }
        }
        SchemaKind::Ref(name) => {
            let key = (schema.id(), value_addr(value));
            if !guard.insert(key) {
                return; // pair already on the active path: no further errors
            }
            match ctx.resolve(name) {
                Some(target) => visit(ctx, target, value, path, col, guard, relax_closed),
                None => col.push(path, schema, value, format!("unresolved schema reference '{name}'")),
            }
            guard.remove(&key);
        }
    }
}

/// Structural distance used to pick the closest union variant.
fn mismatch_count(ctx: &Context, schema: &Schema, value: &Value) -> usize {
    collect_errors_with_limit(ctx, schema, value, settings::get().max_errors.max(1)).len()
}

fn collect_errors_with_limit(
    ctx: &Context,
    schema: &Schema,
    value: &Value,
    limit: usize,
) -> Vec<ValueError> {
    let mut col = Collector {
        out: Vec::new(),
        limit,
    };
    let mut guard = HashSet::new();
    visit(ctx, schema, value, "", &mut col, &mut guard, false);
    col.out
}

// Intersection sweeps reuse the closed/claims scans; plain wrappers keep the
// recursion depth bookkeeping out of this module.
fn super_closed(ctx: &Context, schema: &Schema) -> bool {
    matches!(
        ctx.deref(schema).map(Schema::kind),
        Some(SchemaKind::Object {
            additional: Additional::Closed,
            ..
        })
    ) || matches!(schema.kind(), SchemaKind::Intersect(ms) if ms.iter().any(|m| super_closed(ctx, m)))
}

fn member_claims(ctx: &Context, schema: &Schema, key: &str) -> bool {
    match ctx.deref(schema).map(Schema::kind) {
        Some(SchemaKind::Object {
            properties,
            additional,
            ..
        }) => properties.contains_key(key) || matches!(additional, Additional::Schema(_)),
        Some(SchemaKind::Record { key_pattern, .. }) => pattern_matches(key_pattern, key),
        Some(SchemaKind::Intersect(members)) => {
            members.iter().any(|m| member_claims(ctx, m, key))
        }
        Some(SchemaKind::Union(variants)) => variants.iter().any(|v| member_claims(ctx, v, key)),
        _ => false,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::check;
    use crate::settings::{Settings, with_settings};
    use serde_json::json;

    fn all_errors(schema: &Schema, v: serde_json::Value) -> Vec<ValueError> {
        errors(&Context::new(), schema, &Value::from(v)).collect()
    }

    #[test]
    fn valid_value_yields_no_errors() {
        let s = Schema::object(vec![("x", Schema::number())]);
        assert!(all_errors(&s, json!({"x": 1})).is_empty());
    }

    #[test]
    fn paths_are_slash_segmented() {
        let s = Schema::object(vec![(
            "items",
            Schema::array(Schema::object(vec![("id", Schema::number())])),
        )]);
        let errs = all_errors(&s, json!({"items": [{"id": 1}, {"id": "two"}]}));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path, "/items/1/id");
        assert!(errs[0].message.contains("expected number"));
    }

    #[test]
    fn missing_required_property_is_reported() {
        let s = Schema::object(vec![("x", Schema::number()), ("y", Schema::number())]);
        let errs = all_errors(&s, json!({"x": 1}));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path, "/y");
        assert!(errs[0].message.contains("missing required"));
    }

    #[test]
    fn max_errors_bounds_the_stream() {
        let s = Schema::array(Schema::number());
        let bad = json!(["a", "b", "c", "d", "e"]);
        with_settings(
            Settings {
                max_errors: 2,
                ..Default::default()
            },
            || {
                let errs = all_errors(&s, bad.clone());
                assert_eq!(errs.len(), 2);
            },
        );
    }

    #[test]
    fn max_errors_zero_disables_collection_but_not_check() {
        let s = Schema::number();
        with_settings(
            Settings {
                max_errors: 0,
                ..Default::default()
            },
            || {
                assert!(all_errors(&s, json!("nope")).is_empty());
                assert!(!check(&Context::new(), &s, &Value::from(json!("nope"))));
            },
        );
    }

    #[test]
    fn union_reports_closest_variant_only() {
        let obj = Schema::object(vec![("x", Schema::number()), ("y", Schema::number())]);
        let s = Schema::union(vec![Schema::string(), obj]);
        // close to the object variant: only y is wrong
        let errs = all_errors(&s, json!({"x": 1, "y": "two"}));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path, "/y");
    }

    #[test]
    fn cyclic_schema_produces_finite_errors() {
        let node = Schema::object(vec![
            ("value", Schema::number()),
            ("next", Schema::union(vec![Schema::null(), Schema::reference("node")])),
        ]);
        let ctx = Context::new().with("node", node);
        let s = Schema::reference("node");
        let bad = Value::from(json!({"value": "x", "next": {"value": "y", "next": null}}));
        let errs: Vec<_> = errors(&ctx, &s, &bad).collect();
        assert!(!errs.is_empty());
        assert!(errs.len() <= settings::get().max_errors);
    }

    #[test]
    fn dangling_reference_is_reported_not_panicked() {
        let s = Schema::reference("missing");
        let errs = all_errors(&s, json!(1));
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("unresolved"));
    }

    #[test]
    fn unevaluated_intersection_property_is_named() {
        let a = Schema::object_with(
            vec![("x", Schema::number())],
            ["x".to_string()].into(),
            Additional::Closed,
        );
        let b = Schema::object(vec![("y", Schema::number())]);
        let s = Schema::intersect(vec![a, b]);
        let errs = all_errors(&s, json!({"x": 1, "y": 2, "z": 3}));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].path, "/z");
        assert!(errs[0].message.contains("not evaluated"));
    }
}
