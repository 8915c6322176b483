//! Structural subtype relation with a three-valued result.
//!
//! `Union` is a first-class answer, not an error: it signals "true for some
//! but not all interpretations", the way a conditional type distributes over
//! a generic union. Callers that only need a boolean discard it explicitly.
//!
//! Dispatch is right-operand-first; union variants on the left distribute
//! before anything else so the distribution law holds for every target.
//! `Ref` nodes resolve through the context, and a (left, right) pair already
//! on the resolution stack short-circuits to `True`.

use std::collections::HashSet;

use crate::context::Context;
use crate::schema::{Schema, SchemaKind};
use crate::structural::equal;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extends {
    True,
    False,
    /// True for some but not all interpretations of the operands.
    Union,
}

pub fn extends(ctx: &Context, left: &Schema, right: &Schema) -> Extends {
    let mut seen = HashSet::new();
    extends_rec(ctx, left, right, &mut seen)
}

// ————————————————————————————————————————————————————————————————————————————
// THREE-VALUED FOLDS
// ————————————————————————————————————————————————————————————————————————————

/// Left-union distribution: all `True` => `True`, all `False` => `False`,
/// anything mixed => `Union`. Empty input behaves as `Never` on the left.
fn fold_every(results: impl IntoIterator<Item = Extends>) -> Extends {
    let mut saw_true = false;
    let mut saw_other = false;
    for r in results {
        match r {
            Extends::True => saw_true = true,
            Extends::False => saw_other = true,
            Extends::Union => return Extends::Union,
        }
        if saw_true && saw_other {
            return Extends::Union;
        }
    }
    if saw_other { Extends::False } else { Extends::True }
}

/// Conjunction: any `False` => `False`, any `Union` => `Union`, else `True`.
fn fold_all(results: impl IntoIterator<Item = Extends>) -> Extends {
    let mut out = Extends::True;
    for r in results {
        match r {
            Extends::False => return Extends::False,
            Extends::Union => out = Extends::Union,
            Extends::True => {}
        }
    }
    out
}

/// Disjunction: any `True` => `True`, all `False` => `False`, else `Union`.
fn fold_any(results: impl IntoIterator<Item = Extends>) -> Extends {
    let mut out = Extends::False;
    for r in results {
        match r {
            Extends::True => return Extends::True,
            Extends::Union => out = Extends::Union,
            Extends::False => {}
        }
    }
    out
}

// ————————————————————————————————————————————————————————————————————————————
// RELATION
// ————————————————————————————————————————————————————————————————————————————

fn extends_rec(
    ctx: &Context,
    left: &Schema,
    right: &Schema,
    seen: &mut HashSet<(usize, usize)>,
) -> Extends {
    // Resolve references first. A pair re-entered during its own resolution
    // is a cycle; answer True without unfolding further.
    if matches!(left.kind(), SchemaKind::Ref(_)) || matches!(right.kind(), SchemaKind::Ref(_)) {
        if !seen.insert((left.id(), right.id())) {
            return Extends::True;
        }
        let (Some(l), Some(r)) = (ctx.deref(left), ctx.deref(right)) else {
            return Extends::False; // dangling reference cannot be a subtype
        };
        return extends_rec(ctx, l, r, seen);
    }

    // Left union distributes over everything, including Never and Union
    // targets, so the distribution law holds for every T.
    if let SchemaKind::Union(variants) = left.kind() {
        return fold_every(variants.iter().map(|v| extends_rec(ctx, v, right, seen)));
    }

    // Never extends everything.
    if matches!(left.kind(), SchemaKind::Never) {
        return Extends::True;
    }

    match right.kind() {
        SchemaKind::Any | SchemaKind::Unknown => return Extends::True,
        SchemaKind::Never => return Extends::False,
        SchemaKind::Union(variants) => {
            if variants.is_empty() {
                return Extends::False; // empty union behaves as Never
            }
            // Any on the left is only partially absorbed by a union target.
            if matches!(left.kind(), SchemaKind::Any | SchemaKind::Unknown) {
                return Extends::Union;
            }
            return fold_any(variants.iter().map(|v| extends_rec(ctx, left, v, seen)));
        }
        _ => {}
    }

    // Any/Unknown against a non-trivial target: true for some assignments.
    if matches!(left.kind(), SchemaKind::Any | SchemaKind::Unknown) {
        return Extends::Union;
    }

    if let SchemaKind::Intersect(members) = right.kind() {
        if members.is_empty() {
            return Extends::True; // empty intersect behaves as Any
        }
        return fold_all(members.iter().map(|m| extends_rec(ctx, left, m, seen)));
    }

    if let SchemaKind::Intersect(members) = left.kind() {
        if members.is_empty() {
            return Extends::Union; // behaves as Any on the left
        }
        return fold_any(members.iter().map(|m| extends_rec(ctx, m, right, seen)));
    }

    structural(ctx, left, right, seen)
}

fn structural(
    ctx: &Context,
    left: &Schema,
    right: &Schema,
    seen: &mut HashSet<(usize, usize)>,
) -> Extends {
    use SchemaKind as K;

    match (left.kind(), right.kind()) {
        (K::Literal(a), K::Literal(b)) => bool_ext(equal(a, b)),
        (K::Literal(v), _) => bool_ext(literal_extends_base(v, right)),
        (_, K::Literal(_)) => Extends::False,

        // Integer ⊆ Number always; Number extends Integer is the documented
        // widening policy (preserved, not "fixed").
        (K::Integer, K::Number) => Extends::True,
        (K::Number, K::Integer) => Extends::True,

        (K::Null, K::Null) => Extends::True,
        (K::Undefined, K::Undefined | K::Void) => Extends::True,
        (K::Void, K::Void | K::Undefined) => Extends::True,
        (K::Boolean, K::Boolean) => Extends::True,
        (K::Number, K::Number) => Extends::True,
        (K::Integer, K::Integer) => Extends::True,
        (K::BigInt, K::BigInt) => Extends::True,
        (K::String, K::String) => Extends::True,
        (K::Symbol, K::Symbol) => Extends::True,
        (K::Date, K::Date) => Extends::True,
        (K::Bytes, K::Bytes) => Extends::True,

        // Opaque kinds: invocable/generator shape only, never deep.
        (K::Callable, K::Callable) => Extends::True,
        (K::Iterator, K::Iterator) => Extends::True,
        (K::AsyncIterator, K::AsyncIterator) => Extends::True,
        (K::Custom(a), K::Custom(b)) => bool_ext(a == b),

        (K::Array { items: li }, K::Array { items: ri }) => extends_rec(ctx, li, ri, seen),

        (K::Tuple { items: li }, K::Tuple { items: ri }) => {
            if li.len() != ri.len() {
                return Extends::False;
            }
            fold_all(
                li.iter()
                    .zip(ri)
                    .map(|(a, b)| extends_rec(ctx, a, b, seen)),
            )
        }

        (K::Tuple { items }, K::Array { items: ri }) => {
            fold_all(items.iter().map(|e| extends_rec(ctx, e, ri, seen)))
        }

        (
            K::Object {
                properties: lp, ..
            },
            K::Object {
                properties: rp,
                required: rr,
                ..
            },
        ) => {
            // Width subtyping: every property the target names must be
            // satisfiable from the left's properties.
            let mut results = Vec::new();
            for (name, rs) in rp {
                match lp.get(name) {
                    Some(ls) => results.push(extends_rec(ctx, ls, rs, seen)),
                    None if rr.contains(name) => return Extends::False,
                    None => {} // optional on the right, absent on the left
                }
            }
            fold_all(results)
        }

        (
            K::Object { properties, .. },
            K::Record {
                key_pattern,
                value,
            },
        ) => {
            let mut results = Vec::new();
            for (name, prop) in properties {
                if !crate::schema::pattern_matches(key_pattern, name) {
                    return Extends::False;
                }
                results.push(extends_rec(ctx, prop, value, seen));
            }
            fold_all(results)
        }

        (
            K::Record {
                key_pattern: lk,
                value: lv,
            },
            K::Record {
                key_pattern: rk,
                value: rv,
            },
        ) => {
            if lk != rk {
                return Extends::False;
            }
            extends_rec(ctx, lv, rv, seen)
        }

        _ => Extends::False,
    }
}

fn bool_ext(b: bool) -> Extends {
    if b { Extends::True } else { Extends::False }
}

fn literal_extends_base(value: &Value, right: &Schema) -> bool {
    match (value, right.kind()) {
        (Value::String(_), SchemaKind::String) => true,
        (Value::Number(_), SchemaKind::Number) => true,
        (Value::Number(n), SchemaKind::Integer) => n.0.fract() == 0.0,
        (Value::Bool(_), SchemaKind::Boolean) => true,
        (Value::BigInt(_), SchemaKind::BigInt) => true,
        (Value::Null, SchemaKind::Null) => true,
        (Value::Undefined, SchemaKind::Undefined | SchemaKind::Void) => true,
        _ => false,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
