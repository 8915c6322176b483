//! In-place structural patching.
//!
//! `mutate` rewrites `target` to match `source`'s shape and leaf values
//! while leaving unchanged nested containers untouched, so consumers that
//! watch container identity only observe the positions that actually
//! changed. Both roots must be the same container kind.

use crate::error::EngineError;
use crate::structural::{clone_value, equal};
use crate::value::Value;

pub fn mutate(target: &mut Value, source: &Value) -> Result<(), EngineError> {
    let compatible = matches!(
        (&*target, source),
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
    );
    if !compatible {
        return Err(EngineError::MutateMismatch {
            target: target.kind_name(),
            source: source.kind_name(),
        });
    }
    patch(target, source);
    Ok(())
}

fn patch(target: &mut Value, source: &Value) {
    match (target, source) {
        (Value::Object(dst), Value::Object(src)) => {
            dst.retain(|k, _| src.contains_key(k));
            for (k, sv) in src {
                match dst.get_mut(k) {
                    Some(tv) if same_container(tv, sv) => patch(tv, sv),
                    Some(tv) => {
                        if !equal(tv, sv) {
                            *tv = clone_value(sv);
                        }
                    }
                    None => {
                        dst.insert(k.clone(), clone_value(sv));
                    }
                }
            }
        }
        (Value::Array(dst), Value::Array(src)) => {
            dst.truncate(src.len());
            for (i, sv) in src.iter().enumerate() {
                match dst.get_mut(i) {
                    Some(tv) if same_container(tv, sv) => patch(tv, sv),
                    Some(tv) => {
                        if !equal(tv, sv) {
                            *tv = clone_value(sv);
                        }
                    }
                    None => dst.push(clone_value(sv)),
                }
            }
        }
        (target, source) => {
            if !equal(target, source) {
                *target = clone_value(source);
            }
        }
    }
}

fn same_container(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Object(_), Value::Object(_)) | (Value::Array(_), Value::Array(_))
    )
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
    fn patches_leaf_values_in_place() {
        let mut target = v(json!({"a": 1, "b": "x"}));
        mutate(&mut target, &v(json!({"a": 2, "b": "x"}))).unwrap();
        assert!(equal(&target, &v(json!({"a": 2, "b": "x"}))));
    }

    #[test]
    fn inserts_and_removes_keys_to_match_source() {
        let mut target = v(json!({"stale": true, "keep": 1}));
        mutate(&mut target, &v(json!({"keep": 1, "fresh": "yes"}))).unwrap();
        assert!(equal(&target, &v(json!({"keep": 1, "fresh": "yes"}))));
    }

    #[test]
    fn nested_containers_are_patched_not_replaced() {
        // the heap pointer of a key inside the untouched-in-shape inner map
        // survives an in-place patch but not a wholesale replacement
        fn inner_key_addr(target: &Value) -> usize {
            match target {
                Value::Object(m) => match &m["inner"] {
                    Value::Object(inner) => match inner.get_index(0) {
                        Some((k, _)) => k.as_ptr() as usize,
                        None => unreachable!(),
                    },
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            }
        }
        let mut target = v(json!({"inner": {"x": 1}, "xs": [1, 2]}));
        let before = inner_key_addr(&target);
        mutate(&mut target, &v(json!({"inner": {"x": 9}, "xs": [1, 2, 3]}))).unwrap();
        let after = inner_key_addr(&target);
        assert_eq!(before, after, "inner object storage was reallocated");
        assert!(equal(&target, &v(json!({"inner": {"x": 9}, "xs": [1, 2, 3]}))));
    }

    #[test]
    fn array_roots_resize_toward_source() {
        let mut target = v(json!([1, 2, 3]));
        mutate(&mut target, &v(json!([4]))).unwrap();
        assert!(equal(&target, &v(json!([4]))));
    }

    #[test]
    fn root_kind_mismatch_is_fatal() {
        let mut target = v(json!({"a": 1}));
        let err = mutate(&mut target, &v(json!([1]))).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MutateMismatch {
                target: "object",
                source: "array"
            }
        ));
    }
}
