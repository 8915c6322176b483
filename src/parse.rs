//! Parse front-door: an explicit, ordered pipeline of engine operations.
//!
//! `parse` runs the same sequence as `decode`; `parse_with` lets callers
//! reorder or drop stages (skip coercion, assert before cleaning, and so
//! on). Assertion failures carry the collected diagnostics.

use crate::check::check;
use crate::codec;
use crate::context::Context;
use crate::diagnostics::collect_errors;
use crate::error::EngineError;
use crate::normalize::{clean, convert, default_value};
use crate::schema::Schema;
use crate::structural::clone_value;
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseOp {
    /// Deep-copy the input. The pipeline always works on an owned copy, so
    /// this stage exists for callers that spell the full sequence out.
    Clone,
    Default,
    Convert,
    Clean,
    Assert,
    /// Run codec decode transforms, innermost-first.
    Decode,
}

pub const DEFAULT_PIPELINE: &[ParseOp] = &[
    ParseOp::Clone,
    ParseOp::Default,
    ParseOp::Convert,
    ParseOp::Clean,
    ParseOp::Assert,
    ParseOp::Decode,
];

pub fn parse(ctx: &Context, schema: &Schema, value: &Value) -> Result<Value, EngineError> {
    parse_with(DEFAULT_PIPELINE, ctx, schema, value)
}

pub fn parse_with(
    ops: &[ParseOp],
    ctx: &Context,
    schema: &Schema,
    value: &Value,
) -> Result<Value, EngineError> {
    let mut v = clone_value(value);
    for op in ops {
        v = match op {
            ParseOp::Clone => v,
            ParseOp::Default => default_value(ctx, schema, v),
            ParseOp::Convert => convert(ctx, schema, v),
            ParseOp::Clean => clean(ctx, schema, v),
            ParseOp::Assert => {
                if !check(ctx, schema, &v) {
                    return Err(EngineError::Assert(collect_errors(ctx, schema, &v)));
                }
                v
            }
            ParseOp::Decode => codec::decode_transforms(ctx, schema, v)?,
        };
    }
    Ok(v)
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
    fn default_pipeline_matches_decode() {
        let s = Schema::object_with(
            vec![
                ("port", Schema::number().with_default(Value::number(8080.0))),
                ("host", Schema::string()),
            ],
            ["host".to_string()].into(),
            crate::schema::Additional::Closed,
        );
        let ctx = Context::new();
        let raw = v(json!({"host": "db", "junk": 1}));
        let parsed = parse(&ctx, &s, &raw).unwrap();
        let decoded = codec::decode(&ctx, &s, &raw).unwrap();
        assert!(equal(&parsed, &decoded));
        assert!(equal(&parsed, &v(json!({"host": "db", "port": 8080.0}))));
    }

    #[test]
    fn assert_failure_carries_diagnostics() {
        let s = Schema::object(vec![("x", Schema::number())]);
        let err = parse(&Context::new(), &s, &v(json!({"x": "nope"}))).unwrap_err();
        match err {
            EngineError::Assert(errors) => {
                assert!(!errors.is_empty());
                assert_eq!(errors[0].path, "/x");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn stages_can_be_dropped() {
        // without Convert, the string stays a string and the assert trips
        let s = Schema::number();
        let ops = [ParseOp::Clone, ParseOp::Assert];
        assert!(parse_with(&ops, &Context::new(), &s, &v(json!("5"))).is_err());
        // with Convert in front it coerces and passes
        let ops = [ParseOp::Convert, ParseOp::Assert];
        let out = parse_with(&ops, &Context::new(), &s, &v(json!("5"))).unwrap();
        assert!(equal(&out, &Value::number(5.0)));
    }

    #[test]
    fn stages_can_be_reordered() {
        // assert-first rejects what the clean stage would have repaired
        let s = Schema::object_with(
            vec![("x", Schema::number())],
            ["x".to_string()].into(),
            crate::schema::Additional::Closed,
        );
        let strict = [ParseOp::Assert, ParseOp::Clean];
        assert!(parse_with(&strict, &Context::new(), &s, &v(json!({"x": 1, "junk": 2}))).is_err());
        let lenient = [ParseOp::Clean, ParseOp::Assert];
        assert!(parse_with(&lenient, &Context::new(), &s, &v(json!({"x": 1, "junk": 2}))).is_ok());
    }

    #[test]
    fn empty_pipeline_is_a_deep_copy() {
        let ctx = Context::new();
        let s = Schema::any();
        let input = v(json!({"a": [1, 2]}));
        let out = parse_with(&[], &ctx, &s, &input).unwrap();
        assert!(equal(&out, &input));
    }
}
