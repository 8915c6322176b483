//! Error taxonomy.
//!
//! Validation failures are never errors here; they are `false` results and
//! `ValueError` records. `EngineError` covers the two thrown classes: an
//! assertion failing after normalization (carries the diagnostic sequence)
//! and contract violations, which indicate misuse rather than bad data.

use std::fmt;

use serde::Serialize;

use crate::schema::Schema;
use crate::value::Value;

/// One diagnostic from the `errors` traversal. `path` is a `/`-segmented
/// pointer into the value (`""` for the root).
#[derive(Clone, Debug, Serialize)]
pub struct ValueError {
    pub path: String,
    #[serde(skip)]
    pub schema: Schema,
    #[serde(skip)]
    pub value: Value,
    pub message: String,
}

#[derive(Debug)]
pub enum EngineError {
    /// A post-condition failed after normalization; carries the bounded
    /// diagnostic sequence.
    Assert(Vec<ValueError>),

    /// A node transform reported failure during decode/encode.
    Codec { path: String, message: String },

    /// `decode` invoked on a schema that declares no decode transform.
    MissingDecode,

    /// `encode` invoked on a schema that declares no encode transform.
    MissingEncode,

    /// `mutate` received mismatched root kinds.
    MutateMismatch {
        target: &'static str,
        source: &'static str,
    },

    /// A `Ref` named a schema absent from the context.
    UnknownReference(String),

    /// `repair` cannot satisfy a constraint without data loss the caller
    /// should decide on.
    Unrepairable(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Assert(errors) => {
                write!(f, "value does not match schema: {}", summarize(errors))
            }
            EngineError::Codec { path, message } => {
                write!(f, "codec transform failed at '{path}': {message}")
            }
            EngineError::MissingDecode => write!(f, "schema declares no decode transform"),
            EngineError::MissingEncode => write!(f, "schema declares no encode transform"),
            EngineError::MutateMismatch { target, source } => {
                write!(f, "mutate root kind mismatch: target is {target}, source is {source}")
            }
            EngineError::UnknownReference(name) => {
                write!(f, "unresolved schema reference '{name}'")
            }
            EngineError::Unrepairable(message) => write!(f, "cannot repair value: {message}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// The diagnostics an assertion carries, empty for other variants.
    pub fn diagnostics(&self) -> &[ValueError] {
        match self {
            EngineError::Assert(errors) => errors,
            _ => &[],
        }
    }
}

fn summarize(errors: &[ValueError]) -> String {
    match errors.first() {
        None => "no diagnostics collected (max_errors may be 0)".to_string(),
        Some(first) if errors.len() == 1 => format!("{} at '{}'", first.message, first.path),
        Some(first) => format!(
            "{} at '{}' (+{} more)",
            first.message,
            first.path,
            errors.len() - 1
        ),
    }
}
