//! Schema algebra engine: structural subtyping, validation, normalization,
//! and codec pipelines over a JavaScript-shaped value model.
//!
//! Entry points take `(context, schema, value)` and never mutate their
//! inputs unless the operation says so (`mutate`). Validation failures are
//! ordinary results; engine errors (`EngineError`) mark broken caller
//! contracts.

pub mod check;
pub mod codec;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod extends;
pub mod mutate;
pub mod normalize;
pub mod parse;
pub mod repair;
pub mod schema;
pub mod settings;
pub mod structural;
pub mod value;

pub use check::check;
pub use codec::{decode, encode};
pub use context::Context;
pub use diagnostics::{ErrorIter, errors};
pub use error::{EngineError, ValueError};
pub use extends::{Extends, extends};
pub use mutate::mutate;
pub use normalize::{clean, convert, default_value};
pub use parse::{DEFAULT_PIPELINE, ParseOp, parse, parse_with};
pub use repair::repair;
pub use schema::{Additional, Codec, Constraints, Schema, SchemaKind};
pub use settings::Settings;
pub use structural::{clone_value, equal, hash_value};
pub use value::{Opaque, Symbol, Value};
