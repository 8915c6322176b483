//! Process-wide settings and extension registries.
//!
//! One default `Settings` instance with get/set/reset lifecycle, plus two
//! registries: string-format predicates (consulted by `String` validation
//! when a `format` constraint is present) and custom-kind predicates
//! (consulted for `SchemaKind::Custom` nodes). Callers own the
//! don't-mutate-while-validating discipline; the locks here only keep the
//! maps internally consistent.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::value::Value;

// ————————————————————————————————————————————————————————————————————————————
// SETTINGS
// ————————————————————————————————————————————————————————————————————————————

pub const DEFAULT_MAX_ERRORS: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Upper bound on diagnostics emitted per `errors` call. Zero disables
    /// diagnostic collection entirely; `check` is unaffected.
    pub max_errors: usize,
    /// Whether the external compiled-checker collaborator may use an
    /// accelerated execution fallback. Nothing in this crate reads it.
    pub use_eval: bool,
    /// When set, an explicit `undefined` on an optional property must itself
    /// satisfy the property schema instead of counting as absent.
    pub exact_optional_property_types: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_errors: DEFAULT_MAX_ERRORS,
            use_eval: true,
            exact_optional_property_types: false,
        }
    }
}

static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| RwLock::new(Settings::default()));

pub fn get() -> Settings {
    SETTINGS.read().expect("settings poisoned").clone()
}

pub fn set(settings: Settings) {
    *SETTINGS.write().expect("settings poisoned") = settings;
}

pub fn reset() {
    set(Settings::default());
}

/// Scoped override: installs `settings`, runs `f`, restores the previous
/// instance. Meant for tests; not safe against concurrent mutation, same as
/// the global set/reset lifecycle.
pub fn with_settings<T>(settings: Settings, f: impl FnOnce() -> T) -> T {
    let previous = get();
    set(settings);
    let out = f();
    set(previous);
    out
}

// ————————————————————————————————————————————————————————————————————————————
// FORMAT REGISTRY
// ————————————————————————————————————————————————————————————————————————————

pub type FormatPredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

static FORMATS: Lazy<RwLock<HashMap<String, FormatPredicate>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub fn register_format(
    name: impl Into<String>,
    predicate: impl Fn(&str) -> bool + Send + Sync + 'static,
) {
    FORMATS
        .write()
        .expect("format registry poisoned")
        .insert(name.into(), Arc::new(predicate));
}

pub fn unregister_format(name: &str) {
    FORMATS
        .write()
        .expect("format registry poisoned")
        .remove(name);
}

/// Unknown format names fail closed: a typo cannot silently admit values.
pub fn check_format(name: &str, input: &str) -> bool {
    let registry = FORMATS.read().expect("format registry poisoned");
    match registry.get(name) {
        Some(predicate) => predicate(input),
        None => false,
    }
}

pub fn has_format(name: &str) -> bool {
    FORMATS
        .read()
        .expect("format registry poisoned")
        .contains_key(name)
}

// ————————————————————————————————————————————————————————————————————————————
// KIND REGISTRY
// ————————————————————————————————————————————————————————————————————————————

/// Capability object a third-party schema kind plugs into validation.
pub trait CustomKind: Send + Sync {
    fn check(&self, value: &Value) -> bool;
}

impl<F> CustomKind for F
where
    F: Fn(&Value) -> bool + Send + Sync,
{
    fn check(&self, value: &Value) -> bool {
        self(value)
    }
}

static KINDS: Lazy<RwLock<HashMap<String, Arc<dyn CustomKind>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub fn register_kind(name: impl Into<String>, kind: impl CustomKind + 'static) {
    KINDS
        .write()
        .expect("kind registry poisoned")
        .insert(name.into(), Arc::new(kind));
}

pub fn unregister_kind(name: &str) {
    KINDS.write().expect("kind registry poisoned").remove(name);
}

/// Unregistered custom kinds fail closed, like unknown formats.
pub fn check_kind(name: &str, value: &Value) -> bool {
    let registry = KINDS.read().expect("kind registry poisoned");
    match registry.get(name) {
        Some(kind) => kind.check(value),
        None => false,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_set_reset_round_trip() {
        with_settings(Settings::default(), || {
            set(Settings {
                max_errors: 3,
                ..Settings::default()
            });
            assert_eq!(get().max_errors, 3);
            reset();
            assert_eq!(get().max_errors, DEFAULT_MAX_ERRORS);
        });
    }

    #[test]
    fn with_settings_restores_previous() {
        let before = get();
        with_settings(
            Settings {
                max_errors: 1,
                ..Settings::default()
            },
            || assert_eq!(get().max_errors, 1),
        );
        assert_eq!(get(), before);
    }

    #[test]
    fn unknown_format_fails_closed() {
        assert!(!check_format("no-such-format", "anything"));
    }

    #[test]
    fn format_lifecycle() {
        register_format("digits-only", |s: &str| {
            !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
        });
        assert!(check_format("digits-only", "0123"));
        assert!(!check_format("digits-only", "12a"));
        unregister_format("digits-only");
        assert!(!check_format("digits-only", "0123"));
    }

    #[test]
    fn kind_lifecycle() {
        register_kind("even-number", |v: &Value| {
            v.as_f64().is_some_and(|n| n % 2.0 == 0.0)
        });
        assert!(check_kind("even-number", &Value::number(4.0)));
        assert!(!check_kind("even-number", &Value::number(3.0)));
        unregister_kind("even-number");
        assert!(!check_kind("even-number", &Value::number(4.0)));
    }
}
