//! Named-reference resolution.
//!
//! A `Context` is the arena every `Ref` node resolves against. Self and
//! mutual references are legal; the recursive algorithms carry their own
//! visited sets, so resolution itself never unfolds a cycle.

use indexmap::IndexMap;

use crate::schema::{Schema, SchemaKind};

#[derive(Clone, Debug, Default)]
pub struct Context {
    schemas: IndexMap<String, Schema>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.insert(name, schema);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, schema: Schema) {
        self.schemas.insert(name.into(), schema);
    }

    pub fn resolve(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Follows `Ref` chains to a structural node. Returns `None` on a
    /// dangling name or a reference loop that never reaches structure
    /// (`A -> B -> A`); callers in boolean positions treat that as a
    /// mismatch.
    pub fn deref<'a>(&'a self, schema: &'a Schema) -> Option<&'a Schema> {
        let mut current = schema;
        let mut hops = 0usize;
        while let SchemaKind::Ref(name) = current.kind() {
            current = self.resolve(name)?;
            hops += 1;
            if hops > self.schemas.len() {
                return None; // pure ref loop, no structure to land on
            }
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_through_chains() {
        let ctx = Context::new()
            .with("a", Schema::reference("b"))
            .with("b", Schema::number());
        let a = Schema::reference("a");
        let target = ctx.deref(&a).unwrap();
        assert!(matches!(target.kind(), SchemaKind::Number));
    }

    #[test]
    fn dangling_reference_is_none() {
        let ctx = Context::new();
        let r = Schema::reference("missing");
        assert!(ctx.deref(&r).is_none());
    }

    #[test]
    fn pure_ref_loop_is_none() {
        let ctx = Context::new()
            .with("a", Schema::reference("b"))
            .with("b", Schema::reference("a"));
        let r = Schema::reference("a");
        assert!(ctx.deref(&r).is_none());
    }
}
