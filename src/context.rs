//! Per-pass calculation context.

use std::collections::HashMap;

use serde_json::Value;

/// Mutable bag shared by all callbacks of one record's calculation pass.
///
/// A context is created fresh for each record and dropped when the pass ends.
/// Resolvers use it to leave values for resolvers that run later in the same
/// pass; the association cascade stores its decorated nested values here.
#[derive(Debug, Default, Clone)]
pub struct CalculationContext {
    values: HashMap<String, Value>,
    cascaded: HashMap<String, Value>,
}

impl CalculationContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a value left by an earlier callback.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Stores a value for later callbacks, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(key.into(), value.into())
    }

    /// Removes a value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Returns true if `key` was set in this pass.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the nested value of `association` after the cascade decorated it.
    #[must_use]
    pub fn cascaded(&self, association: &str) -> Option<&Value> {
        self.cascaded.get(association)
    }

    pub(crate) fn record_cascade(&mut self, association: impl Into<String>, value: Value) {
        self.cascaded.insert(association.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_remove() {
        let mut ctx = CalculationContext::new();
        assert!(ctx.set("flag", true).is_none());
        assert!(ctx.contains("flag"));
        assert_eq!(ctx.get("flag"), Some(&json!(true)));
        assert_eq!(ctx.set("flag", false), Some(json!(true)));
        assert_eq!(ctx.remove("flag"), Some(json!(false)));
        assert!(ctx.get("flag").is_none());
    }

    #[test]
    fn test_cascaded_is_separate_from_values() {
        let mut ctx = CalculationContext::new();
        ctx.record_cascade("author", json!({"name_fc": 7}));
        assert_eq!(ctx.cascaded("author"), Some(&json!({"name_fc": 7})));
        assert!(ctx.get("author").is_none());
    }
}
