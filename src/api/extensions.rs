use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{internal, SugarResult};
use crate::value::Value;

/// A registered extension operation. It receives the calling entity first;
/// returning `None` tells the dispatcher to hand the caller its own entity
/// back, which is what makes chained invocations work.
pub type ExtensionFn<T> =
    Arc<dyn Fn(&mut T, &[Value]) -> SugarResult<Option<Value>> + Send + Sync>;

/// What an extension invocation produced.
#[derive(Clone, Debug, PartialEq)]
pub enum ExtensionOutcome {
    /// The extension returned nothing; continue chaining on the entity.
    Chained,
    Value(Value),
}

/// A string-keyed registry of entity operations, resolved at composition
/// time. This is the library's extension seam: callers build a registry,
/// register named operations against an entity type, and dispatch by name.
pub struct ExtensionRegistry<T> {
    entries: BTreeMap<String, ExtensionFn<T>>,
}

impl<T> ExtensionRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&mut T, &[Value]) -> SugarResult<Option<Value>> + Send + Sync + 'static,
    {
        self.entries.insert(name.into(), Arc::new(func));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Looks an operation up by name, for resolution at composition time.
    pub fn resolve(&self, name: &str) -> Option<&ExtensionFn<T>> {
        self.entries.get(name)
    }

    /// Invokes a registered operation against `target`.
    pub fn invoke(&self, name: &str, target: &mut T, args: &[Value]) -> SugarResult<ExtensionOutcome> {
        let func = self
            .resolve(name)
            .ok_or_else(|| internal(format!("extension `{name}` is not registered")))?;
        Ok(match func(target, args)? {
            None => ExtensionOutcome::Chained,
            Some(value) => ExtensionOutcome::Value(value),
        })
    }
}

impl<T> Default for ExtensionRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[derive(Debug, PartialEq)]
    struct Counter {
        total: i64,
    }

    fn registry() -> ExtensionRegistry<Counter> {
        let mut registry = ExtensionRegistry::new();
        registry
            .register("add", |counter: &mut Counter, args: &[Value]| {
                let amount = args.first().and_then(Value::numeric).unwrap_or(1.0);
                counter.total += amount as i64;
                Ok(None)
            })
            .register("total", |counter: &mut Counter, _args: &[Value]| {
                Ok(Some(Value::from_integer(counter.total)))
            });
        registry
    }

    #[test]
    fn chained_operations_hand_the_entity_back() {
        let registry = registry();
        let mut counter = Counter { total: 0 };
        let outcome = registry
            .invoke("add", &mut counter, &[Value::from_integer(3)])
            .unwrap();
        assert_eq!(outcome, ExtensionOutcome::Chained);
        assert_eq!(counter.total, 3);
    }

    #[test]
    fn value_returning_operations_surface_the_value() {
        let registry = registry();
        let mut counter = Counter { total: 7 };
        let outcome = registry.invoke("total", &mut counter, &[]).unwrap();
        assert_eq!(outcome, ExtensionOutcome::Value(Value::from_integer(7)));
    }

    #[test]
    fn unregistered_names_fail() {
        let registry = registry();
        let mut counter = Counter { total: 0 };
        let err = registry.invoke("missing", &mut counter, &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::Internal);
        assert!(registry.resolve("missing").is_none());
    }
}
