//! Shard Registry
//!
//! Explicit name -> constructor table, owned by the process context.
//! Behavior: unknown names fail, re-registering a name replaces it.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::{SreError, SreResult};

use super::shard::Shard;

pub type ShardConstructor = fn() -> Box<dyn Shard>;

/// Registry consulted by loaders and hosts to build shards by name.
#[derive(Debug, Default)]
pub struct ShardRegistry {
    constructors: RwLock<BTreeMap<String, ShardConstructor>>,
}

impl ShardRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-filled with the core shard library
    pub fn with_core_shards() -> Self {
        let registry = Self::new();
        super::builtin::register_all(&registry);
        registry
    }

    /// Register (or replace) a constructor
    pub fn register(&self, name: &str, constructor: ShardConstructor) {
        tracing::trace!(shard = name, "register shard");
        self.constructors.write().insert(name.to_string(), constructor);
    }

    /// Forget a constructor
    pub fn unregister(&self, name: &str) -> bool {
        self.constructors.write().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.read().contains_key(name)
    }

    /// Build a fresh shard, failing closed on unknown names
    pub fn create(&self, name: &str) -> SreResult<Box<dyn Shard>> {
        let constructor = self
            .constructors
            .read()
            .get(name)
            .copied()
            .ok_or_else(|| SreError::UnknownShard(name.to_string()))?;
        Ok(constructor())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        self.constructors.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_fail_closed() {
        let registry = ShardRegistry::new();
        assert!(matches!(
            registry.create("Nope"),
            Err(SreError::UnknownShard(name)) if name == "Nope"
        ));
    }

    #[test]
    fn core_shards_are_registered_under_their_names() {
        let registry = ShardRegistry::with_core_shards();
        for name in registry.names() {
            let shard = registry.create(&name).expect("registered shard");
            assert_eq!(shard.name(), name);
        }
        assert!(registry.contains("Math.Add"));
        assert!(registry.unregister("Math.Add"));
        assert!(!registry.contains("Math.Add"));
    }
}
