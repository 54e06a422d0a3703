//! Associative containers
//!
//! Tables and sets are reached only through a small interface attached to
//! each instance (`Box<dyn TableInterface>` / `Box<dyn SetInterface>`), so a
//! container built by one module can be walked by another without knowing its
//! backend. Iteration is begin (`iter`), advance-and-fetch (`Iterator::next`),
//! size (`len`) and free (drop of the iterator).

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::value::{DeepClone, Value};

/// Opaque table iterator
pub struct TableIter<'a> {
    inner: Box<dyn Iterator<Item = (&'a str, &'a Value)> + 'a>,
}

impl<'a> TableIter<'a> {
    pub fn new(inner: impl Iterator<Item = (&'a str, &'a Value)> + 'a) -> Self {
        TableIter {
            inner: Box::new(inner),
        }
    }
}

impl<'a> Iterator for TableIter<'a> {
    type Item = (&'a str, &'a Value);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Opaque set iterator
pub struct SetIter<'a> {
    inner: Box<dyn Iterator<Item = &'a Value> + 'a>,
}

impl<'a> SetIter<'a> {
    pub fn new(inner: impl Iterator<Item = &'a Value> + 'a) -> Self {
        SetIter {
            inner: Box::new(inner),
        }
    }
}

impl<'a> Iterator for SetIter<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Table backend
pub trait TableInterface: Send + Sync + fmt::Debug {
    fn len(&self) -> usize;
    fn get(&self, key: &str) -> Option<&Value>;
    fn get_mut(&mut self, key: &str) -> Option<&mut Value>;
    /// Insert, returning the previous value under `key`
    fn insert(&mut self, key: &str, value: Value) -> Option<Value>;
    fn remove(&mut self, key: &str) -> Option<Value>;
    fn clear(&mut self);
    fn iter(&self) -> TableIter<'_>;
    fn boxed_clone(&self) -> Box<dyn TableInterface>;
}

/// Set backend
pub trait SetInterface: Send + Sync + fmt::Debug {
    fn len(&self) -> usize;
    fn contains(&self, value: &Value) -> bool;
    /// Insert, returning false if an equal value was already present
    fn insert(&mut self, value: Value) -> bool;
    fn remove(&mut self, value: &Value) -> bool;
    fn clear(&mut self);
    fn iter(&self) -> SetIter<'_>;
    fn boxed_clone(&self) -> Box<dyn SetInterface>;
}

/// Default table backend, keys kept sorted
#[derive(Debug, Default)]
pub struct SortedTable {
    entries: BTreeMap<String, Value>,
}

impl TableInterface for SortedTable {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
        self.entries.insert(key.to_string(), value)
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn iter(&self) -> TableIter<'_> {
        TableIter::new(self.entries.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn boxed_clone(&self) -> Box<dyn TableInterface> {
        Box::new(SortedTable {
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.deep_clone()))
                .collect(),
        })
    }
}

/// Default set backend, buckets keyed by [`Value::total_hash`]
#[derive(Debug, Default)]
pub struct HashValueSet {
    buckets: HashMap<u64, Vec<Value>>,
    len: usize,
}

impl SetInterface for HashValueSet {
    fn len(&self) -> usize {
        self.len
    }

    fn contains(&self, value: &Value) -> bool {
        self.buckets
            .get(&value.total_hash())
            .is_some_and(|bucket| bucket.iter().any(|v| v.total_eq(value)))
    }

    fn insert(&mut self, value: Value) -> bool {
        let bucket = self.buckets.entry(value.total_hash()).or_default();
        if bucket.iter().any(|v| v.total_eq(&value)) {
            return false;
        }
        bucket.push(value);
        self.len += 1;
        true
    }

    fn remove(&mut self, value: &Value) -> bool {
        let hash = value.total_hash();
        let Some(bucket) = self.buckets.get_mut(&hash) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|v| v.total_eq(value)) else {
            return false;
        };
        bucket.swap_remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(&hash);
        }
        self.len -= 1;
        true
    }

    fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    fn iter(&self) -> SetIter<'_> {
        SetIter::new(self.buckets.values().flatten())
    }

    fn boxed_clone(&self) -> Box<dyn SetInterface> {
        Box::new(HashValueSet {
            buckets: self
                .buckets
                .iter()
                .map(|(h, b)| (*h, b.iter().map(Value::deep_clone).collect()))
                .collect(),
            len: self.len,
        })
    }
}

/// String-keyed table value
#[derive(Debug)]
pub struct Table {
    api: Box<dyn TableInterface>,
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Table {
            api: Box::new(SortedTable::default()),
        }
    }

    pub fn with_backend(api: Box<dyn TableInterface>) -> Self {
        Table { api }
    }

    pub fn len(&self) -> usize {
        self.api.len()
    }

    pub fn is_empty(&self) -> bool {
        self.api.len() == 0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.api.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.api.get_mut(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
        self.api.insert(key, value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.api.remove(key)
    }

    /// Copy `value` under `key`, recycling the existing entry if any
    pub fn assign(&mut self, key: &str, value: &Value) {
        match self.api.get_mut(key) {
            Some(slot) => value.clone_into(slot),
            None => {
                self.api.insert(key, value.deep_clone());
            }
        }
    }

    pub fn iter(&self) -> TableIter<'_> {
        self.api.iter()
    }
}

impl DeepClone for Table {
    fn deep_clone(&self) -> Self {
        Table {
            api: self.api.boxed_clone(),
        }
    }

    fn clone_into(&self, dst: &mut Self) {
        let stale: Vec<String> = dst
            .iter()
            .filter(|(k, _)| self.get(k).is_none())
            .map(|(k, _)| k.to_string())
            .collect();
        for key in stale {
            dst.remove(&key);
        }
        for (k, v) in self.iter() {
            dst.assign(k, v);
        }
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(k, v)| other.get(k).is_some_and(|w| v == w))
    }
}

/// Set value
#[derive(Debug)]
pub struct ValueSet {
    api: Box<dyn SetInterface>,
}

impl Default for ValueSet {
    fn default() -> Self {
        ValueSet::new()
    }
}

impl ValueSet {
    pub fn new() -> Self {
        ValueSet {
            api: Box::new(HashValueSet::default()),
        }
    }

    pub fn with_backend(api: Box<dyn SetInterface>) -> Self {
        ValueSet { api }
    }

    pub fn len(&self) -> usize {
        self.api.len()
    }

    pub fn is_empty(&self) -> bool {
        self.api.len() == 0
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.api.contains(value)
    }

    pub fn insert(&mut self, value: Value) -> bool {
        self.api.insert(value)
    }

    pub fn remove(&mut self, value: &Value) -> bool {
        self.api.remove(value)
    }

    pub fn iter(&self) -> SetIter<'_> {
        self.api.iter()
    }
}

impl DeepClone for ValueSet {
    fn deep_clone(&self) -> Self {
        ValueSet {
            api: self.api.boxed_clone(),
        }
    }

    fn clone_into(&self, dst: &mut Self) {
        dst.api.clear();
        for v in self.iter() {
            dst.api.insert(v.deep_clone());
        }
    }
}

impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Backend defined outside the default ones, walked through the interface only.
    #[derive(Debug, Default)]
    struct PairTable {
        pairs: Vec<(String, Value)>,
    }

    impl TableInterface for PairTable {
        fn len(&self) -> usize {
            self.pairs.len()
        }
        fn get(&self, key: &str) -> Option<&Value> {
            self.pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
        }
        fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
            self.pairs.iter_mut().find(|(k, _)| k == key).map(|(_, v)| v)
        }
        fn insert(&mut self, key: &str, value: Value) -> Option<Value> {
            match self.get_mut(key) {
                Some(slot) => Some(std::mem::replace(slot, value)),
                None => {
                    self.pairs.push((key.to_string(), value));
                    None
                }
            }
        }
        fn remove(&mut self, key: &str) -> Option<Value> {
            let pos = self.pairs.iter().position(|(k, _)| k == key)?;
            Some(self.pairs.remove(pos).1)
        }
        fn clear(&mut self) {
            self.pairs.clear();
        }
        fn iter(&self) -> TableIter<'_> {
            TableIter::new(self.pairs.iter().map(|(k, v)| (k.as_str(), v)))
        }
        fn boxed_clone(&self) -> Box<dyn TableInterface> {
            Box::new(PairTable {
                pairs: self.pairs.iter().map(|(k, v)| (k.clone(), v.deep_clone())).collect(),
            })
        }
    }

    #[test]
    fn foreign_backend_is_walkable() {
        let mut table = Table::with_backend(Box::new(PairTable::default()));
        table.insert("b", Value::Int(2));
        table.insert("a", Value::Int(1));
        let keys: Vec<&str> = table.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);

        // equality does not depend on backend or order
        let mut sorted = Table::new();
        sorted.insert("a", Value::Int(1));
        sorted.insert("b", Value::Int(2));
        assert_eq!(table, sorted);
    }

    #[test]
    fn table_clone_into_drops_stale_keys() {
        let mut src = Table::new();
        src.insert("x", Value::from("new"));
        let mut dst = Table::new();
        dst.insert("x", Value::from("old"));
        dst.insert("gone", Value::Int(0));
        src.clone_into(&mut dst);
        assert_eq!(dst, src);
        assert!(dst.get("gone").is_none());
    }

    #[test]
    fn set_dedupes_structurally() {
        let mut set = ValueSet::new();
        assert!(set.insert(Value::from("a")));
        assert!(!set.insert(Value::from("a")));
        assert!(set.insert(Value::Int(1)));
        assert_eq!(set.len(), 2);
        assert!(set.remove(&Value::Int(1)));
        assert!(!set.contains(&Value::Int(1)));
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    fn nested_sets_compare_by_content() {
        let a: ValueSet = vec![Value::Int(1), Value::Int(2)].into_iter().collect();
        let b: ValueSet = vec![Value::Int(2), Value::Int(1)].into_iter().collect();
        let mut outer = ValueSet::new();
        outer.insert(Value::Set(a));
        assert!(outer.contains(&Value::Set(b)));
    }
}
