//! Growable value sequence
//!
//! Capacity grows by doubling (`max(requested, 2 * old)`), and grown slack is
//! filled with `None` so every slot, written or not, stays valid to clone into
//! or destroy. Slack keeps its old payloads after `clear`/`pop_slot` so later
//! clones can recycle their allocations.

use std::fmt;

use crate::error::invariant_violation;

use super::value::{DeepClone, Value};

/// Largest addressable element count
pub const MAX_ELEMENTS: usize = u32::MAX as usize;

#[derive(Default)]
pub struct SeqArray {
    slots: Vec<Value>,
    len: usize,
}

impl SeqArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let mut seq = Self::new();
        seq.reserve(capacity);
        seq
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of initialised slots, written or slack
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Make room for at least `requested` elements
    pub fn reserve(&mut self, requested: usize) {
        let old = self.slots.len();
        if requested <= old {
            return;
        }
        if requested > MAX_ELEMENTS {
            invariant_violation("sequence capacity overflow");
        }
        let new_capacity = requested.max(old.saturating_mul(2)).min(MAX_ELEMENTS);
        self.slots.resize_with(new_capacity, Value::default);
    }

    /// Append, taking ownership of `value`
    pub fn push(&mut self, value: Value) {
        self.reserve(self.len + 1);
        self.slots[self.len] = value;
        self.len += 1;
    }

    /// Append a copy of `value`, recycling the slack slot's memory
    pub fn push_clone(&mut self, value: &Value) {
        self.reserve(self.len + 1);
        value.clone_into(&mut self.slots[self.len]);
        self.len += 1;
    }

    pub fn pop(&mut self) -> Option<Value> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(std::mem::take(&mut self.slots[self.len]))
    }

    /// Set the logical length; newly exposed slots are reset to `None`
    pub fn resize(&mut self, len: usize) {
        self.reserve(len);
        if len > self.len {
            for slot in &mut self.slots[self.len..len] {
                slot.destroy();
            }
        }
        self.len = len;
    }

    /// Drop the logical contents, slack payloads are kept for recycling
    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.as_slice().get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.as_mut_slice().get_mut(index)
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.slots[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [Value] {
        &mut self.slots[..self.len]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.as_slice().iter()
    }
}

impl DeepClone for SeqArray {
    fn deep_clone(&self) -> Self {
        let mut out = SeqArray::with_capacity(self.len);
        for v in self.iter() {
            out.push(v.deep_clone());
        }
        out
    }

    fn clone_into(&self, dst: &mut Self) {
        dst.reserve(self.len);
        for (src, slot) in self.iter().zip(dst.slots.iter_mut()) {
            src.clone_into(slot);
        }
        dst.len = self.len;
    }
}

impl PartialEq for SeqArray {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl fmt::Debug for SeqArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl FromIterator<Value> for SeqArray {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut seq = SeqArray::new();
        for v in iter {
            seq.push(v);
        }
        seq
    }
}

impl<'a> IntoIterator for &'a SeqArray {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn grows_one_push_at_a_time() {
        let mut seq = SeqArray::new();
        for i in 0..5 {
            seq.push(Value::from(format!("item {i}")));
        }
        assert_eq!(seq.len(), 5);
        assert!(seq.capacity() >= 5);

        // every element is independently destroyable
        for i in 0..5 {
            let slot = seq.get_mut(i).expect("element missing");
            assert_eq!(slot.as_str(), Some(format!("item {i}").as_str()));
            slot.destroy();
            assert!(slot.is_none());
        }
        assert_eq!(seq.len(), 5);
    }

    #[test]
    fn slack_is_none_initialised() {
        let mut seq = SeqArray::new();
        seq.push(Value::Int(1));
        seq.push(Value::Int(2));
        seq.push(Value::Int(3));
        assert_eq!(seq.capacity(), 4);
        seq.resize(4);
        assert!(seq.get(3).expect("slot").is_none());
    }

    #[test]
    fn clear_then_push_clone_recycles() {
        let mut seq = SeqArray::new();
        seq.push(Value::from("a long string payload"));
        seq.clear();
        seq.push_clone(&Value::from("b"));
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.get(0), Some(&Value::from("b")));
    }

    #[test]
    fn clone_into_shrinks_logical_length() {
        let src: SeqArray = vec![Value::Int(1)].into_iter().collect();
        let mut dst: SeqArray = (0..4).map(Value::Int).collect();
        src.clone_into(&mut dst);
        assert_eq!(dst, src);
        assert_eq!(dst.capacity(), 4);
    }

    proptest! {
        #[test]
        fn capacity_doubles_and_covers_length(pushes in 0usize..200) {
            let mut seq = SeqArray::new();
            let mut last_cap = 0;
            for i in 0..pushes {
                seq.push(Value::Int(i as i64));
                let cap = seq.capacity();
                if cap != last_cap {
                    prop_assert!(cap == (i + 1).max(last_cap * 2));
                    last_cap = cap;
                }
            }
            prop_assert_eq!(seq.len(), pushes);
            prop_assert!(seq.capacity() >= pushes);
        }

        #[test]
        fn deep_clone_is_independent(values in proptest::collection::vec(any::<i64>(), 0..50)) {
            let src: SeqArray = values.iter().copied().map(Value::Int).collect();
            let mut copy = src.deep_clone();
            for v in copy.as_mut_slice() {
                v.destroy();
            }
            prop_assert_eq!(src.len(), values.len());
            for (v, expected) in src.iter().zip(values.iter()) {
                prop_assert_eq!(v, &Value::Int(*expected));
            }
        }
    }
}
