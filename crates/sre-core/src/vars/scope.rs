//! Variable Scope
//!
//! Named, index-addressed variable slots. Slots are reference counted by the
//! shards that resolved them and addressed through generational ids, so a
//! reference that outlives its slot is detected instead of reading a
//! recycled cell.

use std::collections::HashMap;

use crate::error::invariant_violation;
use crate::value::{Value, Var};

/// Generational slot id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    name: String,
    var: Var,
    refcount: u32,
    generation: u32,
    live: bool,
}

/// Variable storage for one scope (a wire, or the process globals)
#[derive(Debug, Default)]
pub struct VariableScope {
    slots: Vec<Slot>,
    by_name: HashMap<String, u32>,
    free: Vec<u32>,
    /// Live slot indices in acquisition order
    order: Vec<u32>,
}

impl VariableScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<SlotId> {
        self.by_name.get(name).map(|&index| SlotId {
            index,
            generation: self.slots[index as usize].generation,
        })
    }

    /// Find or create the slot for `name` and take a reference on it
    pub fn reference(&mut self, name: &str) -> SlotId {
        let index = match self.by_name.get(name) {
            Some(&index) => index,
            None => self.create(name),
        };
        let slot = &mut self.slots[index as usize];
        slot.refcount += 1;
        SlotId {
            index,
            generation: slot.generation,
        }
    }

    fn create(&mut self, name: &str) -> u32 {
        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.name.clear();
                slot.name.push_str(name);
                slot.live = true;
                index
            }
            None => {
                if self.slots.len() >= u32::MAX as usize {
                    invariant_violation("variable slot capacity overflow");
                }
                self.slots.push(Slot {
                    name: name.to_string(),
                    var: Var::default(),
                    refcount: 0,
                    generation: 0,
                    live: true,
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.by_name.insert(name.to_string(), index);
        self.order.push(index);
        index
    }

    /// Drop a reference; the last one destroys the value and frees the slot
    pub fn release(&mut self, id: SlotId) {
        let slot = self.slot_mut(id);
        slot.refcount -= 1;
        if slot.refcount == 0 {
            self.free_slot(id.index);
        }
    }

    fn free_slot(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.var.destroy();
        slot.live = false;
        slot.refcount = 0;
        slot.generation = slot.generation.wrapping_add(1);
        self.by_name.remove(&slot.name);
        self.order.retain(|&i| i != index);
        self.free.push(index);
    }

    /// Destroy every slot, newest first
    pub fn release_all(&mut self) {
        while let Some(&index) = self.order.last() {
            self.free_slot(index);
        }
    }

    pub fn get(&self, id: SlotId) -> &Var {
        &self.slot(id).var
    }

    pub fn get_mut(&mut self, id: SlotId) -> &mut Var {
        &mut self.slot_mut(id).var
    }

    /// Look a value up by name, for host inspection
    pub fn value_of(&self, name: &str) -> Option<&Value> {
        self.find(name).map(|id| self.get(id).get())
    }

    /// Live variable names in acquisition order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order
            .iter()
            .map(move |&i| self.slots[i as usize].name.as_str())
    }

    pub fn refcount(&self, id: SlotId) -> u32 {
        self.slot(id).refcount
    }

    fn slot(&self, id: SlotId) -> &Slot {
        match self.slots.get(id.index as usize) {
            Some(slot) if slot.live && slot.generation == id.generation => slot,
            _ => invariant_violation("use of a released variable slot"),
        }
    }

    fn slot_mut(&mut self, id: SlotId) -> &mut Slot {
        match self.slots.get_mut(id.index as usize) {
            Some(slot) if slot.live && slot.generation == id.generation => slot,
            _ => invariant_violation("use of a released variable slot"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn references_share_one_slot() {
        let mut scope = VariableScope::new();
        let a = scope.reference("x");
        let b = scope.reference("x");
        assert_eq!(a, b);
        assert_eq!(scope.refcount(a), 2);
        scope.get_mut(a).set(Value::Int(3));
        assert_eq!(scope.get(b).get(), &Value::Int(3));
    }

    #[test]
    fn last_release_frees_and_bumps_generation() {
        let mut scope = VariableScope::new();
        let a = scope.reference("x");
        scope.get_mut(a).set(Value::from("payload"));
        scope.release(a);
        assert!(scope.find("x").is_none());
        assert!(scope.is_empty());

        let b = scope.reference("y");
        assert_ne!(a, b, "recycled slot must carry a new generation");
        assert!(scope.get(b).get().is_none());
    }

    #[test]
    fn release_all_goes_newest_first() {
        let mut scope = VariableScope::new();
        scope.reference("a");
        scope.reference("b");
        scope.reference("c");
        assert_eq!(scope.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        scope.release_all();
        assert!(scope.is_empty());
        assert!(scope.value_of("a").is_none());
    }
}
