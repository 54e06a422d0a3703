//! Value slots
//!
//! A [`Var`] is the cell that owns a value: a wire's input/output registers and
//! variable slots are `Var`s. A foreign `Var` borrows a caller-owned payload
//! and never runs that payload's destructor. Writing to a foreign slot detaches
//! it instead of writing through.

use std::sync::Arc;

use super::value::{DeepClone, Value};
use crate::error::invariant_violation;

#[derive(Debug)]
enum Repr {
    Owned(Value),
    Foreign(Arc<Value>),
}

#[derive(Debug)]
pub struct Var {
    repr: Repr,
}

impl Default for Var {
    fn default() -> Self {
        Var::new(Value::None)
    }
}

impl From<Value> for Var {
    fn from(value: Value) -> Self {
        Var::new(value)
    }
}

impl Var {
    pub fn new(value: Value) -> Self {
        Var {
            repr: Repr::Owned(value),
        }
    }

    /// Slot viewing a payload owned by the caller
    pub fn foreign(shared: Arc<Value>) -> Self {
        Var {
            repr: Repr::Foreign(shared),
        }
    }

    pub fn is_foreign(&self) -> bool {
        matches!(self.repr, Repr::Foreign(_))
    }

    pub fn get(&self) -> &Value {
        match &self.repr {
            Repr::Owned(v) => v,
            Repr::Foreign(v) => v,
        }
    }

    /// Mutable access; a foreign slot is first detached into an owned copy
    pub fn get_mut(&mut self) -> &mut Value {
        if let Repr::Foreign(shared) = &self.repr {
            self.repr = Repr::Owned(shared.deep_clone());
        }
        match &mut self.repr {
            Repr::Owned(v) => v,
            Repr::Foreign(_) => invariant_violation("foreign slot survived detaching"),
        }
    }

    /// Replace the content, taking ownership of `value`
    pub fn set(&mut self, value: Value) {
        match &mut self.repr {
            Repr::Owned(v) => *v = value,
            Repr::Foreign(_) => self.repr = Repr::Owned(value),
        }
    }

    /// Copy `src` into the slot, recycling owned memory where possible
    pub fn assign(&mut self, src: &Value) {
        match &mut self.repr {
            Repr::Owned(v) => src.clone_into(v),
            Repr::Foreign(_) => self.repr = Repr::Owned(src.deep_clone()),
        }
    }

    /// Move the content out, leaving `None`
    pub fn take(&mut self) -> Value {
        match std::mem::replace(&mut self.repr, Repr::Owned(Value::None)) {
            Repr::Owned(v) => v,
            Repr::Foreign(shared) => shared.deep_clone(),
        }
    }

    /// Release the content. Foreign payloads are only let go of, never destroyed.
    pub fn destroy(&mut self) {
        match &mut self.repr {
            Repr::Owned(v) => v.destroy(),
            Repr::Foreign(_) => self.repr = Repr::Owned(Value::None),
        }
    }
}
