//! Variable-capable parameters
//!
//! A [`ParamVar`] holds either a literal or a `ContextVar` naming a variable.
//! The variable is resolved once at warm-up and the cached reference is used
//! until clean-up releases it.

use crate::compose::ExposedVariable;
use crate::value::{DeepClone, TypeDescriptor, Value};
use crate::vars::VarRef;
use crate::wire::Context;

#[derive(Debug, Default)]
pub struct ParamVar {
    value: Value,
    slot: Option<VarRef>,
}

impl ParamVar {
    pub fn new(value: Value) -> Self {
        ParamVar { value, slot: None }
    }

    /// Parameter value as set, literal or variable reference
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn set(&mut self, value: &Value) {
        value.clone_into(&mut self.value);
    }

    pub fn variable_name(&self) -> Option<&str> {
        match &self.value {
            Value::ContextVar(name) => Some(name),
            _ => None,
        }
    }

    /// Requirement on the referenced variable, if any
    pub fn required(&self, ty: TypeDescriptor) -> Option<ExposedVariable> {
        self.variable_name().map(|name| ExposedVariable::new(name, ty))
    }

    pub fn warm_up(&mut self, ctx: &mut Context<'_>) {
        if let Some(slot) = self.slot.take() {
            ctx.release_variable(slot);
        }
        if let Value::ContextVar(name) = &self.value {
            self.slot = Some(ctx.reference_variable(name));
        }
    }

    pub fn clean_up(&mut self, ctx: &mut Context<'_>) {
        if let Some(slot) = self.slot.take() {
            ctx.release_variable(slot);
        }
    }

    /// Run `f` on the current value
    pub fn with<R>(&self, ctx: &Context<'_>, f: impl FnOnce(&Value) -> R) -> R {
        match &self.slot {
            Some(slot) => ctx.read_variable(slot, f),
            None => f(&self.value),
        }
    }

    pub fn get(&self, ctx: &Context<'_>) -> Value {
        self.with(ctx, |v| v.deep_clone())
    }
}
