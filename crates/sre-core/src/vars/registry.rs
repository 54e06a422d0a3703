//! Variable Registry
//!
//! Resolves variable names to slots for one wire activation lifecycle.
//! Lookup order is external, then wire-local, then global. A name found
//! nowhere creates a wire-local slot. Pure wires never see globals.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::error::{SreError, SreResult};
use crate::value::{DeepClone, Value};

use super::external::ExternalVariable;
use super::scope::{SlotId, VariableScope};

pub type ExternalVariables = BTreeMap<String, ExternalVariable>;

/// Resolved variable, cached by a shard between warm-up and clean-up
#[derive(Debug, Clone)]
pub enum VarRef {
    Wire(SlotId),
    Global(SlotId),
    External(ExternalVariable),
}

pub struct VariableRegistry<'a> {
    wire: &'a mut VariableScope,
    externals: &'a ExternalVariables,
    globals: &'a Mutex<VariableScope>,
    wire_name: &'a str,
    pure: bool,
}

impl<'a> VariableRegistry<'a> {
    pub fn new(
        wire: &'a mut VariableScope,
        externals: &'a ExternalVariables,
        globals: &'a Mutex<VariableScope>,
        wire_name: &'a str,
        pure: bool,
    ) -> Self {
        VariableRegistry {
            wire,
            externals,
            globals,
            wire_name,
            pure,
        }
    }

    /// Resolve `name` and take a reference on its slot
    pub fn reference(&mut self, name: &str) -> VarRef {
        if let Some(external) = self.externals.get(name) {
            return VarRef::External(external.clone());
        }
        if self.wire.find(name).is_some() || self.pure {
            return VarRef::Wire(self.wire.reference(name));
        }
        let mut globals = self.globals.lock();
        if globals.find(name).is_some() {
            return VarRef::Global(globals.reference(name));
        }
        drop(globals);
        VarRef::Wire(self.wire.reference(name))
    }

    /// Resolve `name` in the global scope, creating it there if needed
    pub fn reference_global(&mut self, name: &str) -> SreResult<VarRef> {
        if self.pure {
            return Err(SreError::PureWireGlobal {
                wire: self.wire_name.to_string(),
                name: name.to_string(),
            });
        }
        let mut globals = self.globals.lock();
        if globals.find(name).is_none() {
            // held by the process until teardown
            globals.reference(name);
        }
        Ok(VarRef::Global(globals.reference(name)))
    }

    pub fn release(&mut self, var: VarRef) {
        match var {
            VarRef::Wire(id) => self.wire.release(id),
            VarRef::Global(id) => self.globals.lock().release(id),
            VarRef::External(_) => {}
        }
    }

    pub fn read<R>(&self, var: &VarRef, f: impl FnOnce(&Value) -> R) -> R {
        match var {
            VarRef::Wire(id) => f(self.wire.get(*id).get()),
            VarRef::Global(id) => f(self.globals.lock().get(*id).get()),
            VarRef::External(external) => external.read(f),
        }
    }

    pub fn with_mut<R>(&mut self, var: &VarRef, f: impl FnOnce(&mut Value) -> R) -> R {
        match var {
            VarRef::Wire(id) => f(self.wire.get_mut(*id).get_mut()),
            VarRef::Global(id) => f(self.globals.lock().get_mut(*id).get_mut()),
            VarRef::External(external) => external.with_mut(f),
        }
    }

    /// Copy `value` into the slot
    pub fn assign(&mut self, var: &VarRef, value: &Value) {
        match var {
            VarRef::Wire(id) => self.wire.get_mut(*id).assign(value),
            VarRef::Global(id) => self.globals.lock().get_mut(*id).assign(value),
            VarRef::External(external) => external.assign(value),
        }
    }

    /// Owned copy of the slot content
    pub fn get_cloned(&self, var: &VarRef) -> Value {
        self.read(var, |v| v.deep_clone())
    }

    pub fn is_pure(&self) -> bool {
        self.pure
    }
}
