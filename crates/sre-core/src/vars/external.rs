//! Host-owned variables
//!
//! An [`ExternalVariable`] is a cell the host creates and keeps a handle to.
//! Wires borrow it for reads and writes but never destroy it; the payload
//! lives as long as the host (or any wire) holds a handle.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::value::{DeepClone, TypeDescriptor, Value, Var};

#[derive(Clone)]
pub struct ExternalVariable {
    cell: Arc<Mutex<Var>>,
    ty: TypeDescriptor,
}

impl ExternalVariable {
    pub fn new(value: Value, ty: TypeDescriptor) -> Self {
        ExternalVariable {
            cell: Arc::new(Mutex::new(Var::new(value))),
            ty,
        }
    }

    /// Cell whose type is derived from its initial value
    pub fn typed_by(value: Value) -> Self {
        let ty = TypeDescriptor::of(&value);
        Self::new(value, ty)
    }

    /// Cell viewing a payload the host keeps ownership of
    pub fn foreign(payload: Arc<Value>, ty: TypeDescriptor) -> Self {
        ExternalVariable {
            cell: Arc::new(Mutex::new(Var::foreign(payload))),
            ty,
        }
    }

    pub fn type_descriptor(&self) -> &TypeDescriptor {
        &self.ty
    }

    pub fn read<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        f(self.cell.lock().get())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut Value) -> R) -> R {
        f(self.cell.lock().get_mut())
    }

    pub fn assign(&self, value: &Value) {
        self.cell.lock().assign(value);
    }

    pub fn set(&self, value: Value) {
        self.cell.lock().set(value);
    }

    /// Owned copy of the current content
    pub fn snapshot(&self) -> Value {
        self.cell.lock().get().deep_clone()
    }

    pub fn same_cell(&self, other: &ExternalVariable) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for ExternalVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalVariable")
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_share_one_cell() {
        let host = ExternalVariable::typed_by(Value::Int(1));
        let engine = host.clone();
        engine.set(Value::Int(2));
        assert_eq!(host.snapshot(), Value::Int(2));
        assert!(host.same_cell(&engine));
        assert_eq!(host.type_descriptor(), &TypeDescriptor::Int);
    }

    #[test]
    fn foreign_payload_survives_writes() {
        let payload = Arc::new(Value::from("host"));
        let var = ExternalVariable::foreign(payload.clone(), TypeDescriptor::String);
        var.assign(&Value::from("engine"));
        assert_eq!(payload.as_str(), Some("host"));
        assert_eq!(var.snapshot().as_str(), Some("engine"));
    }
}
