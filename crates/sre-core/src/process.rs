//! Process context
//!
//! The state shared by every wire of one engine instance: configuration,
//! global variables, the shard registry and the enum/object type registry.
//! Hosts create one with [`ProcessContext::init`] and call
//! [`ProcessContext::teardown`] when done; tests build an isolated instance
//! each.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::SreConfig;
use crate::shard::ShardRegistry;
use crate::value::{DeepClone, EnumValue, TypeDescriptor, Value};
use crate::vars::VariableScope;

/// Registered object type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTypeInfo {
    pub vendor: u32,
    pub type_id: u32,
    pub name: String,
}

/// Registered enum type and its labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumTypeInfo {
    pub vendor: u32,
    pub type_id: u32,
    pub name: String,
    pub labels: Vec<(i32, String)>,
}

#[derive(Debug, Default)]
struct TypeRegistry {
    objects: HashMap<(u32, u32), ObjectTypeInfo>,
    enums: HashMap<(u32, u32), EnumTypeInfo>,
}

#[derive(Debug)]
pub struct ProcessContext {
    config: SreConfig,
    globals: Mutex<VariableScope>,
    shards: ShardRegistry,
    types: Mutex<TypeRegistry>,
}

impl ProcessContext {
    /// Context with the core shard library registered
    pub fn init(config: SreConfig) -> Arc<Self> {
        Self::with_registry(config, ShardRegistry::with_core_shards())
    }

    pub fn with_registry(config: SreConfig, shards: ShardRegistry) -> Arc<Self> {
        tracing::debug!(?config, "process context initialised");
        Arc::new(ProcessContext {
            config,
            globals: Mutex::new(VariableScope::new()),
            shards,
            types: Mutex::new(TypeRegistry::default()),
        })
    }

    pub fn config(&self) -> &SreConfig {
        &self.config
    }

    pub fn shards(&self) -> &ShardRegistry {
        &self.shards
    }

    pub(crate) fn globals(&self) -> &Mutex<VariableScope> {
        &self.globals
    }

    /// Set a global variable, creating it if needed. Created globals live
    /// until teardown.
    pub fn set_global(&self, name: &str, value: Value) {
        let mut globals = self.globals.lock();
        let id = match globals.find(name) {
            Some(id) => id,
            None => globals.reference(name),
        };
        globals.get_mut(id).set(value);
    }

    /// Copy of a global variable
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.lock().value_of(name).map(|v| v.deep_clone())
    }

    /// Names and current types of the global variables
    pub fn global_types(&self) -> Vec<(String, TypeDescriptor)> {
        let globals = self.globals.lock();
        globals
            .names()
            .filter_map(|name| {
                globals
                    .value_of(name)
                    .map(|v| (name.to_string(), TypeDescriptor::of(v)))
            })
            .collect()
    }

    pub fn register_object_type(&self, info: ObjectTypeInfo) {
        self.types
            .lock()
            .objects
            .insert((info.vendor, info.type_id), info);
    }

    pub fn object_type(&self, vendor: u32, type_id: u32) -> Option<ObjectTypeInfo> {
        self.types.lock().objects.get(&(vendor, type_id)).cloned()
    }

    pub fn register_enum_type(&self, info: EnumTypeInfo) {
        self.types
            .lock()
            .enums
            .insert((info.vendor, info.type_id), info);
    }

    pub fn enum_type(&self, vendor: u32, type_id: u32) -> Option<EnumTypeInfo> {
        self.types.lock().enums.get(&(vendor, type_id)).cloned()
    }

    /// `Type.Label` for a registered enum value
    pub fn enum_label(&self, value: &EnumValue) -> Option<String> {
        let types = self.types.lock();
        let info = types.enums.get(&(value.vendor, value.type_id))?;
        info.labels
            .iter()
            .find(|(v, _)| *v == value.value)
            .map(|(_, label)| format!("{}.{}", info.name, label))
    }

    /// Destroy every global variable, newest first
    pub fn teardown(&self) {
        let mut globals = self.globals.lock();
        tracing::debug!(globals = globals.len(), "process teardown");
        globals.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_live_until_teardown() {
        let process = ProcessContext::init(SreConfig::new());
        process.set_global("answer", Value::Int(42));
        process.set_global("answer", Value::Int(43));
        assert_eq!(process.global("answer"), Some(Value::Int(43)));
        assert_eq!(
            process.global_types(),
            vec![("answer".to_string(), TypeDescriptor::Int)]
        );
        process.teardown();
        assert_eq!(process.global("answer"), None);
    }

    #[test]
    fn enum_labels_resolve_through_the_registry() {
        let process = ProcessContext::init(SreConfig::new());
        process.register_enum_type(EnumTypeInfo {
            vendor: 1,
            type_id: 7,
            name: "Mode".into(),
            labels: vec![(0, "Off".into()), (1, "On".into())],
        });
        let on = EnumValue {
            vendor: 1,
            type_id: 7,
            value: 1,
        };
        assert_eq!(process.enum_label(&on).as_deref(), Some("Mode.On"));
        assert_eq!(process.enum_label(&EnumValue { value: 5, ..on }), None);
    }

    #[test]
    fn instances_are_isolated() {
        let a = ProcessContext::init(SreConfig::new());
        let b = ProcessContext::init(SreConfig::new());
        a.set_global("x", Value::Bool(true));
        assert!(b.global("x").is_none());
    }
}
