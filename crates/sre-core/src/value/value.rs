//! Runtime Value Representation
//!
//! Defines the tagged value flowing between shards.
//! Tags split into trivial ones (fixed size, copied flat, no destructor) and
//! non-trivial ones (own heap memory or a reference count). Copies are always
//! explicit through [`DeepClone`]; `Value` does not implement `Clone`.

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::invariant_violation;
use crate::wire::WireHandle;

use super::container::{Table, ValueSet};
use super::seq::SeqArray;

/// Value tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    None,
    /// Only meaningful in type descriptors
    Any,
    Bool,
    Int,
    Int2,
    Int3,
    Int4,
    Int8,
    Int16,
    Float,
    Float2,
    Float3,
    Float4,
    Color,
    Enum,
    Object,
    String,
    Bytes,
    Seq,
    Table,
    Set,
    Wire,
    ContextVar,
}

impl Tag {
    /// Trivial tags are copied flat and never run a destructor
    pub fn is_trivial(self) -> bool {
        !matches!(
            self,
            Tag::String | Tag::Bytes | Tag::Seq | Tag::Table | Tag::Set | Tag::Wire | Tag::ContextVar
        )
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Enumeration value, identified by vendor and type ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnumValue {
    pub vendor: u32,
    pub type_id: u32,
    pub value: i32,
}

/// Opaque object handle
///
/// The handle shares the payload; whoever created the object decides its
/// lifetime. Copying the handle is a flat copy of the reference.
#[derive(Clone)]
pub struct ObjectHandle {
    pub vendor: u32,
    pub type_id: u32,
    data: Arc<dyn Any + Send + Sync>,
}

impl ObjectHandle {
    pub fn new<T: Any + Send + Sync>(vendor: u32, type_id: u32, data: T) -> Self {
        ObjectHandle {
            vendor,
            type_id,
            data: Arc::new(data),
        }
    }

    pub fn from_shared(vendor: u32, type_id: u32, data: Arc<dyn Any + Send + Sync>) -> Self {
        ObjectHandle {
            vendor,
            type_id,
            data,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    pub fn same_object(&self, other: &ObjectHandle) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHandle")
            .field("vendor", &self.vendor)
            .field("type_id", &self.type_id)
            .finish_non_exhaustive()
    }
}

/// Runtime value
#[derive(Debug, Default)]
pub enum Value {
    /// Absence of a value
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Int2([i64; 2]),
    Int3([i32; 3]),
    Int4([i32; 4]),
    Int8([i16; 8]),
    Int16([i8; 16]),
    Float(f64),
    Float2([f64; 2]),
    Float3([f32; 3]),
    Float4([f32; 4]),
    Color([u8; 4]),
    Enum(EnumValue),
    Object(ObjectHandle),

    String(String),
    Bytes(Vec<u8>),
    Seq(SeqArray),
    Table(Table),
    Set(ValueSet),
    /// Sub-graph handle
    Wire(WireHandle),
    /// Reference to a named variable, resolved at warm-up
    ContextVar(String),
}

/// Explicit deep copy, distinct from `Clone`.
pub trait DeepClone: Sized {
    /// Produce an independent copy of `self`
    fn deep_clone(&self) -> Self;

    /// Copy `self` into `dst`, releasing whatever `dst` held before.
    /// Implementations may recycle `dst`'s allocations.
    fn clone_into(&self, dst: &mut Self) {
        *dst = self.deep_clone();
    }
}

impl Value {
    pub fn tag(&self) -> Tag {
        match self {
            Value::None => Tag::None,
            Value::Bool(_) => Tag::Bool,
            Value::Int(_) => Tag::Int,
            Value::Int2(_) => Tag::Int2,
            Value::Int3(_) => Tag::Int3,
            Value::Int4(_) => Tag::Int4,
            Value::Int8(_) => Tag::Int8,
            Value::Int16(_) => Tag::Int16,
            Value::Float(_) => Tag::Float,
            Value::Float2(_) => Tag::Float2,
            Value::Float3(_) => Tag::Float3,
            Value::Float4(_) => Tag::Float4,
            Value::Color(_) => Tag::Color,
            Value::Enum(_) => Tag::Enum,
            Value::Object(_) => Tag::Object,
            Value::String(_) => Tag::String,
            Value::Bytes(_) => Tag::Bytes,
            Value::Seq(_) => Tag::Seq,
            Value::Table(_) => Tag::Table,
            Value::Set(_) => Tag::Set,
            Value::Wire(_) => Tag::Wire,
            Value::ContextVar(_) => Tag::ContextVar,
        }
    }

    pub fn is_trivial(&self) -> bool {
        self.tag().is_trivial()
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Release owned resources and reset to `None`
    pub fn destroy(&mut self) {
        *self = Value::None;
    }

    /// Flat copy of a trivial value.
    ///
    /// Calling this on a non-trivial value is an engine bug.
    fn copy_trivial(&self) -> Value {
        match self {
            Value::None => Value::None,
            Value::Bool(v) => Value::Bool(*v),
            Value::Int(v) => Value::Int(*v),
            Value::Int2(v) => Value::Int2(*v),
            Value::Int3(v) => Value::Int3(*v),
            Value::Int4(v) => Value::Int4(*v),
            Value::Int8(v) => Value::Int8(*v),
            Value::Int16(v) => Value::Int16(*v),
            Value::Float(v) => Value::Float(*v),
            Value::Float2(v) => Value::Float2(*v),
            Value::Float3(v) => Value::Float3(*v),
            Value::Float4(v) => Value::Float4(*v),
            Value::Color(v) => Value::Color(*v),
            Value::Enum(v) => Value::Enum(*v),
            Value::Object(h) => Value::Object(h.clone()),
            _ => invariant_violation("flat copy of a non-trivial value"),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::ContextVar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&SeqArray> {
        match self {
            Value::Seq(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_wire(&self) -> Option<&WireHandle> {
        match self {
            Value::Wire(w) => Some(w),
            _ => None,
        }
    }

    /// Unchecked-by-contract cast. A tag mismatch means composition or the
    /// caller broke its guarantee, so the process aborts.
    pub fn cast_int(&self) -> i64 {
        match self {
            Value::Int(v) => *v,
            other => invariant_violation(&format!("cast to Int from {}", other.tag())),
        }
    }

    pub fn cast_float(&self) -> f64 {
        match self {
            Value::Float(v) => *v,
            other => invariant_violation(&format!("cast to Float from {}", other.tag())),
        }
    }

    pub fn cast_seq_mut(&mut self) -> &mut SeqArray {
        match self {
            Value::Seq(s) => s,
            other => invariant_violation(&format!("cast to Seq from {}", other.tag())),
        }
    }

    /// Equality where floats compare by bit pattern, used for set membership
    pub fn total_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Float2(a), Value::Float2(b)) => {
                a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Value::Float3(a), Value::Float3(b)) => {
                a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Value::Float4(a), Value::Float4(b)) => {
                a.iter().zip(b).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (Value::Seq(a), Value::Seq(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.total_eq(y))
            }
            (Value::Table(a), Value::Table(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.total_eq(w)))
            }
            (Value::Set(a), Value::Set(b)) => a.len() == b.len() && a.iter().all(|v| b.contains(v)),
            _ => self == other,
        }
    }

    /// Hash consistent with [`Value::total_eq`]
    pub fn total_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    fn hash_into<H: Hasher>(&self, state: &mut H) {
        self.tag().hash(state);
        match self {
            Value::None => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Int2(v) => v.hash(state),
            Value::Int3(v) => v.hash(state),
            Value::Int4(v) => v.hash(state),
            Value::Int8(v) => v.hash(state),
            Value::Int16(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Float2(v) => v.iter().for_each(|x| x.to_bits().hash(state)),
            Value::Float3(v) => v.iter().for_each(|x| x.to_bits().hash(state)),
            Value::Float4(v) => v.iter().for_each(|x| x.to_bits().hash(state)),
            Value::Color(v) => v.hash(state),
            Value::Enum(v) => v.hash(state),
            Value::Object(h) => {
                h.vendor.hash(state);
                h.type_id.hash(state);
                (Arc::as_ptr(&h.data) as *const () as usize).hash(state);
            }
            Value::String(s) | Value::ContextVar(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Seq(s) => {
                s.len().hash(state);
                s.iter().for_each(|v| v.hash_into(state));
            }
            // unordered containers hash order-independently
            Value::Table(t) => {
                t.len().hash(state);
                let sum = t.iter().fold(0u64, |acc, (k, v)| {
                    let mut h = DefaultHasher::new();
                    k.hash(&mut h);
                    v.hash_into(&mut h);
                    acc.wrapping_add(h.finish())
                });
                sum.hash(state);
            }
            Value::Set(s) => {
                s.len().hash(state);
                let sum = s
                    .iter()
                    .fold(0u64, |acc, v| acc.wrapping_add(v.total_hash()));
                sum.hash(state);
            }
            Value::Wire(w) => w.id().hash(state),
        }
    }
}

impl DeepClone for Value {
    fn deep_clone(&self) -> Value {
        match self {
            Value::String(s) => Value::String(s.clone()),
            Value::Bytes(b) => Value::Bytes(b.clone()),
            Value::Seq(s) => Value::Seq(s.deep_clone()),
            Value::Table(t) => Value::Table(t.deep_clone()),
            Value::Set(s) => Value::Set(s.deep_clone()),
            Value::Wire(w) => Value::Wire(w.clone()),
            Value::ContextVar(n) => Value::ContextVar(n.clone()),
            trivial => trivial.copy_trivial(),
        }
    }

    fn clone_into(&self, dst: &mut Value) {
        // fast path, nothing to release on either side
        if self.is_trivial() && dst.is_trivial() {
            *dst = self.copy_trivial();
            return;
        }
        match (self, &mut *dst) {
            (Value::String(s), Value::String(d)) => d.clone_from(s),
            (Value::ContextVar(s), Value::ContextVar(d)) => d.clone_from(s),
            (Value::Bytes(s), Value::Bytes(d)) => d.clone_from(s),
            (Value::Seq(s), Value::Seq(d)) => s.clone_into(d),
            (Value::Table(s), Value::Table(d)) => s.clone_into(d),
            (Value::Set(s), Value::Set(d)) => s.clone_into(d),
            _ => {
                dst.destroy();
                *dst = self.deep_clone();
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Int2(a), Value::Int2(b)) => a == b,
            (Value::Int3(a), Value::Int3(b)) => a == b,
            (Value::Int4(a), Value::Int4(b)) => a == b,
            (Value::Int8(a), Value::Int8(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Float2(a), Value::Float2(b)) => a == b,
            (Value::Float3(a), Value::Float3(b)) => a == b,
            (Value::Float4(a), Value::Float4(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.vendor == b.vendor && a.type_id == b.type_id && a.same_object(b)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::ContextVar(a), Value::ContextVar(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => a == b,
            (Value::Set(a), Value::Set(b)) => a == b,
            (Value::Wire(a), Value::Wire(b)) => a.same_wire(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<SeqArray> for Value {
    fn from(v: SeqArray) -> Self {
        Value::Seq(v)
    }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self {
        Value::Table(v)
    }
}

impl From<WireHandle> for Value {
    fn from(v: WireHandle) -> Self {
        Value::Wire(v)
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write!(f, "(")?;
    for (i, x) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{x}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "none"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Int2(v) => write_list(f, v),
            Value::Int3(v) => write_list(f, v),
            Value::Int4(v) => write_list(f, v),
            Value::Int8(v) => write_list(f, v),
            Value::Int16(v) => write_list(f, v),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Float2(v) => write_list(f, v),
            Value::Float3(v) => write_list(f, v),
            Value::Float4(v) => write_list(f, v),
            Value::Color(c) => write!(f, "#{:02x}{:02x}{:02x}{:02x}", c[0], c[1], c[2], c[3]),
            Value::Enum(e) => write!(f, "enum({}/{}:{})", e.vendor, e.type_id, e.value),
            Value::Object(o) => write!(f, "object({}/{})", o.vendor, o.type_id),
            Value::String(s) => write!(f, "{s}"),
            Value::Bytes(b) => write!(f, "bytes[{}]", b.len()),
            Value::Seq(s) => {
                write!(f, "[")?;
                for (i, v) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Table(t) => {
                write!(f, "{{")?;
                for (i, (k, v)) in t.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Value::Set(s) => {
                write!(f, "#{{")?;
                for (i, v) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "}}")
            }
            Value::Wire(w) => write!(f, "<wire {}>", w.id()),
            Value::ContextVar(n) => write!(f, "${n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Var;
    use crate::wire::Wire;

    /// One value per tag; every payload that is reference counted points at
    /// `payload` or `wire`.
    fn one_of_each(payload: &Arc<u32>, wire: &WireHandle) -> Vec<Value> {
        let object = || {
            let shared: Arc<dyn Any + Send + Sync> = payload.clone();
            Value::Object(ObjectHandle::from_shared(1, 2, shared))
        };
        let mut seq = SeqArray::new();
        seq.push(object());
        seq.push(Value::from("in a seq"));
        let mut table = Table::new();
        table.insert("object", object());
        table.insert("wire", Value::Wire(wire.clone()));
        let mut set = ValueSet::new();
        set.insert(Value::Int(1));
        set.insert(Value::from("two"));
        vec![
            Value::None,
            Value::Bool(true),
            Value::Int(-3),
            Value::Int2([1, 2]),
            Value::Int3([1, 2, 3]),
            Value::Int4([1, 2, 3, 4]),
            Value::Int8([1; 8]),
            Value::Int16([2; 16]),
            Value::Float(0.5),
            Value::Float2([0.5, 1.5]),
            Value::Float3([0.5; 3]),
            Value::Float4([0.25; 4]),
            Value::Color([255, 0, 0, 255]),
            Value::Enum(EnumValue { vendor: 1, type_id: 7, value: 2 }),
            object(),
            Value::from("text"),
            Value::Bytes(vec![1, 2, 3]),
            Value::Seq(seq),
            Value::Table(table),
            Value::Set(set),
            Value::Wire(wire.clone()),
            Value::ContextVar("x".into()),
        ]
    }

    #[test]
    fn clone_then_destroy_leaves_no_references_behind() {
        let payload = Arc::new(9u32);
        let wire = WireHandle::new(Wire::new("counted"));
        let values = one_of_each(&payload, &wire);

        let mut tags: Vec<Tag> = values.iter().map(Value::tag).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags.len(), 22);
        assert!(!tags.contains(&Tag::Any));

        let objects = Arc::strong_count(&payload);
        let wires = wire.handle_count();
        for value in &values {
            let mut slot = Value::None;
            value.clone_into(&mut slot);
            assert_eq!(&slot, value, "{:?}", value.tag());
            slot.destroy();
            assert!(slot.is_none());
            assert_eq!(Arc::strong_count(&payload), objects, "{:?}", value.tag());
            assert_eq!(wire.handle_count(), wires, "{:?}", value.tag());
        }
        // sources are untouched
        let fresh = one_of_each(&payload, &wire);
        for (value, expected) in values.iter().zip(&fresh) {
            assert_eq!(value, expected);
        }
    }

    #[test]
    fn foreign_slots_never_destroy_the_payload() {
        let payload = Arc::new(9u32);
        let wire = WireHandle::new(Wire::new("borrowed"));
        for value in one_of_each(&payload, &wire) {
            let shared = Arc::new(value.deep_clone());
            let objects = Arc::strong_count(&payload);
            let wires = wire.handle_count();

            let mut slot = Var::foreign(Arc::clone(&shared));
            slot.destroy();
            assert!(slot.get().is_none());
            assert_eq!(*shared, value, "{:?}", value.tag());

            let mut slot = Var::foreign(Arc::clone(&shared));
            slot.get_mut().destroy();
            assert!(!slot.is_foreign());
            assert_eq!(*shared, value, "{:?}", value.tag());
            drop(slot);

            assert_eq!(Arc::strong_count(&shared), 1);
            assert_eq!(Arc::strong_count(&payload), objects, "{:?}", value.tag());
            assert_eq!(wire.handle_count(), wires, "{:?}", value.tag());
        }
    }

    #[test]
    fn trivial_fast_path_overwrites_flat() {
        let src = Value::Int(7);
        let mut dst = Value::Float(1.0);
        src.clone_into(&mut dst);
        assert_eq!(dst, Value::Int(7));
        assert_eq!(src, Value::Int(7));
    }

    #[test]
    fn clone_into_recycles_string_and_keeps_source() {
        let src = Value::from("hello");
        let mut dst = Value::String(String::with_capacity(64));
        src.clone_into(&mut dst);
        assert_eq!(dst, Value::from("hello"));
        dst.destroy();
        assert!(dst.is_none());
        assert_eq!(src.as_str(), Some("hello"));
    }

    #[test]
    fn clone_into_replaces_different_tag() {
        let src = Value::Bytes(vec![1, 2, 3]);
        let mut dst = Value::from("old");
        src.clone_into(&mut dst);
        assert_eq!(dst, Value::Bytes(vec![1, 2, 3]));
    }

    #[test]
    fn object_handles_share_the_payload() {
        let obj = ObjectHandle::new(1, 2, 42u32);
        let v = Value::Object(obj.clone());
        let c = v.deep_clone();
        assert_eq!(v, c);
        match c {
            Value::Object(h) => assert_eq!(h.downcast_ref::<u32>(), Some(&42)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn total_eq_treats_nan_as_equal_to_itself() {
        let a = Value::Float(f64::NAN);
        assert!(a != a.deep_clone());
        assert!(a.total_eq(&a.deep_clone()));
        assert_eq!(a.total_hash(), a.deep_clone().total_hash());
    }

    #[test]
    fn trivial_partition() {
        assert!(Value::Int(1).is_trivial());
        assert!(Value::Enum(EnumValue { vendor: 1, type_id: 2, value: 3 }).is_trivial());
        assert!(!Value::from("x").is_trivial());
        assert!(!Value::ContextVar("x".into()).is_trivial());
    }
}
