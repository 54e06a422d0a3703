//! Type descriptors
//!
//! Composition-time description of a value's shape. Never consulted on the
//! activation path.

use std::fmt;

use super::value::{Tag, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TypeDescriptor {
    #[default]
    None,
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
    Enum { vendor: u32, type_id: u32 },
    Object { vendor: u32, type_id: u32 },
    String,
    Bytes,
    /// Accepted element types, empty means any element
    Seq(Vec<TypeDescriptor>),
    /// With `keys` empty, `types` applies to every value
    Table {
        keys: Vec<String>,
        types: Vec<TypeDescriptor>,
    },
    Set(Vec<TypeDescriptor>),
    Wire,
    /// Variable reference, with the accepted types of the referenced variable
    ContextVar(Vec<TypeDescriptor>),
}

impl TypeDescriptor {
    pub fn tag(&self) -> Tag {
        match self {
            TypeDescriptor::None => Tag::None,
            TypeDescriptor::Any => Tag::Any,
            TypeDescriptor::Bool => Tag::Bool,
            TypeDescriptor::Int => Tag::Int,
            TypeDescriptor::Int2 => Tag::Int2,
            TypeDescriptor::Int3 => Tag::Int3,
            TypeDescriptor::Int4 => Tag::Int4,
            TypeDescriptor::Int8 => Tag::Int8,
            TypeDescriptor::Int16 => Tag::Int16,
            TypeDescriptor::Float => Tag::Float,
            TypeDescriptor::Float2 => Tag::Float2,
            TypeDescriptor::Float3 => Tag::Float3,
            TypeDescriptor::Float4 => Tag::Float4,
            TypeDescriptor::Color => Tag::Color,
            TypeDescriptor::Enum { .. } => Tag::Enum,
            TypeDescriptor::Object { .. } => Tag::Object,
            TypeDescriptor::String => Tag::String,
            TypeDescriptor::Bytes => Tag::Bytes,
            TypeDescriptor::Seq(_) => Tag::Seq,
            TypeDescriptor::Table { .. } => Tag::Table,
            TypeDescriptor::Set(_) => Tag::Set,
            TypeDescriptor::Wire => Tag::Wire,
            TypeDescriptor::ContextVar(_) => Tag::ContextVar,
        }
    }

    pub fn seq_of(element: TypeDescriptor) -> Self {
        TypeDescriptor::Seq(vec![element])
    }

    pub fn any_seq() -> Self {
        TypeDescriptor::Seq(Vec::new())
    }

    pub fn any_table() -> Self {
        TypeDescriptor::Table {
            keys: Vec::new(),
            types: Vec::new(),
        }
    }

    /// Table known to hold `ty` under `key`
    pub fn table_record(key: &str, ty: TypeDescriptor) -> Self {
        TypeDescriptor::Table {
            keys: vec![key.to_string()],
            types: vec![ty],
        }
    }

    /// Derive the descriptor of a concrete value
    pub fn of(value: &Value) -> Self {
        match value {
            Value::None => TypeDescriptor::None,
            Value::Bool(_) => TypeDescriptor::Bool,
            Value::Int(_) => TypeDescriptor::Int,
            Value::Int2(_) => TypeDescriptor::Int2,
            Value::Int3(_) => TypeDescriptor::Int3,
            Value::Int4(_) => TypeDescriptor::Int4,
            Value::Int8(_) => TypeDescriptor::Int8,
            Value::Int16(_) => TypeDescriptor::Int16,
            Value::Float(_) => TypeDescriptor::Float,
            Value::Float2(_) => TypeDescriptor::Float2,
            Value::Float3(_) => TypeDescriptor::Float3,
            Value::Float4(_) => TypeDescriptor::Float4,
            Value::Color(_) => TypeDescriptor::Color,
            Value::Enum(e) => TypeDescriptor::Enum {
                vendor: e.vendor,
                type_id: e.type_id,
            },
            Value::Object(o) => TypeDescriptor::Object {
                vendor: o.vendor,
                type_id: o.type_id,
            },
            Value::String(_) => TypeDescriptor::String,
            Value::Bytes(_) => TypeDescriptor::Bytes,
            Value::Seq(s) => TypeDescriptor::Seq(distinct(s.iter().map(TypeDescriptor::of))),
            Value::Table(t) => {
                let (keys, types): (Vec<String>, Vec<TypeDescriptor>) = t
                    .iter()
                    .map(|(k, v)| (k.to_string(), TypeDescriptor::of(v)))
                    .unzip();
                TypeDescriptor::Table { keys, types }
            }
            Value::Set(s) => TypeDescriptor::Set(distinct(s.iter().map(TypeDescriptor::of))),
            Value::Wire(_) => TypeDescriptor::Wire,
            Value::ContextVar(_) => TypeDescriptor::ContextVar(Vec::new()),
        }
    }

    /// Whether a value described by `other` may flow where `self` is expected.
    ///
    /// `Any` on either side matches; the check moves to run time.
    pub fn accepts(&self, other: &TypeDescriptor) -> bool {
        use TypeDescriptor as T;
        match (self, other) {
            (T::Any, _) | (_, T::Any) => true,
            (T::Seq(want), T::Seq(have))
            | (T::Set(want), T::Set(have))
            | (T::ContextVar(want), T::ContextVar(have)) => elements_accepted(want, have),
            (
                T::Table {
                    keys: want_keys,
                    types: want_types,
                },
                T::Table {
                    keys: have_keys,
                    types: have_types,
                },
            ) => {
                if want_keys.is_empty() {
                    return elements_accepted(want_types, have_types);
                }
                want_keys.iter().zip(want_types).all(|(key, want)| {
                    match have_keys.iter().position(|k| k == key) {
                        Some(i) => have_types.get(i).is_some_and(|have| want.accepts(have)),
                        // an untyped table may still carry the key at run time
                        None => have_keys.is_empty() && have_types.iter().all(|h| want.accepts(h)),
                    }
                })
            }
            (T::Enum { vendor: a, type_id: b }, T::Enum { vendor: c, type_id: d })
            | (T::Object { vendor: a, type_id: b }, T::Object { vendor: c, type_id: d }) => {
                a == c && b == d
            }
            _ => self.tag() == other.tag(),
        }
    }

    /// `accepts` against a set of alternatives
    pub fn any_accepts(candidates: &[TypeDescriptor], other: &TypeDescriptor) -> bool {
        candidates.iter().any(|c| c.accepts(other))
    }
}

fn elements_accepted(want: &[TypeDescriptor], have: &[TypeDescriptor]) -> bool {
    want.is_empty() || have.iter().all(|h| TypeDescriptor::any_accepts(want, h))
}

fn distinct(types: impl Iterator<Item = TypeDescriptor>) -> Vec<TypeDescriptor> {
    let mut out: Vec<TypeDescriptor> = Vec::new();
    for t in types {
        if !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

fn write_types(f: &mut fmt::Formatter<'_>, types: &[TypeDescriptor]) -> fmt::Result {
    for (i, t) in types.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{t}")?;
    }
    Ok(())
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Enum { vendor, type_id } => write!(f, "Enum({vendor}/{type_id})"),
            TypeDescriptor::Object { vendor, type_id } => write!(f, "Object({vendor}/{type_id})"),
            TypeDescriptor::Seq(types) => {
                write!(f, "Seq[")?;
                write_types(f, types)?;
                write!(f, "]")
            }
            TypeDescriptor::Set(types) => {
                write!(f, "Set[")?;
                write_types(f, types)?;
                write!(f, "]")
            }
            TypeDescriptor::ContextVar(types) => {
                write!(f, "Var[")?;
                write_types(f, types)?;
                write!(f, "]")
            }
            TypeDescriptor::Table { keys, types } => {
                write!(f, "Table{{")?;
                if keys.is_empty() {
                    write_types(f, types)?;
                } else {
                    for (i, (k, t)) in keys.iter().zip(types).enumerate() {
                        if i > 0 {
                            write!(f, " ")?;
                        }
                        write!(f, "{k}: {t}")?;
                    }
                }
                write!(f, "}}")
            }
            other => write!(f, "{}", other.tag()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{SeqArray, Table};

    #[test]
    fn derives_nested_shapes() {
        let seq: SeqArray = vec![Value::Int(1), Value::Int(2), Value::from("x")]
            .into_iter()
            .collect();
        assert_eq!(
            TypeDescriptor::of(&Value::Seq(seq)),
            TypeDescriptor::Seq(vec![TypeDescriptor::Int, TypeDescriptor::String])
        );

        let mut table = Table::new();
        table.insert("n", Value::Float(1.0));
        assert_eq!(
            TypeDescriptor::of(&Value::Table(table)),
            TypeDescriptor::table_record("n", TypeDescriptor::Float)
        );
    }

    #[test]
    fn any_matches_both_ways() {
        assert!(TypeDescriptor::Any.accepts(&TypeDescriptor::Int));
        assert!(TypeDescriptor::Int.accepts(&TypeDescriptor::Any));
        assert!(!TypeDescriptor::Int.accepts(&TypeDescriptor::Float));
    }

    #[test]
    fn sequences_check_elements() {
        let ints = TypeDescriptor::seq_of(TypeDescriptor::Int);
        assert!(ints.accepts(&TypeDescriptor::seq_of(TypeDescriptor::Int)));
        assert!(ints.accepts(&TypeDescriptor::any_seq()));
        assert!(!ints.accepts(&TypeDescriptor::seq_of(TypeDescriptor::String)));
        assert!(TypeDescriptor::any_seq().accepts(&TypeDescriptor::seq_of(TypeDescriptor::String)));
    }

    #[test]
    fn tables_check_known_keys() {
        let want = TypeDescriptor::table_record("a", TypeDescriptor::Int);
        assert!(want.accepts(&TypeDescriptor::table_record("a", TypeDescriptor::Int)));
        assert!(!want.accepts(&TypeDescriptor::table_record("a", TypeDescriptor::Bool)));
        assert!(!want.accepts(&TypeDescriptor::table_record("b", TypeDescriptor::Int)));
        assert!(TypeDescriptor::any_table().accepts(&want));
    }

    #[test]
    fn display_is_readable() {
        assert_eq!(TypeDescriptor::seq_of(TypeDescriptor::Int).to_string(), "Seq[Int]");
        assert_eq!(
            TypeDescriptor::table_record("k", TypeDescriptor::String).to_string(),
            "Table{k: String}"
        );
    }
}
