pub mod container;
pub mod seq;
pub mod types;
pub mod value;
pub mod var;

pub use container::{SetInterface, Table, TableInterface, ValueSet};
pub use seq::SeqArray;
pub use types::TypeDescriptor;
pub use value::{DeepClone, EnumValue, ObjectHandle, Tag, Value};
pub use var::Var;
