pub mod compose;

pub use compose::{compose_sequence, ComposeResult, ExposedSet, ExposedVariable, InstanceData};
