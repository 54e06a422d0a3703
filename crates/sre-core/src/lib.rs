//! Shards Runtime Engine - Core Library
//!
//! Public API surface for the SRE core.

pub mod compose;
pub mod config;
pub mod error;
pub mod loader;
pub mod process;
pub mod shard;
pub mod value;
pub mod vars;
pub mod wire;

// Re-export commonly used types
pub use compose::{ComposeResult, ExposedSet, ExposedVariable, InstanceData};
pub use config::SreConfig;
pub use error::{CompositionError, CompositionErrorKind, Severity, SreError, SreResult};
pub use loader::{WireDescription, WireLoader};
pub use process::ProcessContext;
pub use shard::{Flow, Shard, ShardRegistry, Wake};
pub use value::{DeepClone, SeqArray, Table, TypeDescriptor, Value, ValueSet, Var};
pub use vars::{ExternalVariable, VarScope};
pub use wire::{Wire, WireHandle, WireState};
