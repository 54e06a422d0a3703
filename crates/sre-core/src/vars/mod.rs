pub mod external;
pub mod registry;
pub mod scope;

pub use external::ExternalVariable;
pub use registry::{ExternalVariables, VarRef, VariableRegistry};
pub use scope::{SlotId, VariableScope};

/// Where a variable lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarScope {
    /// Local to one wire, destroyed at its clean-up
    Wire,
    /// Process-wide, destroyed at process teardown
    Global,
    /// Owned by the host, never destroyed by the engine
    External,
}
