//! SRE Mesh: host-side scheduling for wires.
//!
//! The engine only knows how to run one pass of a wire; the mesh owns a set
//! of wires, drives them against a [`Clock`] and decides what happens to the
//! ones that fail.

pub mod clock;
pub mod error;
pub mod mesh;
pub mod policy;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{MeshError, MeshResult};
pub use mesh::Mesh;
pub use policy::{Decision, FailureLog, FailurePolicy, FailureRecord};
