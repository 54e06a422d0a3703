use sre_core::SreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    #[error(transparent)]
    Engine(#[from] SreError),
    #[error("wire `{wire}` failed: {error}")]
    WireFailed { wire: String, error: String },
    #[error("iteration limit of {0} ticks reached")]
    IterationLimit(u64),
    #[error("wire {0} is not scheduled on this mesh")]
    NotScheduled(u64),
}

pub type MeshResult<T> = Result<T, MeshError>;
