//! SRE Error Types
//!
//! Defines all recoverable error conditions produced by the Shards Runtime Engine.
//! Three families exist: composition errors (raised while a wire is composed),
//! activation errors (raised while a wire runs, they end the run in `Failed`)
//! and invariant violations. The latter are not represented here at all: they
//! abort the process through [`invariant_violation`].

use std::fmt;
use std::io;

use thiserror::Error;

use crate::wire::WireState;

#[derive(Debug, Error)]
pub enum SreError {
    // Composition
    #[error(transparent)]
    Composition(#[from] CompositionError),

    // Wire state machine
    #[error("illegal wire transition: {from:?} -> {to:?}")]
    IllegalTransition { from: WireState, to: WireState },
    #[error("wire `{wire}` is not iterating (state: {state:?})")]
    NotIterating { wire: String, state: WireState },
    #[error("wire `{wire}` was started by scheduler {owner} and cannot be resumed by scheduler {caller}")]
    ResumeDenied { wire: String, owner: u64, caller: u64 },
    #[error("wire `{0}` is busy")]
    WireBusy(String),

    // Shards
    #[error("unknown shard: {0}")]
    UnknownShard(String),
    #[error("{shard}: parameter index {index} out of range")]
    ParamOutOfRange { shard: &'static str, index: usize },
    #[error("{shard}: invalid value for parameter `{param}`: {reason}")]
    InvalidParam {
        shard: &'static str,
        param: &'static str,
        reason: String,
    },
    #[error("shard handle does not belong to this sequence")]
    ForeignShardHandle,
    #[error("shard sequence is already owned by `{0}`")]
    AlreadyOwned(String),
    #[error("warm-up failed in {shard}: {reason}")]
    WarmUp { shard: &'static str, reason: String },

    // Activation
    #[error("{0}")]
    Activation(String),
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },
    #[error("nesting depth {0} exceeds the configured limit")]
    NestingTooDeep(usize),

    // Variables
    #[error("variable not found: {0}")]
    VariableNotFound(String),
    #[error("pure wire `{wire}` cannot reference global variable `{name}`")]
    PureWireGlobal { wire: String, name: String },

    // Loading & IO boundary
    #[error("invalid wire description: {0}")]
    InvalidDescription(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl SreError {
    /// Shorthand for an activation failure carrying a message.
    pub fn activation(msg: impl Into<String>) -> Self {
        SreError::Activation(msg.into())
    }
}

pub type SreResult<T> = Result<T, SreError>;

/// Closed list of composition failures.
///
/// Every kind has a fixed severity, see [`CompositionErrorKind::severity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositionErrorKind {
    /// A shard requires a variable nobody exposed before it.
    MissingRequiredVariable,
    /// A required variable is exposed with an incompatible type.
    RequiredTypeMismatch,
    /// A variable is re-exposed with a different type.
    ExposedTypeConflict,
    /// The incoming type is not among the shard's accepted input types.
    InputTypeMismatch,
    /// The shard's own `compose` refused the instance data.
    ShardRejected,
    /// A shard tries to write a variable that was exposed as immutable.
    MutatesImmutable,
    /// A variable that is already exposed gets exposed again.
    VariableShadowed,
    /// Shards that follow an unconditional flow stopper.
    UnreachableShard,
}

/// Whether a composition error blocks preparation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Fatal,
    Advisory,
}

impl CompositionErrorKind {
    pub fn severity(self) -> Severity {
        match self {
            CompositionErrorKind::MissingRequiredVariable
            | CompositionErrorKind::RequiredTypeMismatch
            | CompositionErrorKind::ExposedTypeConflict
            | CompositionErrorKind::InputTypeMismatch
            | CompositionErrorKind::ShardRejected
            | CompositionErrorKind::MutatesImmutable => Severity::Fatal,
            CompositionErrorKind::VariableShadowed | CompositionErrorKind::UnreachableShard => {
                Severity::Advisory
            }
        }
    }
}

impl fmt::Display for CompositionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            CompositionErrorKind::MissingRequiredVariable => "required variable not found",
            CompositionErrorKind::RequiredTypeMismatch => "required variable type mismatch",
            CompositionErrorKind::ExposedTypeConflict => "exposed variable type conflict",
            CompositionErrorKind::InputTypeMismatch => "input type mismatch",
            CompositionErrorKind::ShardRejected => "shard rejected composition",
            CompositionErrorKind::MutatesImmutable => "write to immutable variable",
            CompositionErrorKind::VariableShadowed => "variable shadowed",
            CompositionErrorKind::UnreachableShard => "unreachable shard",
        };
        f.write_str(text)
    }
}

/// Error raised by the composition pass or by a shard's `compose`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}{}", .shard.map(|s| format!(" (in {s})")).unwrap_or_default())]
pub struct CompositionError {
    pub kind: CompositionErrorKind,
    pub message: String,
    pub shard: Option<&'static str>,
}

impl CompositionError {
    pub fn new(kind: CompositionErrorKind, message: impl Into<String>) -> Self {
        CompositionError {
            kind,
            message: message.into(),
            shard: None,
        }
    }

    /// Error raised from inside a shard's own `compose`.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(CompositionErrorKind::ShardRejected, message)
    }

    pub fn in_shard(mut self, shard: &'static str) -> Self {
        self.shard.get_or_insert(shard);
        self
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Abort the process after an engine or shard bug was detected.
///
/// Capacity overflow, use of a released variable slot and tag mismatches on
/// unchecked casts end up here. Continuing would corrupt state.
#[cold]
pub fn invariant_violation(msg: &str) -> ! {
    tracing::error!(violation = msg, "invariant violation, aborting");
    eprintln!("sre: invariant violation: {msg}");
    std::process::abort()
}
