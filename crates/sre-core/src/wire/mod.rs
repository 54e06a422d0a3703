pub mod context;
pub mod seq;
pub mod state;
pub mod wire;

pub use context::Context;
pub use seq::{ReturnPolicy, SeqOutcome, ShardHandle, ShardSeq};
pub use state::WireState;
pub use wire::{SchedulerId, StopHandle, Wire, WireFlags, WireHandle};
