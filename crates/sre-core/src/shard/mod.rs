pub mod builtin;
pub mod param;
pub mod registry;
pub mod shard;

pub use param::ParamVar;
pub use registry::{ShardConstructor, ShardRegistry};
pub use shard::{check_param, param_index, Flow, ParameterInfo, Shard, Signal, Wake};
