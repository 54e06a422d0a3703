pub mod loader;

pub use loader::{value_to_json, ShardDescription, WireDescription, WireLoader};
