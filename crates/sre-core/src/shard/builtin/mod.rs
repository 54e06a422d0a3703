//! Core shard library

pub mod flow;
pub mod logic;
pub mod nested;
pub mod variables;

pub use flow::{Const, Fail, Input, Log, Pass, Pause, Restart, Return, Stop};
pub use logic::{Is, IsNot, MathAdd, Not};
pub use nested::{Repeat, Sub};
pub use variables::{Count, Get, Push, Set, Update};

use super::registry::ShardRegistry;
use super::shard::Shard;

fn boxed<S: Shard + Default + 'static>() -> Box<dyn Shard> {
    Box::new(S::default())
}

/// Register every core shard under its name
pub fn register_all(registry: &ShardRegistry) {
    registry.register("Const", boxed::<Const>);
    registry.register("Input", boxed::<Input>);
    registry.register("Pass", boxed::<Pass>);
    registry.register("Stop", boxed::<Stop>);
    registry.register("Restart", boxed::<Restart>);
    registry.register("Return", boxed::<Return>);
    registry.register("Fail", boxed::<Fail>);
    registry.register("Pause", boxed::<Pause>);
    registry.register("Log", boxed::<Log>);
    registry.register("Set", boxed::<Set>);
    registry.register("Update", boxed::<Update>);
    registry.register("Get", boxed::<Get>);
    registry.register("Push", boxed::<Push>);
    registry.register("Count", boxed::<Count>);
    registry.register("Is", boxed::<Is>);
    registry.register("IsNot", boxed::<IsNot>);
    registry.register("Not", boxed::<Not>);
    registry.register("Math.Add", boxed::<MathAdd>);
    registry.register("Sub", boxed::<Sub>);
    registry.register("Repeat", boxed::<Repeat>);
}
