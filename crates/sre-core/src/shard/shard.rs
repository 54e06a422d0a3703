//! Shard capability contract
//!
//! Every processing node implements [`Shard`]. The engine drives the calls in
//! a fixed order: parameters are set, `compose` runs during the composition
//! pass, `warm_up` once per activation lifecycle, `activate` any number of
//! times, `clean_up` at the end of the lifecycle and `destroy` once when the
//! shard is dropped by its owning sequence.

use std::time::Duration;

use crate::compose::{ExposedVariable, InstanceData};
use crate::error::{CompositionError, CompositionErrorKind, SreError, SreResult};
use crate::value::{TypeDescriptor, Value};
use crate::wire::Context;

/// Result of a successful activation
#[derive(Debug)]
pub enum Flow {
    /// Hand the output to the next shard
    Continue(Value),
    /// End the sequence early, keeping the current input as its result
    Return,
    /// End the wire
    Stop,
    /// Start a fresh iteration of the wire
    Restart,
    /// Yield to the scheduler; the same shard is re-activated on wake
    Suspend(Wake),
}

/// When a suspended wire becomes due again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// Next scheduler tick
    Now,
    /// Once the scheduler clock reaches this instant
    At(Duration),
}

/// Control signal vocabulary seen by the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Continue,
    Return,
    Stop,
    Restart,
    Error(String),
}

impl Flow {
    /// Signal carried by this flow, `None` for a suspension
    pub fn signal(&self) -> Option<Signal> {
        match self {
            Flow::Continue(_) => Some(Signal::Continue),
            Flow::Return => Some(Signal::Return),
            Flow::Stop => Some(Signal::Stop),
            Flow::Restart => Some(Signal::Restart),
            Flow::Suspend(_) => None,
        }
    }

    /// Signal for a full activation result, errors included
    pub fn signal_of(result: &SreResult<Flow>) -> Option<Signal> {
        match result {
            Ok(flow) => flow.signal(),
            Err(e) => Some(Signal::Error(e.to_string())),
        }
    }
}

/// Parameter schema entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    pub name: &'static str,
    pub help: &'static str,
    pub types: Vec<TypeDescriptor>,
}

impl ParameterInfo {
    pub fn new(name: &'static str, help: &'static str, types: Vec<TypeDescriptor>) -> Self {
        ParameterInfo { name, help, types }
    }
}

pub trait Shard: Send {
    fn name(&self) -> &'static str;

    fn help(&self) -> &'static str {
        ""
    }

    fn input_types(&self) -> Vec<TypeDescriptor>;

    fn output_types(&self) -> Vec<TypeDescriptor>;

    fn parameters(&self) -> Vec<ParameterInfo> {
        Vec::new()
    }

    fn set_param(&mut self, index: usize, _value: &Value) -> SreResult<()> {
        Err(SreError::ParamOutOfRange {
            shard: self.name(),
            index,
        })
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        Err(SreError::ParamOutOfRange {
            shard: self.name(),
            index,
        })
    }

    /// Output type for the given instance data.
    ///
    /// The default picks the single declared output type, passing the input
    /// type through when that is `Any`.
    fn compose(&mut self, data: &mut InstanceData<'_>) -> Result<TypeDescriptor, CompositionError> {
        match self.output_types().as_slice() {
            [TypeDescriptor::Any] => Ok(data.input_type.clone()),
            [single] => Ok(single.clone()),
            _ => Err(CompositionError::new(
                CompositionErrorKind::ShardRejected,
                "shard declares several output types and does not compose",
            )
            .in_shard(self.name())),
        }
    }

    fn exposed_variables(&self) -> Vec<ExposedVariable> {
        Vec::new()
    }

    fn required_variables(&self) -> Vec<ExposedVariable> {
        Vec::new()
    }

    /// Unconditionally ends the enclosing sequence
    fn is_flow_stopper(&self) -> bool {
        false
    }

    fn warm_up(&mut self, _ctx: &mut Context<'_>) -> SreResult<()> {
        Ok(())
    }

    fn activate(&mut self, ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow>;

    /// Must tolerate being called without a preceding successful `warm_up`
    fn clean_up(&mut self, _ctx: &mut Context<'_>) {}

    fn destroy(&mut self) {}
}

/// Index of the parameter called `name`
pub fn param_index(shard: &dyn Shard, name: &str) -> Option<usize> {
    shard.parameters().iter().position(|p| p.name == name)
}

/// Check `value` against the accepted types of parameter `index`
pub fn check_param(shard: &dyn Shard, index: usize, value: &Value) -> SreResult<()> {
    let params = shard.parameters();
    let info = params.get(index).ok_or(SreError::ParamOutOfRange {
        shard: shard.name(),
        index,
    })?;
    let ty = TypeDescriptor::of(value);
    if TypeDescriptor::any_accepts(&info.types, &ty) {
        Ok(())
    } else {
        Err(SreError::InvalidParam {
            shard: shard.name(),
            param: info.name,
            reason: format!("got {ty}"),
        })
    }
}
