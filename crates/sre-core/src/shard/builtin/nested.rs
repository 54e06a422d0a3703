//! Nested sequences: `Sub` and `Repeat`.
//!
//! Both run the shards of another wire inline, in the caller's context and
//! variable scope, and pass their own input through. `Stop`, `Restart`,
//! errors and suspensions of the nested run always reach the caller. `Sub`
//! treats a nested `Return` as completion; `Repeat` hands it on.

use crate::compose::{compose_sequence, ExposedVariable, InstanceData};
use crate::error::{CompositionError, SreError, SreResult};
use crate::shard::{check_param, Flow, ParameterInfo, Shard};
use crate::value::{DeepClone, TypeDescriptor, Value};
use crate::wire::{Context, ReturnPolicy, SeqOutcome, WireHandle};

/// Inline nested wire, shared by `Sub` and `Repeat`
#[derive(Debug, Default)]
struct Nested {
    wire: Option<WireHandle>,
    exposed: Vec<ExposedVariable>,
    required: Vec<ExposedVariable>,
    claimed: bool,
}

impl Nested {
    fn set(&mut self, value: &Value) {
        self.wire = value.as_wire().cloned();
        self.exposed.clear();
        self.required.clear();
    }

    fn get(&self) -> Value {
        match &self.wire {
            Some(wire) => Value::Wire(wire.clone()),
            None => Value::None,
        }
    }

    fn compose(&mut self, data: &mut InstanceData<'_>) -> Result<(), CompositionError> {
        self.exposed.clear();
        self.required.clear();
        let Some(handle) = &self.wire else {
            return Ok(());
        };
        let mut inner = handle
            .try_lock()
            .ok_or_else(|| CompositionError::rejected("nested wire is in use"))?;
        let result = compose_sequence(inner.shards_mut(), data)?;
        self.exposed = result.exposed.iter().cloned().collect();
        self.required = result.required.iter().cloned().collect();
        Ok(())
    }

    fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
        let Some(handle) = &self.wire else {
            return Ok(());
        };
        let mut inner = handle
            .try_lock()
            .ok_or_else(|| SreError::WireBusy(format!("nested wire {}", handle.id())))?;
        let seq = inner.shards_mut();
        seq.claim(ctx.wire_name())?;
        if let Err(error) = seq.warm_up(ctx) {
            seq.unclaim();
            return Err(error);
        }
        self.claimed = true;
        Ok(())
    }

    fn activate(
        &mut self,
        ctx: &mut Context<'_>,
        input: &Value,
        policy: ReturnPolicy,
    ) -> SreResult<Option<SeqOutcome>> {
        let Some(handle) = &self.wire else {
            return Ok(None);
        };
        let mut inner = handle
            .try_lock()
            .ok_or_else(|| SreError::WireBusy(format!("nested wire {}", handle.id())))?;
        ctx.enter_nested()?;
        let outcome = inner.shards_mut().activate(ctx, input, policy);
        ctx.leave_nested();
        outcome.map(Some)
    }

    fn clean_up(&mut self, ctx: &mut Context<'_>) {
        if !self.claimed {
            return;
        }
        self.claimed = false;
        if let Some(handle) = &self.wire {
            let mut inner = handle.lock();
            let seq = inner.shards_mut();
            seq.clean_up(ctx);
            seq.unclaim();
        }
    }
}

fn shards_param() -> ParameterInfo {
    ParameterInfo::new(
        "Shards",
        "The shards to run.",
        vec![TypeDescriptor::Wire, TypeDescriptor::None],
    )
}

/// Runs a nested sequence once per activation
#[derive(Debug, Default)]
pub struct Sub {
    nested: Nested,
}

impl Sub {
    pub fn new(wire: WireHandle) -> Self {
        let mut sub = Sub::default();
        sub.nested.set(&Value::Wire(wire));
        sub
    }
}

impl Shard for Sub {
    fn name(&self) -> &'static str {
        "Sub"
    }

    fn help(&self) -> &'static str {
        "Runs the shards on the input and outputs the input unchanged."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![shards_param()]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        check_param(self, index, value)?;
        self.nested.set(value);
        Ok(())
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(self.nested.get()),
            _ => Err(SreError::ParamOutOfRange {
                shard: self.name(),
                index,
            }),
        }
    }

    fn compose(&mut self, data: &mut InstanceData<'_>) -> Result<TypeDescriptor, CompositionError> {
        self.nested.compose(data)?;
        Ok(data.input_type.clone())
    }

    fn exposed_variables(&self) -> Vec<ExposedVariable> {
        self.nested.exposed.clone()
    }

    fn required_variables(&self) -> Vec<ExposedVariable> {
        self.nested.required.clone()
    }

    fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
        self.nested.warm_up(ctx)
    }

    fn activate(&mut self, ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
        Ok(match self.nested.activate(ctx, input, ReturnPolicy::Swallow)? {
            None | Some(SeqOutcome::Done(_)) | Some(SeqOutcome::Returned(_)) => {
                Flow::Continue(input.deep_clone())
            }
            Some(SeqOutcome::Stopped(_)) => Flow::Stop,
            Some(SeqOutcome::Restarted) => Flow::Restart,
            Some(SeqOutcome::Suspended(wake)) => Flow::Suspend(wake),
        })
    }

    fn clean_up(&mut self, ctx: &mut Context<'_>) {
        self.nested.clean_up(ctx);
    }
}

/// Runs a nested sequence `Times` times per activation
#[derive(Debug, Default)]
pub struct Repeat {
    nested: Nested,
    times: i64,
    /// Completed runs of the current activation, kept across suspensions
    done: i64,
}

impl Repeat {
    pub fn new(wire: WireHandle, times: i64) -> Self {
        let mut repeat = Repeat {
            times,
            ..Repeat::default()
        };
        repeat.nested.set(&Value::Wire(wire));
        repeat
    }
}

impl Shard for Repeat {
    fn name(&self) -> &'static str {
        "Repeat"
    }

    fn help(&self) -> &'static str {
        "Runs the shards a number of times and outputs the input unchanged."
    }

    fn input_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn output_types(&self) -> Vec<TypeDescriptor> {
        vec![TypeDescriptor::Any]
    }

    fn parameters(&self) -> Vec<ParameterInfo> {
        vec![
            shards_param(),
            ParameterInfo::new(
                "Times",
                "How many times to run the shards.",
                vec![TypeDescriptor::Int],
            ),
        ]
    }

    fn set_param(&mut self, index: usize, value: &Value) -> SreResult<()> {
        check_param(self, index, value)?;
        match index {
            0 => self.nested.set(value),
            _ => self.times = value.as_int().unwrap_or(0),
        }
        Ok(())
    }

    fn get_param(&self, index: usize) -> SreResult<Value> {
        match index {
            0 => Ok(self.nested.get()),
            1 => Ok(Value::Int(self.times)),
            _ => Err(SreError::ParamOutOfRange {
                shard: self.name(),
                index,
            }),
        }
    }

    fn compose(&mut self, data: &mut InstanceData<'_>) -> Result<TypeDescriptor, CompositionError> {
        self.nested.compose(data)?;
        Ok(data.input_type.clone())
    }

    fn exposed_variables(&self) -> Vec<ExposedVariable> {
        self.nested.exposed.clone()
    }

    fn required_variables(&self) -> Vec<ExposedVariable> {
        self.nested.required.clone()
    }

    fn warm_up(&mut self, ctx: &mut Context<'_>) -> SreResult<()> {
        self.done = 0;
        self.nested.warm_up(ctx)
    }

    fn activate(&mut self, ctx: &mut Context<'_>, input: &Value) -> SreResult<Flow> {
        while self.done < self.times {
            let outcome = match self.nested.activate(ctx, input, ReturnPolicy::Propagate) {
                Ok(Some(outcome)) => outcome,
                Ok(None) => break,
                Err(error) => {
                    self.done = 0;
                    return Err(error);
                }
            };
            let flow = match outcome {
                SeqOutcome::Done(_) => {
                    self.done += 1;
                    continue;
                }
                SeqOutcome::Suspended(wake) => return Ok(Flow::Suspend(wake)),
                SeqOutcome::Returned(_) => Flow::Return,
                SeqOutcome::Stopped(_) => Flow::Stop,
                SeqOutcome::Restarted => Flow::Restart,
            };
            self.done = 0;
            return Ok(flow);
        }
        self.done = 0;
        Ok(Flow::Continue(input.deep_clone()))
    }

    fn clean_up(&mut self, ctx: &mut Context<'_>) {
        self.done = 0;
        self.nested.clean_up(ctx);
    }
}
