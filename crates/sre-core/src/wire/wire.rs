//! Wire
//!
//! A wire owns a shard sequence, its local variables and the registers that
//! carry its input and results. It moves through the [`WireState`] graph:
//! `compose` prepares it, `start` warms it up, every `tick` runs (or resumes)
//! one pass, and `stop` cleans it up into `Ended`.
//!
//! Finished output and error survive `stop` and `reset`; they are cleared by
//! the next successful `compose`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::compose::{compose_sequence, ComposeResult, ExposedSet, ExposedVariable, InstanceData};
use crate::error::{invariant_violation, CompositionError, SreError, SreResult};
use crate::process::ProcessContext;
use crate::shard::{Shard, Wake};
use crate::value::{TypeDescriptor, Value, Var};
use crate::vars::{ExternalVariable, ExternalVariables, VarScope, VariableRegistry, VariableScope};

use super::context::Context;
use super::seq::{ReturnPolicy, SeqOutcome, ShardHandle, ShardSeq};
use super::state::WireState;

static NEXT_WIRE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of whoever drives a wire's ticks
pub type SchedulerId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WireFlags {
    /// Start a new pass after each completed one
    pub looped: bool,
    /// Accept ticks from a scheduler other than the one that started it
    pub allow_unsafe_resume: bool,
    /// No access to process globals
    pub pure: bool,
}

/// Cross-thread request to stop a wire between two shard activations
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Wire {
    id: u64,
    name: String,
    flags: WireFlags,
    input_type: TypeDescriptor,
    shards: ShardSeq,
    variables: VariableScope,
    externals: ExternalVariables,
    compose_result: Option<ComposeResult>,
    state: WireState,
    process: Option<Arc<ProcessContext>>,
    scheduler: Option<SchedulerId>,
    wake_at: Option<Duration>,
    last_tick: Duration,
    root_input: Var,
    previous_output: Var,
    finished_output: Var,
    finished_error: Option<String>,
    stop: StopHandle,
}

#[allow(clippy::too_many_arguments)]
fn context<'a>(
    variables: &'a mut VariableScope,
    externals: &'a ExternalVariables,
    process: &'a ProcessContext,
    name: &'a str,
    input: &'a Value,
    stop: &'a StopHandle,
    pure: bool,
    now: Duration,
) -> Context<'a> {
    let vars = VariableRegistry::new(variables, externals, process.globals(), name, pure);
    Context::new(vars, process, name, input, &stop.0, now)
}

impl Wire {
    pub fn new(name: impl Into<String>) -> Self {
        Wire {
            id: NEXT_WIRE_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            flags: WireFlags::default(),
            input_type: TypeDescriptor::Any,
            shards: ShardSeq::new(),
            variables: VariableScope::new(),
            externals: ExternalVariables::new(),
            compose_result: None,
            state: WireState::Stopped,
            process: None,
            scheduler: None,
            wake_at: None,
            last_tick: Duration::ZERO,
            root_input: Var::default(),
            previous_output: Var::default(),
            finished_output: Var::default(),
            finished_error: None,
            stop: StopHandle::default(),
        }
    }

    pub fn looped(mut self, looped: bool) -> Self {
        self.flags.looped = looped;
        self
    }

    pub fn pure(mut self, pure: bool) -> Self {
        self.flags.pure = pure;
        self
    }

    pub fn allow_unsafe_resume(mut self, allow: bool) -> Self {
        self.flags.allow_unsafe_resume = allow;
        self
    }

    /// Declared type of the value the wire is started with
    pub fn with_input_type(mut self, ty: TypeDescriptor) -> Self {
        self.input_type = ty;
        self
    }

    pub fn with_shards(mut self, shards: impl IntoIterator<Item = Box<dyn Shard>>) -> Self {
        for shard in shards {
            self.shards.push_unchecked(shard);
        }
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> WireFlags {
        self.flags
    }

    pub fn state(&self) -> WireState {
        self.state
    }

    pub fn input_type(&self) -> &TypeDescriptor {
        &self.input_type
    }

    pub fn compose_result(&self) -> Option<&ComposeResult> {
        self.compose_result.as_ref()
    }

    pub fn shards(&self) -> &ShardSeq {
        &self.shards
    }

    pub(crate) fn shards_mut(&mut self) -> &mut ShardSeq {
        &mut self.shards
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Output of the last completed pass
    pub fn previous_output(&self) -> &Value {
        self.previous_output.get()
    }

    pub fn finished_output(&self) -> &Value {
        self.finished_output.get()
    }

    pub fn finished_error(&self) -> Option<&str> {
        self.finished_error.as_deref()
    }

    /// Current value of a wire-local variable
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.value_of(name)
    }

    /// Scheduler time the wire waits for, if suspended on a deadline
    pub fn next_wake(&self) -> Option<Duration> {
        self.wake_at
    }

    /// Whether a tick at `now` would run the wire
    pub fn is_due(&self, now: Duration) -> bool {
        matches!(self.state, WireState::Iterating | WireState::IterationEnded)
            && self.wake_at.map_or(true, |at| at <= now)
    }

    fn ensure_editable(&self) -> SreResult<()> {
        match self.state {
            WireState::Stopped | WireState::Ended | WireState::Prepared => Ok(()),
            _ => Err(SreError::WireBusy(self.name.clone())),
        }
    }

    /// Append a shard; the wire has to be composed again afterwards
    pub fn add_shard(&mut self, shard: Box<dyn Shard>) -> SreResult<ShardHandle> {
        self.ensure_editable()?;
        let handle = self.shards.push(shard)?;
        self.invalidate();
        Ok(handle)
    }

    pub fn remove_shard(&mut self, handle: ShardHandle) -> SreResult<Box<dyn Shard>> {
        self.ensure_editable()?;
        let shard = self.shards.remove(handle)?;
        self.invalidate();
        Ok(shard)
    }

    /// Register a host-owned variable; shadows locals and globals of the same name
    pub fn add_external_variable(
        &mut self,
        name: impl Into<String>,
        var: ExternalVariable,
    ) -> SreResult<()> {
        self.ensure_editable()?;
        self.externals.insert(name.into(), var);
        self.invalidate();
        Ok(())
    }

    pub fn remove_external_variable(&mut self, name: &str) -> SreResult<Option<ExternalVariable>> {
        self.ensure_editable()?;
        let removed = self.externals.remove(name);
        self.invalidate();
        Ok(removed)
    }

    fn invalidate(&mut self) {
        self.compose_result = None;
        if self.state == WireState::Prepared {
            self.set_state(WireState::Stopped);
        }
    }

    fn set_state(&mut self, next: WireState) {
        tracing::debug!(wire = %self.name, from = ?self.state, to = ?next, "wire transition");
        self.state = next;
    }

    fn transition(&mut self, next: WireState) -> SreResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(SreError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        self.set_state(next);
        Ok(())
    }

    fn ambient_scope(&self, process: &ProcessContext) -> ExposedSet {
        let mut ambient = ExposedSet::new();
        if !self.flags.pure {
            for (name, ty) in process.global_types() {
                ambient.insert(ExposedVariable::new(name, ty).mutable().scoped(VarScope::Global));
            }
        }
        for (name, var) in &self.externals {
            ambient.insert(
                ExposedVariable::new(name.clone(), var.type_descriptor().clone())
                    .mutable()
                    .scoped(VarScope::External),
            );
        }
        ambient
    }

    /// Compose, logging advisories
    pub fn compose(&mut self, process: &Arc<ProcessContext>) -> SreResult<&ComposeResult> {
        self.compose_with(process, &mut |_| {})
    }

    /// Compose, handing advisories to `report`
    pub fn compose_with(
        &mut self,
        process: &Arc<ProcessContext>,
        report: &mut dyn FnMut(&CompositionError),
    ) -> SreResult<&ComposeResult> {
        if self.state != WireState::Stopped {
            return Err(SreError::IllegalTransition {
                from: self.state,
                to: WireState::Prepared,
            });
        }
        let ambient = self.ambient_scope(process);
        let mut data = InstanceData {
            input_type: &self.input_type,
            shared: &ambient,
            wire_name: &self.name,
            wire_input_type: &self.input_type,
            config: process.config(),
            pure: self.flags.pure,
            report,
        };
        let result = match compose_sequence(&mut self.shards, &mut data) {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!(wire = %self.name, %error, "composition failed");
                return Err(error.into());
            }
        };
        self.finished_output.destroy();
        self.finished_error = None;
        self.process = Some(process.clone());
        self.transition(WireState::Prepared)?;
        Ok(self.compose_result.insert(result))
    }

    /// Warm up every shard and enter `Iterating`
    pub fn start(&mut self, input: impl Into<Var>, scheduler: SchedulerId) -> SreResult<()> {
        self.transition(WireState::Starting)?;
        let Some(process) = self.process.clone() else {
            invariant_violation("prepared wire without a process context");
        };
        self.root_input = input.into();
        self.previous_output.destroy();
        self.scheduler = Some(scheduler);
        self.wake_at = None;
        self.stop.clear();

        if let Err(error) = self.shards.claim(&self.name) {
            return self.fail_start(error);
        }
        let warmed = {
            let mut ctx = context(
                &mut self.variables,
                &self.externals,
                &process,
                &self.name,
                self.root_input.get(),
                &self.stop,
                self.flags.pure,
                self.last_tick,
            );
            self.shards.warm_up(&mut ctx)
        };
        if let Err(error) = warmed {
            self.variables.release_all();
            self.shards.unclaim();
            return self.fail_start(error);
        }
        self.transition(WireState::Iterating)
    }

    fn fail_start(&mut self, error: SreError) -> SreResult<()> {
        tracing::warn!(wire = %self.name, %error, "wire failed to start");
        self.finished_error = Some(error.to_string());
        self.transition(WireState::Failed)?;
        Err(error)
    }

    /// Run, or resume, one pass of the sequence.
    ///
    /// A wire suspended on a future deadline is left untouched. Returns the
    /// state after the tick.
    pub fn tick(&mut self, now: Duration, scheduler: SchedulerId) -> SreResult<WireState> {
        match self.state {
            WireState::Iterating | WireState::IterationEnded => {}
            state => {
                return Err(SreError::NotIterating {
                    wire: self.name.clone(),
                    state,
                })
            }
        }
        if let Some(owner) = self.scheduler {
            if owner != scheduler && !self.flags.allow_unsafe_resume {
                return Err(SreError::ResumeDenied {
                    wire: self.name.clone(),
                    owner,
                    caller: scheduler,
                });
            }
        }
        if !self.is_due(now) {
            return Ok(self.state);
        }
        if self.state == WireState::IterationEnded {
            self.transition(WireState::Iterating)?;
        }
        self.wake_at = None;
        self.last_tick = now;

        let Some(process) = self.process.clone() else {
            invariant_violation("running wire without a process context");
        };
        let outcome = {
            let mut ctx = context(
                &mut self.variables,
                &self.externals,
                &process,
                &self.name,
                self.root_input.get(),
                &self.stop,
                self.flags.pure,
                now,
            );
            self.shards
                .activate(&mut ctx, self.root_input.get(), ReturnPolicy::Propagate)
        };

        match outcome {
            Ok(SeqOutcome::Done(output)) | Ok(SeqOutcome::Returned(output)) => {
                self.previous_output.set(output);
                self.transition(WireState::IterationEnded)?;
                if !self.flags.looped {
                    self.finish(None)?;
                }
            }
            Ok(SeqOutcome::Stopped(output)) => self.finish(Some(output))?,
            Ok(SeqOutcome::Restarted) => {
                tracing::debug!(wire = %self.name, "restart requested");
                self.transition(WireState::IterationEnded)?;
            }
            Ok(SeqOutcome::Suspended(wake)) => {
                self.wake_at = match wake {
                    Wake::Now => None,
                    Wake::At(at) => Some(at),
                };
                tracing::trace!(wire = %self.name, wake = ?wake, "suspended");
            }
            Err(error) => {
                tracing::warn!(wire = %self.name, %error, "wire failed");
                self.finished_error = Some(error.to_string());
                self.transition(WireState::Failed)?;
            }
        }
        Ok(self.state)
    }

    /// Clean up and enter `Ended`, keeping `output` (or the last pass output)
    /// as the finished output
    fn finish(&mut self, output: Option<Value>) -> SreResult<()> {
        match output {
            Some(output) => self.finished_output.set(output),
            None => self.finished_output.assign(self.previous_output.get()),
        }
        self.clean_up();
        self.transition(WireState::Ended)
    }

    fn clean_up(&mut self) {
        if let Some(process) = self.process.clone() {
            let mut ctx = context(
                &mut self.variables,
                &self.externals,
                &process,
                &self.name,
                self.root_input.get(),
                &self.stop,
                self.flags.pure,
                self.last_tick,
            );
            self.shards.clean_up(&mut ctx);
        }
        self.variables.release_all();
        self.shards.unclaim();
        self.root_input.destroy();
        self.scheduler = None;
        self.wake_at = None;
    }

    /// Stop the wire: cleans up a started wire into `Ended`, un-prepares a
    /// prepared one. Idle wires are left alone.
    pub fn stop(&mut self) -> SreResult<()> {
        match self.state {
            WireState::Stopped | WireState::Ended => Ok(()),
            WireState::Prepared => self.transition(WireState::Stopped),
            WireState::Failed => {
                self.clean_up();
                self.transition(WireState::Ended)
            }
            WireState::Starting => {
                self.transition(WireState::Failed)?;
                self.clean_up();
                self.transition(WireState::Ended)
            }
            WireState::Iterating | WireState::IterationEnded => self.finish(None),
        }
    }

    /// `Ended` back to `Stopped`, ready to be composed again
    pub fn reset(&mut self) -> SreResult<()> {
        self.transition(WireState::Stopped)?;
        self.compose_result = None;
        Ok(())
    }
}

impl Drop for Wire {
    fn drop(&mut self) {
        if self.state.is_running() || self.state == WireState::Failed {
            self.clean_up();
        }
    }
}

impl fmt::Debug for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wire")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("flags", &self.flags)
            .field("state", &self.state)
            .field("shards", &self.shards.names())
            .finish_non_exhaustive()
    }
}

/// Shared handle to a wire, the payload of `Value::Wire`
#[derive(Clone)]
pub struct WireHandle {
    id: u64,
    inner: Arc<Mutex<Wire>>,
}

impl WireHandle {
    pub fn new(wire: Wire) -> Self {
        WireHandle {
            id: wire.id(),
            inner: Arc::new(Mutex::new(wire)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn lock(&self) -> MutexGuard<'_, Wire> {
        self.inner.lock()
    }

    pub fn try_lock(&self) -> Option<MutexGuard<'_, Wire>> {
        self.inner.try_lock()
    }

    pub fn same_wire(&self, other: &WireHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live handles to this wire
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for WireHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WireHandle({})", self.id)
    }
}
