//! Activation context
//!
//! Handed to shards during warm-up, activation and clean-up. It borrows the
//! running wire's variable scope and the process context for the duration of
//! one call into the sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::SreConfig;
use crate::error::{SreError, SreResult};
use crate::process::ProcessContext;
use crate::value::Value;
use crate::vars::{VarRef, VariableRegistry};

pub struct Context<'a> {
    vars: VariableRegistry<'a>,
    process: &'a ProcessContext,
    wire_name: &'a str,
    wire_input: &'a Value,
    stop: &'a AtomicBool,
    now: Duration,
    depth: usize,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        vars: VariableRegistry<'a>,
        process: &'a ProcessContext,
        wire_name: &'a str,
        wire_input: &'a Value,
        stop: &'a AtomicBool,
        now: Duration,
    ) -> Self {
        Context {
            vars,
            process,
            wire_name,
            wire_input,
            stop,
            now,
            depth: 0,
        }
    }

    pub fn process(&self) -> &ProcessContext {
        self.process
    }

    pub fn config(&self) -> &SreConfig {
        self.process.config()
    }

    pub fn wire_name(&self) -> &str {
        self.wire_name
    }

    /// The input the wire was started with
    pub fn wire_input(&self) -> &Value {
        self.wire_input
    }

    /// Scheduler time of the current tick
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub fn variables(&mut self) -> &mut VariableRegistry<'a> {
        &mut self.vars
    }

    pub fn reference_variable(&mut self, name: &str) -> VarRef {
        self.vars.reference(name)
    }

    pub fn reference_global(&mut self, name: &str) -> SreResult<VarRef> {
        self.vars.reference_global(name)
    }

    pub fn release_variable(&mut self, var: VarRef) {
        self.vars.release(var)
    }

    pub fn read_variable<R>(&self, var: &VarRef, f: impl FnOnce(&Value) -> R) -> R {
        self.vars.read(var, f)
    }

    pub fn assign_variable(&mut self, var: &VarRef, value: &Value) {
        self.vars.assign(var, value)
    }

    pub fn with_variable_mut<R>(&mut self, var: &VarRef, f: impl FnOnce(&mut Value) -> R) -> R {
        self.vars.with_mut(var, f)
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enter a nested sequence, failing past the configured depth
    pub fn enter_nested(&mut self) -> SreResult<()> {
        let limit = self.process.config().max_nesting_depth;
        if self.depth >= limit {
            return Err(SreError::NestingTooDeep(limit));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}
