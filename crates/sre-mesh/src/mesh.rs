//! Mesh: cooperative scheduler for a set of wires.
//!
//! Every `tick` resumes each due wire exactly once, in scheduling order,
//! on the caller's thread. Ended wires leave the mesh; failed ones are
//! handed to the [`FailurePolicy`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sre_core::wire::SchedulerId;
use sre_core::{DeepClone, ProcessContext, Value, Wire, WireHandle, WireState};

use crate::clock::{Clock, SystemClock};
use crate::error::{MeshError, MeshResult};
use crate::policy::{Decision, FailureLog, FailurePolicy, FailureRecord};

static NEXT_SCHEDULER: AtomicU64 = AtomicU64::new(1);

struct Entry {
    handle: WireHandle,
    /// Kept for restarts
    input: Value,
    restarts: u32,
}

enum Step {
    Waiting,
    Ran,
    Finished,
    Failed(String),
}

pub struct Mesh<C: Clock = SystemClock> {
    id: SchedulerId,
    process: Arc<ProcessContext>,
    clock: C,
    policy: FailurePolicy,
    failures: FailureLog,
    entries: Vec<Entry>,
    ticks: u64,
}

impl Mesh<SystemClock> {
    pub fn new(process: Arc<ProcessContext>) -> Self {
        Self::with_clock(process, SystemClock::new())
    }
}

impl<C: Clock> Mesh<C> {
    pub fn with_clock(process: Arc<ProcessContext>, clock: C) -> Self {
        Mesh {
            id: NEXT_SCHEDULER.fetch_add(1, Ordering::Relaxed),
            process,
            clock,
            policy: FailurePolicy::default(),
            failures: FailureLog::new(),
            entries: Vec::new(),
            ticks: 0,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Scheduler id the mesh starts and resumes its wires with
    pub fn id(&self) -> SchedulerId {
        self.id
    }

    pub fn process(&self) -> &Arc<ProcessContext> {
        &self.process
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn failures(&self) -> &FailureLog {
        &self.failures
    }

    /// Number of wires still owned by the mesh
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_idle(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Compose and start `wire` on `input`; the returned handle stays valid
    /// after the wire leaves the mesh.
    pub fn schedule(&mut self, wire: Wire, input: Value) -> MeshResult<WireHandle> {
        let handle = WireHandle::new(wire);
        self.schedule_handle(handle.clone(), input)?;
        Ok(handle)
    }

    /// Schedule a wire that is shared with the host. A wire that is already
    /// prepared is started without composing it again.
    pub fn schedule_handle(&mut self, handle: WireHandle, input: Value) -> MeshResult<()> {
        {
            let mut wire = handle.lock();
            if wire.state() == WireState::Stopped {
                wire.compose(&self.process)?;
            }
            if let Err(error) = wire.start(input.deep_clone(), self.id) {
                if wire.state() == WireState::Failed {
                    wire.stop()?;
                }
                return Err(error.into());
            }
            tracing::info!(wire = %wire.name(), mesh = self.id, "wire scheduled");
        }
        self.entries.push(Entry {
            handle,
            input,
            restarts: 0,
        });
        Ok(())
    }

    /// Stop one wire and take it off the mesh
    pub fn unschedule(&mut self, handle: &WireHandle) -> MeshResult<()> {
        let index = self
            .entries
            .iter()
            .position(|e| e.handle.same_wire(handle))
            .ok_or(MeshError::NotScheduled(handle.id()))?;
        let entry = self.entries.remove(index);
        entry.handle.lock().stop()?;
        Ok(())
    }

    /// Resume every due wire once. Returns how many wires ran.
    pub fn tick(&mut self) -> MeshResult<usize> {
        let now = self.clock.now();
        self.ticks += 1;
        let mut ran = 0;
        let mut index = 0;
        while index < self.entries.len() {
            let step = {
                let mut wire = self.entries[index].handle.lock();
                match wire.state() {
                    WireState::Iterating | WireState::IterationEnded if wire.is_due(now) => {
                        ran += 1;
                        match wire.tick(now, self.id)? {
                            WireState::Ended => Step::Finished,
                            WireState::Failed => Step::Failed(failure_message(&wire)),
                            _ => Step::Ran,
                        }
                    }
                    WireState::Iterating | WireState::IterationEnded => Step::Waiting,
                    WireState::Failed => Step::Failed(failure_message(&wire)),
                    // stopped from outside the mesh
                    _ => Step::Finished,
                }
            };
            match step {
                Step::Waiting | Step::Ran => index += 1,
                Step::Finished => {
                    let entry = self.entries.remove(index);
                    tracing::debug!(wire = entry.handle.id(), "wire left the mesh");
                }
                Step::Failed(error) => {
                    if self.on_failure(index, error)? {
                        index += 1;
                    }
                }
            }
        }
        tracing::trace!(mesh = self.id, ran, "tick");
        Ok(ran)
    }

    /// Apply the failure policy to the entry at `index`; returns whether the
    /// wire stays on the mesh.
    fn on_failure(&mut self, index: usize, error: String) -> MeshResult<bool> {
        let entry = &mut self.entries[index];
        let restarts = entry.restarts;
        let decision = self.policy.decide(restarts);
        let name = {
            let mut wire = entry.handle.lock();
            let name = wire.name().to_string();
            tracing::warn!(wire = %name, %error, ?decision, "wire failed");
            wire.stop()?;
            if decision == Decision::Restart {
                entry.restarts += 1;
                wire.reset()?;
                wire.compose(&self.process)?;
                // a wire failing to start again is seen as failed next tick
                if let Err(error) = wire.start(entry.input.deep_clone(), self.id) {
                    tracing::warn!(wire = %name, %error, "restart failed");
                }
            }
            name
        };
        self.failures.record(FailureRecord {
            wire: name.clone(),
            error: error.clone(),
            restarts,
            decision,
        });
        match decision {
            Decision::Restart => Ok(true),
            Decision::Drop => {
                self.entries.remove(index);
                Ok(false)
            }
            Decision::Propagate => {
                self.entries.remove(index);
                Err(MeshError::WireFailed { wire: name, error })
            }
        }
    }

    /// Tick until no wire is left, sleeping on the clock while nothing is due.
    ///
    /// Never returns for a looped wire that does not stop itself, unless the
    /// configured `max_iterations` cap is hit.
    pub fn run_until_idle(&mut self) -> MeshResult<u64> {
        let config = self.process.config();
        let limit = config.max_iterations;
        let interval = Duration::from_millis(config.tick_interval_ms);
        let first = self.ticks;
        while !self.is_idle() {
            if limit != 0 && self.ticks >= limit {
                return Err(MeshError::IterationLimit(limit));
            }
            if self.tick()? == 0 {
                self.clock.sleep(self.idle_wait(interval));
            }
        }
        Ok(self.ticks - first)
    }

    fn idle_wait(&self, interval: Duration) -> Duration {
        let now = self.clock.now();
        let next = self
            .entries
            .iter()
            .filter_map(|e| e.handle.lock().next_wake())
            .map(|at| at.saturating_sub(now))
            .min();
        match next {
            Some(wait) if interval.is_zero() => wait,
            Some(wait) => wait.min(interval),
            None => interval,
        }
    }

    /// Stop every wire and release the process globals
    pub fn terminate(&mut self) -> MeshResult<()> {
        let mut first_error = None;
        for entry in self.entries.drain(..) {
            if let Err(error) = entry.handle.lock().stop() {
                first_error.get_or_insert(error);
            }
        }
        self.process.teardown();
        tracing::info!(mesh = self.id, ticks = self.ticks, "mesh terminated");
        match first_error {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

fn failure_message(wire: &Wire) -> String {
    wire.finished_error().unwrap_or("unknown failure").to_string()
}
