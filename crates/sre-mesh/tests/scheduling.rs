use std::sync::Arc;
use std::time::Duration;

use sre_core::shard::builtin::{Const, Fail, Get, MathAdd, Pass, Pause, Set, Stop};
use sre_core::{ProcessContext, Shard, SreConfig, Value, Wire, WireState};
use sre_mesh::{Clock, Decision, FailurePolicy, ManualClock, Mesh, MeshError};

fn boxed(shard: impl Shard + 'static) -> Box<dyn Shard> {
    Box::new(shard)
}

fn manual_mesh(config: SreConfig) -> (Mesh<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let mesh = Mesh::with_clock(ProcessContext::init(config), clock.clone());
    (mesh, clock)
}

#[test]
fn wires_are_interleaved_and_leave_when_done() {
    let (mut mesh, _clock) = manual_mesh(SreConfig::new());
    let quick = mesh
        .schedule(
            Wire::new("quick").with_shards([boxed(Const::new(Value::Int(1)))]),
            Value::None,
        )
        .expect("schedule failed");
    let slow = mesh
        .schedule(
            Wire::new("slow").with_shards([
                boxed(Pause::new(0.0)),
                boxed(Pause::new(0.0)),
                boxed(Const::new(Value::Int(2))),
            ]),
            Value::None,
        )
        .expect("schedule failed");
    assert_eq!(mesh.len(), 2);

    assert_eq!(mesh.tick().expect("tick failed"), 2);
    assert_eq!(quick.lock().state(), WireState::Ended);
    assert_eq!(mesh.len(), 1);

    assert_eq!(mesh.run_until_idle().expect("run failed"), 2);
    assert!(mesh.is_idle());
    assert_eq!(slow.lock().finished_output(), &Value::Int(2));
    assert_eq!(quick.lock().finished_output(), &Value::Int(1));
}

#[test]
fn idle_mesh_sleeps_until_the_next_wake() {
    let mut config = SreConfig::new();
    config.tick_interval_ms = 100;
    let (mut mesh, clock) = manual_mesh(config);
    let sleeper = mesh
        .schedule(
            Wire::new("sleeper").with_shards([boxed(Pause::new(0.25)), boxed(Pass)]),
            Value::Int(5),
        )
        .expect("schedule failed");

    mesh.run_until_idle().expect("run failed");
    // 0.1 + 0.1 + 0.05 of virtual sleep between the two runs
    assert_eq!(clock.now(), Duration::from_millis(250));
    assert_eq!(sleeper.lock().finished_output(), &Value::Int(5));
    assert_eq!(mesh.ticks(), 5);
}

#[test]
fn iteration_cap_stops_runaway_loops() {
    let mut config = SreConfig::new();
    config.max_iterations = 10;
    let (mut mesh, _clock) = manual_mesh(config);
    let forever = mesh
        .schedule(Wire::new("forever").looped(true).with_shards([boxed(Pass)]), Value::None)
        .expect("schedule failed");

    assert!(matches!(mesh.run_until_idle(), Err(MeshError::IterationLimit(10))));
    assert_eq!(mesh.ticks(), 10);
    assert_eq!(forever.lock().state(), WireState::IterationEnded);

    mesh.terminate().expect("terminate failed");
    assert!(mesh.is_idle());
    assert_eq!(forever.lock().state(), WireState::Ended);
}

#[test]
fn looped_wire_stopping_itself_leaves_the_mesh() {
    let (mut mesh, _clock) = manual_mesh(SreConfig::new());
    let wire = mesh
        .schedule(
            Wire::new("once").looped(true).with_shards([boxed(Pass), boxed(Stop)]),
            Value::from("done"),
        )
        .expect("schedule failed");
    assert_eq!(mesh.run_until_idle().expect("run failed"), 1);
    assert_eq!(wire.lock().finished_output(), &Value::from("done"));
}

#[test]
fn log_policy_records_and_drops_failures() {
    let (mut mesh, _clock) = manual_mesh(SreConfig::new());
    let broken = mesh
        .schedule(Wire::new("broken").with_shards([boxed(Fail::new("bad input"))]), Value::None)
        .expect("schedule failed");
    mesh.run_until_idle().expect("run failed");

    let failures = mesh.failures().entries();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].wire, "broken");
    assert_eq!(failures[0].error, "bad input");
    assert_eq!(failures[0].decision, Decision::Drop);

    let wire = broken.lock();
    assert_eq!(wire.state(), WireState::Ended);
    assert_eq!(wire.finished_error(), Some("bad input"));
}

#[test]
fn restart_policy_retries_from_the_original_input() {
    let process = ProcessContext::init(SreConfig::new());
    let mut mesh = Mesh::with_clock(process.clone(), ManualClock::new())
        .with_policy(FailurePolicy::Restart { max_attempts: 2 });
    mesh.schedule(
        Wire::new("flaky").with_shards([
            boxed(Get::new("attempts").with_default(Value::Int(0))),
            boxed(MathAdd::new(Value::Int(1))),
            boxed(Set::new("attempts").global()),
            boxed(Fail::new("still failing")),
        ]),
        Value::Int(1),
    )
    .expect("schedule failed");

    mesh.run_until_idle().expect("run failed");
    let decisions: Vec<_> = mesh.failures().entries().iter().map(|f| f.decision).collect();
    assert_eq!(decisions, vec![Decision::Restart, Decision::Restart, Decision::Drop]);
    assert_eq!(mesh.failures().entries()[2].restarts, 2);
    // globals survive the restarts
    assert_eq!(process.global("attempts"), Some(Value::Int(3)));
}

#[test]
fn propagate_policy_surfaces_the_failure() {
    let (mesh, _clock) = manual_mesh(SreConfig::new());
    let mut mesh = mesh.with_policy(FailurePolicy::Propagate);
    mesh.schedule(Wire::new("fatal").with_shards([boxed(Fail::new("boom"))]), Value::None)
        .expect("schedule failed");
    match mesh.tick() {
        Err(MeshError::WireFailed { wire, error }) => {
            assert_eq!(wire, "fatal");
            assert_eq!(error, "boom");
        }
        other => panic!("expected a propagated failure, got {other:?}"),
    }
    assert!(mesh.is_idle());
}

#[test]
fn terminate_tears_down_globals() {
    let process = ProcessContext::init(SreConfig::new());
    let mut mesh = Mesh::with_clock(Arc::clone(&process), ManualClock::new());
    mesh.schedule(
        Wire::new("publisher")
            .looped(true)
            .with_shards([boxed(Const::new(Value::Int(3))), boxed(Set::new("shared").global())]),
        Value::None,
    )
    .expect("schedule failed");
    mesh.tick().expect("tick failed");
    assert_eq!(process.global("shared"), Some(Value::Int(3)));

    mesh.terminate().expect("terminate failed");
    assert_eq!(process.global("shared"), None);
}

#[test]
fn wires_stopped_by_the_host_are_dropped() {
    let (mut mesh, _clock) = manual_mesh(SreConfig::new());
    let wire = mesh
        .schedule(Wire::new("hosted").looped(true).with_shards([boxed(Pass)]), Value::None)
        .expect("schedule failed");
    mesh.tick().expect("tick failed");

    wire.lock().stop().expect("stop failed");
    assert_eq!(mesh.tick().expect("tick failed"), 0);
    assert!(mesh.is_idle());
    assert!(matches!(mesh.unschedule(&wire), Err(MeshError::NotScheduled(_))));
}

#[test]
fn a_second_mesh_cannot_resume_foreign_wires() {
    let process = ProcessContext::init(SreConfig::new());
    let mut first = Mesh::with_clock(process.clone(), ManualClock::new());
    let mut second = Mesh::with_clock(process, ManualClock::new());
    assert_ne!(first.id(), second.id());

    let wire = first
        .schedule(Wire::new("owned").looped(true).with_shards([boxed(Pass)]), Value::None)
        .expect("schedule failed");
    // already started by the first mesh
    assert!(second.schedule_handle(wire.clone(), Value::None).is_err());
    first.unschedule(&wire).expect("unschedule failed");
    assert_eq!(wire.lock().state(), WireState::Ended);
}
