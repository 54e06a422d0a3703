use std::sync::Arc;
use std::time::Duration;

use sre_core::shard::builtin::{
    Const, Fail, Get, Input, MathAdd, Pass, Pause, Repeat, Restart, Set, Stop, Sub, Update,
};
use sre_core::{
    ExternalVariable, ProcessContext, Shard, SreConfig, SreError, TypeDescriptor, Value, Var, Wire,
    WireHandle, WireState,
};

fn boxed(shard: impl Shard + 'static) -> Box<dyn Shard> {
    Box::new(shard)
}

fn nested(shards: Vec<Box<dyn Shard>>) -> WireHandle {
    WireHandle::new(Wire::new("inner").with_shards(shards))
}

fn prepared(process: &Arc<ProcessContext>, wire: &mut Wire) {
    wire.compose(process).expect("compose failed");
}

// A Repeat whose body yields every run: the wire-local counter must keep
// its value across every suspension and the repeat count must survive too.
#[test]
fn suspension_preserves_locals_and_repeat_progress() {
    let process = ProcessContext::init(SreConfig::new());
    let body = nested(vec![
        boxed(Get::new("counter")),
        boxed(MathAdd::new(Value::Int(1))),
        boxed(Update::new("counter")),
        boxed(Pause::new(0.0)),
    ]);
    let mut wire = Wire::new("counting").with_shards([
        boxed(Const::new(Value::Int(0))),
        boxed(Set::new("counter")),
        boxed(Repeat::new(body, 3)),
        boxed(Get::new("counter")),
    ]);
    prepared(&process, &mut wire);
    wire.start(Value::None, 7).expect("start failed");

    for expected in 1..=3 {
        let state = wire.tick(Duration::ZERO, 7).expect("tick failed");
        assert_eq!(state, WireState::Iterating, "run {expected} should suspend");
        assert!(wire.shards().is_suspended());
        assert_eq!(wire.variable("counter"), Some(&Value::Int(expected)));
    }

    assert_eq!(wire.tick(Duration::ZERO, 7).expect("tick failed"), WireState::Ended);
    assert_eq!(wire.finished_output(), &Value::Int(3));
    // locals are released once the wire ends
    assert_eq!(wire.variable("counter"), None);
}

#[test]
fn timed_pause_waits_for_its_deadline() {
    let process = ProcessContext::init(SreConfig::new());
    let mut wire = Wire::new("sleeper").with_shards([
        boxed(Pause::new(1.0)),
        boxed(Const::new(Value::Int(7))),
    ]);
    prepared(&process, &mut wire);
    wire.start(Value::None, 1).expect("start failed");

    assert_eq!(wire.tick(Duration::ZERO, 1).expect("tick failed"), WireState::Iterating);
    assert_eq!(wire.next_wake(), Some(Duration::from_secs(1)));
    assert!(!wire.is_due(Duration::from_millis(500)));

    assert_eq!(
        wire.tick(Duration::from_millis(500), 1).expect("tick failed"),
        WireState::Iterating
    );
    assert!(wire.finished_output().is_none());

    assert_eq!(wire.tick(Duration::from_secs(1), 1).expect("tick failed"), WireState::Ended);
    assert_eq!(wire.finished_output(), &Value::Int(7));
}

#[test]
fn unrepresentable_pauses_fail_instead_of_panicking() {
    let mut pause = Pause::default();
    assert!(matches!(
        pause.set_param(0, &Value::Float(1e20)),
        Err(SreError::InvalidParam { param: "Time", .. })
    ));
    pause.set_param(0, &Value::Float(2.5)).expect("set failed");

    let process = ProcessContext::init(SreConfig::new());
    let mut wire = Wire::new("far-future").with_shards([boxed(Pause::new(1e20))]);
    prepared(&process, &mut wire);
    wire.start(Value::None, 1).expect("start failed");
    assert_eq!(wire.tick(Duration::ZERO, 1).expect("tick failed"), WireState::Failed);
    assert!(wire.finished_error().is_some_and(|e| e.contains("cannot pause")));

    // a representable wait past the end of the clock
    let mut wire = Wire::new("clock-end").with_shards([boxed(Pause::new(1.0))]);
    prepared(&process, &mut wire);
    wire.start(Value::None, 1).expect("start failed");
    assert_eq!(wire.tick(Duration::MAX, 1).expect("tick failed"), WireState::Failed);
}

#[test]
fn failing_wire_keeps_its_error_until_stopped() {
    let process = ProcessContext::init(SreConfig::new());
    let mut wire = Wire::new("broken").with_shards([
        boxed(Const::new(Value::Int(1))),
        boxed(Fail::new("boom")),
        boxed(Pass),
    ]);
    prepared(&process, &mut wire);
    wire.start(Value::None, 1).expect("start failed");

    assert_eq!(wire.tick(Duration::ZERO, 1).expect("tick failed"), WireState::Failed);
    assert_eq!(wire.finished_error(), Some("boom"));
    assert!(matches!(
        wire.tick(Duration::ZERO, 1),
        Err(SreError::NotIterating { state: WireState::Failed, .. })
    ));

    wire.stop().expect("stop failed");
    assert_eq!(wire.state(), WireState::Ended);
    assert_eq!(wire.finished_error(), Some("boom"));

    wire.reset().expect("reset failed");
    prepared(&process, &mut wire);
    assert!(wire.finished_error().is_none());
}

#[test]
fn restart_begins_a_fresh_iteration() {
    let process = ProcessContext::init(SreConfig::new());
    let mut wire = Wire::new("restarting").with_shards([boxed(Input), boxed(Restart)]);
    prepared(&process, &mut wire);
    wire.start(Value::Int(4), 1).expect("start failed");

    for _ in 0..3 {
        assert_eq!(wire.tick(Duration::ZERO, 1).expect("tick failed"), WireState::IterationEnded);
    }
    wire.stop().expect("stop failed");
    assert_eq!(wire.state(), WireState::Ended);
}

#[test]
fn stop_request_ends_the_wire_at_the_next_step() {
    let process = ProcessContext::init(SreConfig::new());
    let mut wire = Wire::new("stoppable")
        .looped(true)
        .with_shards([boxed(Pause::new(0.0)), boxed(Const::new(Value::Int(2)))]);
    prepared(&process, &mut wire);
    wire.start(Value::Int(1), 1).expect("start failed");
    assert_eq!(wire.tick(Duration::ZERO, 1).expect("tick failed"), WireState::Iterating);

    let stop = wire.stop_handle();
    stop.request();
    assert!(stop.is_requested());
    assert_eq!(wire.tick(Duration::ZERO, 1).expect("tick failed"), WireState::Ended);
    // the step in flight never ran
    assert_eq!(wire.finished_output(), &Value::Int(1));
}

#[test]
fn resuming_from_another_scheduler_is_denied() {
    let process = ProcessContext::init(SreConfig::new());
    let mut wire = Wire::new("pinned").looped(true).with_shards([boxed(Pass)]);
    prepared(&process, &mut wire);
    wire.start(Value::None, 1).expect("start failed");
    assert!(matches!(
        wire.tick(Duration::ZERO, 2),
        Err(SreError::ResumeDenied { owner: 1, caller: 2, .. })
    ));
    assert_eq!(wire.state(), WireState::Iterating);

    let mut roaming = Wire::new("roaming")
        .looped(true)
        .allow_unsafe_resume(true)
        .with_shards([boxed(Pass)]);
    prepared(&process, &mut roaming);
    roaming.start(Value::None, 1).expect("start failed");
    assert_eq!(
        roaming.tick(Duration::ZERO, 2).expect("tick failed"),
        WireState::IterationEnded
    );
}

#[test]
fn external_variables_are_shared_with_the_host() {
    let process = ProcessContext::init(SreConfig::new());
    let ext = ExternalVariable::new(Value::Int(10), TypeDescriptor::Int);
    let mut wire = Wire::new("host-bound").with_shards([
        boxed(Get::new("ext")),
        boxed(MathAdd::new(Value::Int(5))),
        boxed(Update::new("ext")),
    ]);
    wire.add_external_variable("ext", ext.clone())
        .expect("add external failed");

    let result = wire.compose(&process).expect("compose failed");
    assert!(result.required.contains("ext"));
    wire.start(Value::None, 1).expect("start failed");
    assert_eq!(wire.tick(Duration::ZERO, 1).expect("tick failed"), WireState::Ended);

    // the wire's teardown never destroys host-owned values
    assert_eq!(ext.snapshot(), Value::Int(15));
    assert_eq!(wire.variable("ext"), None);
}

#[test]
fn pure_wires_cannot_see_globals() {
    let process = ProcessContext::init(SreConfig::new());
    process.set_global("g", Value::Int(1));

    let mut impure = Wire::new("impure").with_shards([boxed(Get::new("g"))]);
    prepared(&process, &mut impure);
    impure.start(Value::None, 1).expect("start failed");
    impure.tick(Duration::ZERO, 1).expect("tick failed");
    assert_eq!(impure.finished_output(), &Value::Int(1));

    let mut pure = Wire::new("pure").pure(true).with_shards([boxed(Get::new("g"))]);
    assert!(matches!(pure.compose(&process), Err(SreError::Composition(_))));

    let mut writer = Wire::new("pure-writer")
        .pure(true)
        .with_shards([boxed(Const::new(Value::Int(2))), boxed(Set::new("g").global())]);
    assert!(writer.compose(&process).is_err());
    assert_eq!(process.global("g"), Some(Value::Int(1)));
}

#[test]
fn globals_outlive_the_wire_that_set_them() {
    let process = ProcessContext::init(SreConfig::new());
    let mut wire = Wire::new("publisher")
        .with_shards([boxed(Const::new(Value::from("hello"))), boxed(Set::new("greeting").global())]);
    prepared(&process, &mut wire);
    wire.start(Value::None, 1).expect("start failed");
    wire.tick(Duration::ZERO, 1).expect("tick failed");
    assert_eq!(wire.state(), WireState::Ended);
    assert_eq!(process.global("greeting"), Some(Value::from("hello")));

    let mut reader = Wire::new("reader").with_shards([boxed(Get::new("greeting"))]);
    prepared(&process, &mut reader);
    reader.start(Value::None, 1).expect("start failed");
    reader.tick(Duration::ZERO, 1).expect("tick failed");
    assert_eq!(reader.finished_output(), &Value::from("hello"));

    process.teardown();
    assert_eq!(process.global("greeting"), None);
}

#[test]
fn foreign_input_is_never_destroyed_by_the_wire() {
    let process = ProcessContext::init(SreConfig::new());
    let payload = Arc::new(Value::from("borrowed"));
    let mut wire = Wire::new("viewer").with_shards([boxed(Pass)]);
    prepared(&process, &mut wire);
    wire.start(Var::foreign(payload.clone()), 1).expect("start failed");
    assert_eq!(Arc::strong_count(&payload), 2);

    wire.tick(Duration::ZERO, 1).expect("tick failed");
    assert_eq!(wire.state(), WireState::Ended);
    assert_eq!(Arc::strong_count(&payload), 1);
    assert_eq!(*payload, Value::from("borrowed"));
    assert_eq!(wire.finished_output(), &Value::from("borrowed"));
}

#[test]
fn a_nested_sequence_runs_under_one_owner_at_a_time() {
    let process = ProcessContext::init(SreConfig::new());
    let shared = nested(vec![boxed(Pause::new(0.0))]);
    let mut first = Wire::new("first").with_shards([boxed(Sub::new(shared.clone()))]);
    let mut second = Wire::new("second").with_shards([boxed(Sub::new(shared.clone()))]);
    prepared(&process, &mut first);
    prepared(&process, &mut second);

    first.start(Value::None, 1).expect("start failed");
    assert_eq!(shared.lock().shards().owner(), Some("first"));
    match second.start(Value::None, 1) {
        Err(SreError::WarmUp { shard, reason }) => {
            assert_eq!(shard, "Sub");
            assert!(reason.contains("first"));
        }
        other => panic!("expected a warm-up failure, got {other:?}"),
    }
    assert_eq!(second.state(), WireState::Failed);

    first.stop().expect("stop failed");
    assert_eq!(shared.lock().shards().owner(), None);
    assert_eq!(shared.handle_count(), 3);
}

#[test]
fn sub_swallows_return_while_repeat_forwards_it() {
    let process = ProcessContext::init(SreConfig::new());
    let returning = || nested(vec![boxed(sre_core::shard::builtin::Return)]);

    let mut sub = Wire::new("sub").with_shards([
        boxed(Const::new(Value::Int(1))),
        boxed(Sub::new(returning())),
        boxed(Const::new(Value::Int(2))),
    ]);
    prepared(&process, &mut sub);
    sub.start(Value::None, 1).expect("start failed");
    sub.tick(Duration::ZERO, 1).expect("tick failed");
    assert_eq!(sub.finished_output(), &Value::Int(2));

    let mut repeat = Wire::new("repeat").with_shards([
        boxed(Const::new(Value::Int(1))),
        boxed(Repeat::new(returning(), 2)),
        boxed(Const::new(Value::Int(2))),
    ]);
    prepared(&process, &mut repeat);
    repeat.start(Value::None, 1).expect("start failed");
    repeat.tick(Duration::ZERO, 1).expect("tick failed");
    assert_eq!(repeat.finished_output(), &Value::Int(1));
}

#[test]
fn nesting_deeper_than_configured_fails_the_wire() {
    let mut config = SreConfig::new();
    config.max_nesting_depth = 1;
    let process = ProcessContext::init(config);
    let inner = nested(vec![boxed(Pass)]);
    let middle = nested(vec![boxed(Sub::new(inner))]);
    let mut wire = Wire::new("deep").with_shards([boxed(Sub::new(middle))]);
    prepared(&process, &mut wire);
    wire.start(Value::None, 1).expect("start failed");

    assert_eq!(wire.tick(Duration::ZERO, 1).expect("tick failed"), WireState::Failed);
    assert!(wire
        .finished_error()
        .is_some_and(|e| e.contains("nesting depth")));
}

#[test]
fn stop_inside_a_nested_sequence_ends_the_outer_wire() {
    let process = ProcessContext::init(SreConfig::new());
    let mut wire = Wire::new("outer").looped(true).with_shards([
        boxed(Const::new(Value::Int(3))),
        boxed(Sub::new(nested(vec![boxed(Stop)]))),
        boxed(Const::new(Value::Int(4))),
    ]);
    prepared(&process, &mut wire);
    wire.start(Value::None, 1).expect("start failed");
    assert_eq!(wire.tick(Duration::ZERO, 1).expect("tick failed"), WireState::Ended);
    assert_eq!(wire.finished_output(), &Value::Int(3));
}
