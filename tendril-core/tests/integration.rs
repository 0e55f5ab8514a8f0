//! Integration Tests for Reactive System
//!
//! These tests verify that observed objects, effects, refs and computed
//! values work together correctly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::json;

use tendril_core::diagnostics::{self, Diagnostic};
use tendril_core::prelude::*;
use tendril_core::reactive::{subscriber_count, ReactiveContext};
use tendril_core::ReactiveError;

/// Route engine logs to the test output; filter with `RUST_LOG`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture(json: serde_json::Value) -> Object {
    Object::from_json(json).expect("fixture is a json object")
}

fn num(value: Value) -> f64 {
    value.as_number().expect("number")
}

fn counter() -> Rc<Cell<usize>> {
    Rc::new(Cell::new(0))
}

fn bump(count: &Cell<usize>) {
    count.set(count.get() + 1);
}

// ----------------------------------------------------------------------------
// Effects
// ----------------------------------------------------------------------------

/// Test that the runner re-runs the body and hands back its result.
#[test]
fn runner_can_be_called_manually() {
    let foo = counter();
    let foo_in = foo.clone();
    let runner = effect(move || {
        bump(&foo_in);
        "foo"
    });
    assert_eq!(foo.get(), 1);

    let result = runner.run();
    assert_eq!(foo.get(), 2);
    assert_eq!(result, Some("foo"));
}

/// Test one re-run per changing write and none per equal write.
#[test]
fn effect_reruns_on_changing_writes_only() {
    let state = reactive(fixture(json!({ "count": 0 })));
    let runs = counter();
    let seen = Rc::new(Cell::new(0.0));

    let (reader, runs_in, seen_in) = (state.clone(), runs.clone(), seen.clone());
    let _runner = effect(move || {
        bump(&runs_in);
        seen_in.set(num(reader.get("count")));
    });
    assert_eq!(runs.get(), 1);

    state.set("count", 1);
    assert_eq!(runs.get(), 2);
    assert_eq!(seen.get(), 1.0);

    state.set("count", 1);
    assert_eq!(runs.get(), 2);

    state.set("count", f64::NAN);
    state.set("count", f64::NAN);
    assert_eq!(runs.get(), 3);
}

/// Test that a scheduler replaces the direct re-run.
#[test]
fn scheduler_is_called_instead_of_run() {
    let dummy = Rc::new(Cell::new(0.0));
    let scheduled = counter();

    let inner = reactive(fixture(json!({ "foo": 1 })));
    let obj = reactive(&inner);
    assert_eq!(obj, inner);

    let (reader, dummy_in, scheduled_in) = (obj.clone(), dummy.clone(), scheduled.clone());
    let runner = effect_with(
        move || dummy_in.set(num(reader.get("foo"))),
        EffectOptions::new().scheduler(move || bump(&scheduled_in)),
    );
    assert_eq!(scheduled.get(), 0);
    assert_eq!(dummy.get(), 1.0);

    obj.set("foo", num(obj.get("foo")) + 1.0);
    assert_eq!(scheduled.get(), 1);
    assert_eq!(dummy.get(), 1.0);

    runner.run();
    assert_eq!(scheduled.get(), 1);
    assert_eq!(dummy.get(), 2.0);
}

/// Test that a stopped effect only runs when called by hand.
#[test]
fn stop_detaches_effect() {
    let obj = reactive(fixture(json!({ "prop": 1 })));
    let dummy = Rc::new(Cell::new(0.0));

    let (reader, dummy_in) = (obj.clone(), dummy.clone());
    let runner = effect(move || dummy_in.set(num(reader.get("prop"))));

    obj.set("prop", 2);
    assert_eq!(dummy.get(), 2.0);

    stop(&runner);
    obj.set("prop", 3);
    assert_eq!(dummy.get(), 2.0);
    obj.set("prop", num(obj.get("prop")) + 1.0);
    assert_eq!(dummy.get(), 2.0);

    runner.run();
    assert_eq!(dummy.get(), 4.0);
    obj.set("prop", num(obj.get("prop")) + 1.0);
    assert_eq!(dummy.get(), 4.0);
    assert_eq!(subscriber_count(obj.raw().id(), "prop"), 0);
}

#[test]
fn on_stop_is_called() {
    let stopped = counter();
    let stopped_in = stopped.clone();
    let runner = effect_with(|| {}, EffectOptions::new().on_stop(move || bump(&stopped_in)));

    stop(&runner);
    assert_eq!(stopped.get(), 1);
    assert!(!runner.effect().is_active());
}

#[test]
fn lazy_effect_waits_for_first_run() {
    let state = reactive(fixture(json!({ "foo": 1 })));
    let runs = counter();

    let (reader, runs_in) = (state.clone(), runs.clone());
    let runner = effect_with(
        move || {
            reader.get("foo");
            bump(&runs_in);
        },
        EffectOptions::new().lazy(true),
    );
    assert_eq!(runs.get(), 0);

    state.set("foo", 2);
    assert_eq!(runs.get(), 0);

    runner.run();
    state.set("foo", 3);
    assert_eq!(runs.get(), 2);
}

/// Test that two effects writing each other's inputs settle.
#[test]
fn avoids_infinite_loops_with_other_effects() {
    init_tracing();
    let nums = reactive(fixture(json!({ "num1": 0, "num2": 1 })));
    let spy1 = counter();
    let spy2 = counter();

    let (n1, s1) = (nums.clone(), spy1.clone());
    let _e1 = effect(move || {
        bump(&s1);
        n1.set("num1", n1.get("num2"));
    });
    let (n2, s2) = (nums.clone(), spy2.clone());
    let _e2 = effect(move || {
        bump(&s2);
        n2.set("num2", n2.get("num1"));
    });

    assert_eq!(nums.get("num1"), 1.0);
    assert_eq!(nums.get("num2"), 1.0);
    assert_eq!((spy1.get(), spy2.get()), (1, 1));

    nums.set("num2", 4);
    assert_eq!(nums.get("num1"), 4.0);
    assert_eq!(nums.get("num2"), 4.0);
    assert_eq!((spy1.get(), spy2.get()), (2, 2));

    nums.set("num1", 10);
    assert_eq!(nums.get("num1"), 10.0);
    assert_eq!(nums.get("num2"), 10.0);
    assert_eq!((spy1.get(), spy2.get()), (3, 3));
}

/// Test that an effect incrementing what it reads runs once per write.
#[test]
fn avoids_implicit_recursion_with_itself() {
    let state = reactive(fixture(json!({ "num": 0 })));
    let spy = counter();

    let (writer, spy_in) = (state.clone(), spy.clone());
    let _runner = effect(move || {
        bump(&spy_in);
        writer.set("num", num(writer.get("num")) + 1.0);
    });
    assert_eq!(state.get("num"), 1.0);
    assert_eq!(spy.get(), 1);

    state.set("num", 4);
    assert_eq!(state.get("num"), 5.0);
    assert_eq!(spy.get(), 2);
}

/// Test that an effect created during a trigger is not run by that trigger.
#[test]
fn effect_subscribed_during_trigger_waits_for_next_one() {
    let state = reactive(fixture(json!({ "num": 0 })));
    let inner_runs = counter();
    let inner: Rc<RefCell<Option<Runner<()>>>> = Rc::new(RefCell::new(None));

    let (reader, inner_runs_in, inner_in) = (state.clone(), inner_runs.clone(), inner.clone());
    let _outer = effect(move || {
        if num(reader.get("num")) > 0.0 && inner_in.borrow().is_none() {
            let (nested_reader, runs) = (reader.clone(), inner_runs_in.clone());
            let runner = effect(move || {
                nested_reader.get("num");
                bump(&runs);
            });
            *inner_in.borrow_mut() = Some(runner);
        }
    });
    assert_eq!(inner_runs.get(), 0);

    // Only the initial run: the trigger that created it snapshotted before
    state.set("num", 1);
    assert_eq!(inner_runs.get(), 1);
    assert_eq!(subscriber_count(state.raw().id(), "num"), 2);

    state.set("num", 2);
    assert_eq!(inner_runs.get(), 2);

    if let Some(runner) = inner.borrow_mut().take() {
        stop(&runner);
    };
}

/// Test that stopping from inside the body takes effect after it returns.
#[test]
fn stop_from_own_body_is_deferred() {
    let state = reactive(fixture(json!({ "num": 0 })));
    let calls = counter();
    let slot: Rc<RefCell<Option<Runner<()>>>> = Rc::new(RefCell::new(None));

    let (reader, calls_in, slot_in) = (state.clone(), calls.clone(), slot.clone());
    let runner = effect(move || {
        if num(reader.get("num")) > 0.0 {
            if let Some(me) = slot_in.borrow().as_ref() {
                stop(me);
            }
            bump(&calls_in);
        }
    });
    *slot.borrow_mut() = Some(runner.clone());

    state.set("num", 1);
    assert_eq!(calls.get(), 1);
    assert!(!runner.effect().is_active());

    state.set("num", 2);
    assert_eq!(calls.get(), 1);

    slot.borrow_mut().take();
}

/// Test that an effect follows branch changes.
#[test]
fn effect_drops_branches_not_taken() {
    let state = reactive(fixture(json!({ "ok": true, "text": "hello" })));
    let runs = counter();

    let (reader, runs_in) = (state.clone(), runs.clone());
    let runner = effect(move || {
        bump(&runs_in);
        if reader.get("ok") == true {
            reader.get("text");
        }
    });
    assert_eq!(runner.effect().dependency_count(), 2);

    state.set("ok", false);
    assert_eq!(runs.get(), 2);
    assert_eq!(runner.effect().dependency_count(), 1);

    state.set("text", "world");
    assert_eq!(runs.get(), 2);
}

/// Test that a panicking body leaves the context usable.
#[test]
fn panic_in_body_restores_tracking_context() {
    init_tracing();
    let state = reactive(fixture(json!({ "fail": false })));
    let (reader, runs) = (state.clone(), counter());
    let runs_in = runs.clone();

    let _runner = effect(move || {
        bump(&runs_in);
        if reader.get("fail") == true {
            panic!("effect failed");
        }
    });

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| state.set("fail", true)));
    assert!(outcome.is_err());
    assert_eq!(ReactiveContext::depth(), 0);

    let observer = counter();
    let (reader, observer_in) = (state.clone(), observer.clone());
    let _other = effect(move || {
        reader.get("fail");
        bump(&observer_in);
    });
    assert_eq!(observer.get(), 1);
}

#[test]
fn effects_run_in_subscription_order() {
    let state = reactive(fixture(json!({ "foo": 0 })));
    let order = Rc::new(RefCell::new(Vec::new()));

    let runners: Vec<_> = (0..3)
        .map(|label| {
            let (reader, order) = (state.clone(), order.clone());
            effect(move || {
                reader.get("foo");
                order.borrow_mut().push(label);
            })
        })
        .collect();
    order.borrow_mut().clear();

    state.set("foo", 1);
    assert_eq!(*order.borrow(), vec![0, 1, 2]);
    assert_eq!(runners.len(), 3);
}

#[test]
fn untracked_reads_do_not_subscribe() {
    let state = reactive(fixture(json!({ "foo": 1 })));
    let runs = counter();

    let (reader, runs_in) = (state.clone(), runs.clone());
    let _runner = effect(move || {
        bump(&runs_in);
        untracked(|| reader.get("foo"));
    });

    state.set("foo", 2);
    assert_eq!(runs.get(), 1);
}

// ----------------------------------------------------------------------------
// Observation layer
// ----------------------------------------------------------------------------

#[test]
fn reactive_object() {
    let original = fixture(json!({ "foo": 1 }));
    let observed = reactive(original);

    assert_ne!(Value::from(&observed), Value::from(original));
    assert_eq!(observed.get("foo"), 1.0);
}

#[test]
fn reactive_of_reactive() {
    let observed = reactive(fixture(json!({ "foo": 1 })));
    let again = reactive(&observed);

    again.set("foo", num(again.get("foo")) + 1.0);
    assert_eq!(again.get("foo"), 2.0);
    assert_eq!(observed.get("foo"), 2.0);
    assert_eq!(observed, again);
}

#[test]
fn is_proxy_and_is_reactive() {
    let original = fixture(json!({ "foo": 1 }));
    let observed = Value::from(reactive(original));
    let plain = Value::from(original);

    assert!(is_reactive(&observed));
    assert!(!is_reactive(&plain));
    assert!(is_proxy(&observed));
    assert!(!is_proxy(&plain));
    assert_eq!(observed.get("foo"), 1.0);
}

#[test]
fn readonly_values() {
    init_tracing();
    let original = fixture(json!({ "foo": 1 }));
    let wrapped = Value::from(readonly(original));
    let plain = Value::from(original);

    assert_ne!(wrapped, plain);
    assert!(!is_reactive(&wrapped));
    assert!(is_readonly(&wrapped));
    assert!(!is_reactive(&plain));
    assert!(!is_readonly(&plain));
    assert!(is_proxy(&wrapped));
    assert!(!is_proxy(&plain));

    let ((), reported) = diagnostics::capture(|| wrapped.set("foo", 2));
    assert_eq!(wrapped.get("foo"), 1.0);
    assert!(matches!(
        reported.as_slice(),
        [Diagnostic::ReadonlyWriteRejected { key, .. }] if key == "foo"
    ));
}

#[test]
fn readonly_reads_do_not_track() {
    let original = fixture(json!({ "foo": 1 }));
    let view = readonly(original);
    let runs = counter();

    let (reader, runs_in) = (view.clone(), runs.clone());
    let _runner = effect(move || {
        reader.get("foo");
        bump(&runs_in);
    });
    assert_eq!(subscriber_count(original.id(), "foo"), 0);

    reactive(original).set("foo", 2);
    assert_eq!(runs.get(), 1);
}

#[test]
fn readonly_of_reactive() {
    let observed = reactive(fixture(json!({ "num": 1 })));
    let view = readonly(&observed);
    assert_ne!(view, observed);

    let ((), reported) = diagnostics::capture(|| view.set("num", num(view.get("num")) + 1.0));
    assert_eq!(reported.len(), 1);
    assert_eq!(view.get("num"), 1.0);
    assert_eq!(observed.get("num"), 1.0);

    observed.set("num", num(observed.get("num")) + 1.0);
    assert_eq!(observed.get("num"), 2.0);
    assert_eq!(view.get("num"), 2.0);

    // A readonly layer over a reactive handle still reports reactive
    assert!(is_reactive(&Value::from(&view)));
}

#[test]
fn readonly_layer_over_reactive_tracks_through_inner_handle() {
    let observed = reactive(fixture(json!({ "num": 1 })));
    let view = readonly(&observed);
    let seen = Rc::new(Cell::new(0.0));

    let (reader, seen_in) = (view.clone(), seen.clone());
    let _runner = effect(move || seen_in.set(num(reader.get("num"))));

    observed.set("num", 5);
    assert_eq!(seen.get(), 5.0);
}

#[test]
fn nested_objects_are_reactive_on_read() {
    let state = reactive(fixture(json!({ "nested": { "count": 0 } })));
    let seen = Rc::new(Cell::new(-1.0));

    let (reader, seen_in) = (state.clone(), seen.clone());
    let _runner = effect(move || seen_in.set(num(reader.get("nested").get("count"))));
    assert_eq!(seen.get(), 0.0);

    state.get("nested").set("count", 3);
    assert_eq!(seen.get(), 3.0);
}

#[test]
fn shallow_reactive_does_not_wrap_children() {
    let props = shallow_reactive(fixture(json!({ "n": { "foo": 1 }, "shallow": 1 })));
    let calls = counter();

    let (reader, calls_in) = (props.clone(), calls.clone());
    let _runner = effect(move || {
        reader.get("shallow");
        bump(&calls_in);
    });

    assert!(!is_reactive(&props.get("n")));
    props.set("shallow", num(props.get("shallow")) + 1.0);
    assert_eq!(props.get("shallow"), 2.0);
    assert_eq!(calls.get(), 2);
    assert!(is_shallow(&Value::from(&props)));

    // Nested writes go to the raw child and notify nobody
    props.get("n").set("foo", 2);
    assert_eq!(calls.get(), 2);
}

#[test]
fn shallow_readonly_does_not_wrap_children() {
    let props = shallow_readonly(fixture(json!({ "n": { "foo": 1 } })));

    assert!(!is_reactive(&props.get("n")));
    assert!(!is_readonly(&props.get("n")));

    let ((), reported) = diagnostics::capture(|| props.set("n", fixture(json!({ "foo": 2 }))));
    assert_eq!(reported.len(), 1);

    let child = props.get("n");
    child.set("foo", num(child.get("foo")) + 1.0);
    assert_eq!(props.get("n").get("foo"), 2.0);
    assert!(is_shallow(&Value::from(&props)));
}

#[test]
fn observe_dispatches_on_mode() {
    let original = fixture(json!({ "foo": 1 }));

    for mode in ObserveMode::ALL {
        let wrapped = observe(Value::from(original), mode);
        let handle = wrapped.as_observed().expect("objects are wrapped");
        assert_eq!(handle.mode(), mode);
        assert_eq!(is_readonly(&wrapped), mode.is_readonly());
        assert_eq!(is_shallow(&wrapped), mode.is_shallow());
        assert_eq!(to_raw(wrapped.clone()), Value::from(original));
    }

    assert_eq!(observe(Value::from("text"), ObserveMode::Reactive), "text");
}

#[test]
fn released_objects_drop_subscriptions() {
    let original = fixture(json!({ "foo": 1 }));
    let observed = reactive(original);
    let runs = counter();

    let (reader, runs_in) = (observed.clone(), runs.clone());
    let runner = effect(move || {
        reader.get("foo");
        bump(&runs_in);
    });
    assert_eq!(subscriber_count(original.id(), "foo"), 1);

    original.release();
    assert_eq!(subscriber_count(original.id(), "foo"), 0);
    assert_eq!(runner.effect().dependency_count(), 0);
    assert_eq!(original.try_get("foo"), Err(ReactiveError::TargetReleased(original.id())));

    observed.set("foo", 2);
    assert_eq!(runs.get(), 1);
}

// ----------------------------------------------------------------------------
// Refs
// ----------------------------------------------------------------------------

#[test]
fn ref_holds_a_value() {
    let a = new_ref(1);
    assert_eq!(a.get(), 1.0);

    a.set(Value::from(2));
    assert_eq!(a.get(), 2.0);
}

#[test]
fn ref_is_reactive() {
    let a = new_ref(1);
    let calls = counter();
    let dummy = Rc::new(Cell::new(0.0));

    let (reader, calls_in, dummy_in) = (a.clone(), calls.clone(), dummy.clone());
    let _runner = effect(move || {
        bump(&calls_in);
        dummy_in.set(num(reader.get()));
    });
    assert_eq!((calls.get(), dummy.get()), (1, 1.0));

    a.set(Value::from(2));
    assert_eq!((calls.get(), dummy.get()), (2, 2.0));

    a.set(Value::from(2));
    assert_eq!((calls.get(), dummy.get()), (2, 2.0));
}

#[test]
fn is_ref_checks_the_tag() {
    assert!(is_ref(&Value::from(new_ref(1))));
    assert!(!is_ref(&Value::from(reactive(fixture(json!({ "foo": 1 }))))));
    assert!(!is_ref(&Value::from(0)));
    assert!(!is_ref(&Value::from(fixture(json!({ "bar": 0 })))));
}

#[test]
fn unref_returns_inner_values() {
    assert_eq!(unref(Value::from(1)), 1.0);
    assert_eq!(unref(Value::from(new_ref(1))), 1.0);
}

#[test]
fn proxy_refs_unwraps_and_writes_through() {
    let obj = Object::new();
    obj.set("foo", new_ref(1));
    obj.set("bar", "baz");

    let view = proxy_refs(obj);
    assert_eq!(view.get("foo"), 1.0);
    assert_eq!(view.get("bar"), "baz");

    view.set("foo", 2);
    assert_eq!(view.get("foo"), 2.0);

    view.set("foo", new_ref(3));
    assert_eq!(view.get("foo"), 3.0);
}

#[test]
fn shallow_and_deep_refs() {
    let shallow = shallow_ref(fixture(json!({ "num": 1 })));
    assert!(is_ref(&Value::from(shallow.clone())));
    assert!(!is_reactive(&shallow.get()));

    let deep = new_ref(fixture(json!({ "num": 1 })));
    assert!(is_ref(&Value::from(deep.clone())));
    assert!(is_reactive(&deep.get()));
}

// ----------------------------------------------------------------------------
// Computed
// ----------------------------------------------------------------------------

#[test]
fn computed_returns_updated_value() {
    let value = reactive(fixture(json!({ "foo": 1 })));
    let reader = value.clone();
    let c_value = computed(move || reader.get("foo"));

    assert_eq!(c_value.get(), 1.0);
    value.set("foo", 2);
    assert_eq!(c_value.get(), 2.0);
}

#[test]
fn computed_is_lazy() {
    let value = reactive(fixture(json!({ "foo": 1 })));
    let getter_calls = counter();

    let (reader, calls_in) = (value.clone(), getter_calls.clone());
    let c_value = computed(move || {
        bump(&calls_in);
        reader.get("foo")
    });
    assert_eq!(getter_calls.get(), 0);

    assert_eq!(c_value.get(), 1.0);
    assert_eq!(getter_calls.get(), 1);

    c_value.get();
    assert_eq!(getter_calls.get(), 1);

    value.set("foo", 2);
    assert_eq!(getter_calls.get(), 1);

    assert_eq!(c_value.get(), 2.0);
    assert_eq!(getter_calls.get(), 2);

    c_value.get();
    assert_eq!(getter_calls.get(), 2);
}

#[test]
fn computed_double() {
    let o = reactive(fixture(json!({ "n": 1 })));
    let getter_calls = counter();

    let (reader, calls_in) = (o.clone(), getter_calls.clone());
    let c = computed(move || {
        bump(&calls_in);
        num(reader.get("n")) * 2.0
    });
    assert_eq!(c.get(), 2.0);

    o.set("n", 5);
    assert_eq!(getter_calls.get(), 1);
    assert!(c.is_dirty());

    assert_eq!(c.get(), 10.0);
    assert_eq!(getter_calls.get(), 2);
}

/// Test an effect that reads a computed value and writes its source.
#[test]
fn effect_of_computed() {
    let test = reactive(fixture(json!({ "num": 1 })));
    let source = test.clone();
    let ctest = computed(move || source.get("num"));
    let log = counter();

    let (writer, reader, log_in) = (test.clone(), ctest.clone(), log.clone());
    let _runner = effect(move || {
        reader.get();
        bump(&log_in);
        writer.set("num", 100);
    });
    assert_eq!(log.get(), 1);

    ctest.get();
    test.set("num", 200);
    assert_eq!(log.get(), 2);

    test.set("num", 300);
    assert_eq!(log.get(), 2);

    ctest.get();
    test.set("num", 400);
    assert_eq!(log.get(), 3);
}

#[test]
fn computed_stored_in_objects() {
    let state = reactive(fixture(json!({ "n": 2 })));
    let reader = state.clone();
    let squared = computed(move || Value::from(num(reader.get("n")).powi(2)));

    let holder = Object::new();
    holder.set("squared", squared.clone());
    assert!(is_readonly(&holder.get("squared")));

    let view = proxy_refs(holder);
    assert_eq!(view.get("squared"), 4.0);

    let ((), reported) = diagnostics::capture(|| view.set("squared", 1));
    assert_eq!(
        reported,
        vec![Diagnostic::ReadonlyComputedWrite {
            computed: squared.id()
        }]
    );

    state.set("n", 3);
    assert_eq!(view.get("squared"), 9.0);
}

// ----------------------------------------------------------------------------
// JSON
// ----------------------------------------------------------------------------

#[test]
fn json_snapshot_reads_through_everything() {
    let state = reactive(fixture(json!({ "name": "tendril", "tags": ["a", "b"] })));
    let reader = state.clone();
    let length = computed(move || Value::from(reader.get("name").as_str().map_or(0, str::len)));

    let holder = Object::new();
    holder.set("state", state.clone());
    holder.set("length", length);
    holder.set("count", new_ref(3));

    let snapshot = Value::from(holder).to_json().expect("acyclic");
    assert_eq!(
        snapshot,
        json!({
            "state": { "name": "tendril", "tags": ["a", "b"] },
            "length": 7.0,
            "count": 3.0,
        })
    );
}
