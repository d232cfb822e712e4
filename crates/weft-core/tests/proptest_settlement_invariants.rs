//! Property-based invariant tests for tick settlement and the effect
//! dependency law.
//!
//! These must hold for **any** sequence of external calls:
//!
//! 1. The final state equals the left-to-right fold of every applied
//!    update (no lost updates).
//! 2. Exactly one notification is delivered per value-changing external
//!    call, each carrying the fully settled value (no duplicates, nothing
//!    observed mid-coalescence).
//! 3. An update storm raised from inside a tick coalesces into that tick:
//!    one notification regardless of storm length.
//! 4. For an effect keyed on `x`, the cleanup for `x₀` runs exactly once,
//!    strictly before the callback for the next distinct `x₁`; the callback
//!    never runs twice for the same consecutive value.

#![forbid(unsafe_code)]

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use weft_core::{Setter, SharedHook, cleanup, free, get, on, use_effect, use_state};

type CountState = (i32, Setter<i32>);

// ── Helpers ─────────────────────────────────────────────────────────────

/// Deltas small enough to keep values readable, including no-op zeros.
fn deltas() -> impl Strategy<Value = Vec<i32>> {
    proptest::collection::vec(-5i32..=5, 0..40)
}

proptest! {
    // 1 + 2: fold equivalence and one notification per changing call.
    #[test]
    fn settlement_folds_external_calls(deltas in deltas()) {
        let hook = SharedHook::new(|| use_state(|| 0i32));
        let observed = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&observed);
        let sub = on(&hook, move |(value, _): &CountState| sink.borrow_mut().push(*value));

        let mut expected = 0i32;
        let mut expected_notes = Vec::new();
        for &delta in &deltas {
            get(&hook).1.update(|v| v + delta);
            if delta != 0 {
                expected += delta;
                expected_notes.push(expected);
            }
        }

        prop_assert_eq!(get(&hook).0, expected);
        prop_assert_eq!(&*observed.borrow(), &expected_notes);
        drop(sub);
        free(&hook);
    }

    // 3: reentrant updates fold into the running tick, loop not recursion.
    #[test]
    fn update_storm_settles_into_one_notification(target in 0i32..60) {
        let hook = SharedHook::new(|| {
            let (current, set_current) = use_state(|| 0i32);
            let (goal, set_goal) = use_state(|| 0i32);
            {
                let step = set_current.clone();
                use_effect((current, goal), move || {
                    if current < goal {
                        step.set(current + 1);
                    }
                    None
                });
            }
            (current, set_goal)
        });

        let notifications = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&notifications);
        let sub = on(&hook, move |(current, _): &CountState| {
            sink.borrow_mut().push(*current);
        });

        get(&hook).1.set(target);

        prop_assert_eq!(get(&hook).0, target);
        let expected: Vec<i32> = if target > 0 { vec![target] } else { Vec::new() };
        prop_assert_eq!(&*notifications.borrow(), &expected);
        drop(sub);
        free(&hook);
    }

    // 4: cleanup/run interleaving over arbitrary value sequences.
    #[test]
    fn effect_dependency_law(values in proptest::collection::vec(0i32..4, 0..30)) {
        let log: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let outer = Rc::clone(&log);
        let hook = SharedHook::new(move || {
            let (x, set) = use_state(|| 0);
            let run_log = Rc::clone(&outer);
            use_effect(x, move || {
                run_log.borrow_mut().push(format!("run {x}"));
                let clean_log = Rc::clone(&run_log);
                cleanup(move || clean_log.borrow_mut().push(format!("clean {x}")))
            });
            (x, set)
        });

        get(&hook);
        for &value in &values {
            get(&hook).1.set(value);
        }
        free(&hook);

        // Reference interleaving: run x₀, then clean xᵢ / run xᵢ₊₁ per
        // distinct consecutive value, then the release-time cleanup.
        let mut expected = vec!["run 0".to_owned()];
        let mut last = 0i32;
        for &value in &values {
            if value != last {
                expected.push(format!("clean {last}"));
                expected.push(format!("run {value}"));
                last = value;
            }
        }
        expected.push(format!("clean {last}"));

        prop_assert_eq!(&*log.borrow(), &expected);
    }
}
