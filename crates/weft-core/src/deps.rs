#![forbid(unsafe_code)]

//! Dependency records for effects, memos, and callbacks.
//!
//! A dependency record is any `PartialEq + 'static` value: a scalar, a
//! tuple, a `Vec`. The previous record is stored type-erased in the slot;
//! the new record is compared against it to decide whether the operation
//! re-runs.
//!
//! # Comparison policy
//!
//! - Records compare with `PartialEq` on the whole value. For
//!   variable-length records (`Vec`, `String`, ...) a length change
//!   therefore always compares unequal and forces a re-run.
//! - A stored record that cannot be downcast to the incoming type counts as
//!   changed. This is permissive recovery, never an error: it can only
//!   happen when the body broke the stable-call-order contract.
//! - The very first visit (no stored record) counts as changed, so effects
//!   run on the tick that creates them.

use std::any::Any;

/// Dependency record that never equals itself, forcing a re-run on every
/// tick. The `PartialEq` impl is deliberately irreflexive, like a float
/// `NaN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Always;

impl PartialEq for Always {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

/// Whether `next` differs from the previously stored record.
pub(crate) fn changed<D: PartialEq + 'static>(prev: Option<&dyn Any>, next: &D) -> bool {
    match prev.and_then(|p| p.downcast_ref::<D>()) {
        Some(prev) => prev != next,
        None => true,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn erased<D: PartialEq + 'static>(record: D) -> Box<dyn Any> {
        Box::new(record)
    }

    #[test]
    fn first_visit_counts_as_changed() {
        assert!(changed(None, &(1, 2)));
    }

    #[test]
    fn equal_records_are_unchanged() {
        let prev = erased((1, "a"));
        assert!(!changed(Some(prev.as_ref()), &(1, "a")));
    }

    #[test]
    fn differing_element_changes() {
        let prev = erased((1, 2));
        assert!(changed(Some(prev.as_ref()), &(1, 3)));
    }

    #[test]
    fn length_change_forces_rerun() {
        let prev = erased(vec![1, 2]);
        assert!(changed(Some(prev.as_ref()), &vec![1, 2, 3]));
        let prev = erased(vec![1, 2, 3]);
        assert!(!changed(Some(prev.as_ref()), &vec![1, 2, 3]));
    }

    #[test]
    fn type_mismatch_counts_as_changed() {
        let prev = erased(7u32);
        assert!(changed(Some(prev.as_ref()), &7i64));
    }

    #[test]
    fn always_is_never_equal() {
        let prev = erased(Always);
        assert!(changed(Some(prev.as_ref()), &Always));
    }

    #[test]
    fn unit_record_runs_once() {
        assert!(changed(None, &()));
        let prev = erased(());
        assert!(!changed(Some(prev.as_ref()), &()));
    }
}
