#![forbid(unsafe_code)]

//! Persistent state cells addressed by call position.
//!
//! Each instance owns an ordered list of slots. A slot is created the first
//! time the body reaches its position and mutated in place on every later
//! tick that reaches the same position. Which fields a slot uses depends on
//! the operation bound to it: state and reducer cells fill `value` and
//! `handle`, effects fill `deps` and `cleanup`, memo/callback/ref cells fill
//! `value` (and `deps` for memo/callback).

use std::any::Any;
use std::rc::Rc;

/// A cleanup returned by an effect, run before the effect's next execution
/// and once more when the owning instance is released.
pub type Cleanup = Box<dyn FnOnce()>;

/// One persistent cell at a fixed call position.
#[derive(Default)]
pub(crate) struct Slot {
    /// Whether the first visit already initialized this slot.
    pub(crate) initialized: bool,
    /// Stored payload: state value, memoized result, callback, or ref box.
    pub(crate) value: Option<Rc<dyn Any>>,
    /// Stable handle created on first visit (setter or dispatcher).
    pub(crate) handle: Option<Rc<dyn Any>>,
    /// Last-seen dependency record.
    pub(crate) deps: Option<Box<dyn Any>>,
    /// Outstanding cleanup from the previous effect run, if any.
    pub(crate) cleanup: Option<Cleanup>,
}

impl Slot {
    /// Clone the stored payload out as `T`.
    ///
    /// Panics when the slot holds a different type, which can only happen
    /// when the body violated the stable-call-order contract.
    pub(crate) fn value_as<T: Clone + 'static>(&self) -> T {
        self.value
            .as_deref()
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
            .unwrap_or_else(|| panic!("slot payload type mismatch; hook call order must be stable"))
    }

    /// Clone the stable handle out as `T`.
    pub(crate) fn handle_as<T: Clone + 'static>(&self) -> T {
        self.handle
            .as_deref()
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
            .unwrap_or_else(|| panic!("slot handle type mismatch; hook call order must be stable"))
    }
}
