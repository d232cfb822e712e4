#![forbid(unsafe_code)]

//! The single live execution context bound to one shared hook, and the tick
//! driver that re-runs its body.
//!
//! # Tick state machine
//!
//! ```text
//! Idle → Running → (PendingRerun → Running)* → Idle
//! ```
//!
//! A tick installs the instance's dispatch frame, runs the body, flushes
//! the effect queues, and restores the ambient context. A setter fired
//! while the tick is running flips the state to `PendingRerun`; the driver
//! then loops (never recurses) instead of notifying, so stack depth stays
//! bounded regardless of update storm length. Subscribers are notified
//! exactly once, on the transition back to `Idle` with no pending rerun.
//!
//! # Invariants
//!
//! 1. Two ticks of the *same* instance never interleave; reentrant setter
//!    calls coalesce into the running tick.
//! 2. Nested ticks of *different* instances form a call stack via the
//!    ambient frame stack.
//! 3. While an override is set the body is never invoked; rerun requests
//!    are ignored until the override clears.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::bus::Bus;
use crate::frame::{self, Frame};
use crate::registry::HookId;
use crate::slot::Slot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickState {
    Idle,
    Running,
    PendingRerun,
}

pub(crate) struct Instance {
    pub(crate) id: HookId,
    body: Rc<dyn Fn() -> Rc<dyn Any>>,
    pub(crate) slots: RefCell<Vec<Rc<RefCell<Slot>>>>,
    value: RefCell<Option<Rc<dyn Any>>>,
    override_value: RefCell<Option<Rc<dyn Any>>>,
    state: Cell<TickState>,
    pub(crate) bus: Bus,
}

/// Restores `Idle` on drop so a panicking body cannot leave the instance
/// stuck in `Running`.
struct SettleGuard<'a> {
    instance: &'a Instance,
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        self.instance.state.set(TickState::Idle);
    }
}

impl Instance {
    pub(crate) fn new(id: HookId, body: Rc<dyn Fn() -> Rc<dyn Any>>) -> Rc<Self> {
        Rc::new(Self {
            id,
            body,
            slots: RefCell::new(Vec::new()),
            value: RefCell::new(None),
            override_value: RefCell::new(None),
            state: Cell::new(TickState::Idle),
            bus: Bus::new(),
        })
    }

    /// Current observable value: the override when set, otherwise the value
    /// settled by the last tick.
    pub(crate) fn value(&self) -> Option<Rc<dyn Any>> {
        if let Some(forced) = self.override_value.borrow().clone() {
            return Some(forced);
        }
        self.value.borrow().clone()
    }

    pub(crate) fn is_overridden(&self) -> bool {
        self.override_value.borrow().is_some()
    }

    pub(crate) fn set_override(&self, forced: Rc<dyn Any>) {
        *self.override_value.borrow_mut() = Some(forced);
    }

    pub(crate) fn clear_override(&self) {
        *self.override_value.borrow_mut() = None;
    }

    /// One full tick: run the body through a fresh dispatch frame, flush
    /// effects, loop while reruns are pending, then notify subscribers with
    /// the settled value.
    pub(crate) fn tick(self: &Rc<Self>) {
        if self.is_overridden() {
            trace!(hook = self.id.raw(), "tick suppressed while overridden");
            return;
        }
        let settle = SettleGuard {
            instance: self.as_ref(),
        };
        loop {
            self.state.set(TickState::Running);
            let frame = Frame::new(Rc::clone(self));
            let installed = frame::install(Rc::clone(&frame));
            let next = (self.body)();
            *self.value.borrow_mut() = Some(next);
            frame.flush_effects();
            drop(installed);
            if self.state.get() == TickState::PendingRerun {
                trace!(hook = self.id.raw(), "coalescing rerun into running tick");
                continue;
            }
            break;
        }
        drop(settle);
        let settled = self.value.borrow().clone();
        if let Some(settled) = settled {
            trace!(hook = self.id.raw(), "tick settled, notifying subscribers");
            self.bus.notify(settled.as_ref());
        }
    }

    /// Entry point for setters: coalesce into a running tick, or start a
    /// fresh one when idle.
    pub(crate) fn request_rerun(self: &Rc<Self>) {
        match self.state.get() {
            TickState::Running => self.state.set(TickState::PendingRerun),
            TickState::PendingRerun => {}
            TickState::Idle => self.tick(),
        }
    }

    /// Run every outstanding slot cleanup once, in slot order, dropping the
    /// slots afterwards. Used on release.
    pub(crate) fn run_cleanups(&self) {
        let slots: Vec<Rc<RefCell<Slot>>> = self.slots.borrow_mut().drain(..).collect();
        for slot in slots {
            let cleanup = slot.borrow_mut().cleanup.take();
            if let Some(cleanup) = cleanup {
                cleanup();
            }
        }
    }
}
