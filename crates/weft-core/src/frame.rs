#![forbid(unsafe_code)]

//! Per-tick dispatch frame and the ambient frame stack.
//!
//! A frame is the execution context of one tick pass: the owning instance,
//! the slot cursor, and the two effect queues. Installing a frame makes the
//! hook operations resolve against that instance; the thread-local stack is
//! what lets a tick started from inside another tick (an effect of instance
//! A updating instance B) nest correctly — each tick restores exactly the
//! context it saved.
//!
//! # Invariants
//!
//! 1. The cursor starts at zero for every tick pass; slots are visited in
//!    call order.
//! 2. Effect queues are drained in full after the body returns, layout
//!    phase first, so no side effect runs while the body is still
//!    constructing its return value.
//! 3. A frame pushed onto the stack is popped even when the body panics
//!    (pop-on-drop guard), so the ambient context never points at a dead
//!    tick.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::instance::Instance;
use crate::slot::{Cleanup, Slot};

/// Which of the two ordered effect queues a registration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    Layout,
    Deferred,
}

/// An effect raised during the body, consumed once by the flush.
pub(crate) struct EffectRegistration {
    pub(crate) slot: Rc<RefCell<Slot>>,
    pub(crate) run: Box<dyn FnOnce() -> Option<Cleanup>>,
}

/// Execution context of one tick pass.
pub(crate) struct Frame {
    pub(crate) instance: Rc<Instance>,
    cursor: Cell<usize>,
    layout_queue: RefCell<Vec<EffectRegistration>>,
    deferred_queue: RefCell<Vec<EffectRegistration>>,
}

impl Frame {
    pub(crate) fn new(instance: Rc<Instance>) -> Rc<Self> {
        Rc::new(Self {
            instance,
            cursor: Cell::new(0),
            layout_queue: RefCell::new(Vec::new()),
            deferred_queue: RefCell::new(Vec::new()),
        })
    }

    /// Slot at the current position; advances the cursor and creates the
    /// slot on first visit.
    pub(crate) fn next_slot(&self) -> Rc<RefCell<Slot>> {
        let index = self.cursor.get();
        self.cursor.set(index + 1);
        let mut slots = self.instance.slots.borrow_mut();
        if index == slots.len() {
            slots.push(Rc::new(RefCell::new(Slot::default())));
        }
        Rc::clone(&slots[index])
    }

    pub(crate) fn enqueue(&self, phase: Phase, registration: EffectRegistration) {
        let queue = match phase {
            Phase::Layout => &self.layout_queue,
            Phase::Deferred => &self.deferred_queue,
        };
        queue.borrow_mut().push(registration);
    }

    /// Drain both queues, layout phase first. For each registration the
    /// slot's previous cleanup runs before the new callback; a returned
    /// cleanup is stored, any other return clears it.
    pub(crate) fn flush_effects(&self) {
        for queue in [&self.layout_queue, &self.deferred_queue] {
            let drained: Vec<EffectRegistration> = queue.borrow_mut().drain(..).collect();
            for registration in drained {
                let previous = registration.slot.borrow_mut().cleanup.take();
                if let Some(previous) = previous {
                    previous();
                }
                let next = (registration.run)();
                registration.slot.borrow_mut().cleanup = next;
            }
        }
    }
}

// ─── Ambient frame stack ─────────────────────────────────────────────────────

thread_local! {
    static FRAMES: RefCell<Vec<Rc<Frame>>> = const { RefCell::new(Vec::new()) };
}

/// The frame of the innermost running tick, if any.
pub(crate) fn current() -> Option<Rc<Frame>> {
    FRAMES.with(|stack| stack.borrow().last().cloned())
}

/// Pops the installed frame on drop, unwinding included.
pub(crate) struct FrameGuard {
    _private: (),
}

pub(crate) fn install(frame: Rc<Frame>) -> FrameGuard {
    FRAMES.with(|stack| stack.borrow_mut().push(frame));
    FrameGuard { _private: () }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        FRAMES.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
