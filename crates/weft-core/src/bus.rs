#![forbid(unsafe_code)]

//! Per-instance subscription bus.
//!
//! Listeners are kept in registration order under monotonically increasing
//! ids. Notification iterates over a snapshot of the listener set taken at
//! notification time, so an unsubscribe triggered by one listener never
//! skips or double-calls a sibling in the same pass.
//!
//! # Invariants
//!
//! 1. Listeners are notified in registration order.
//! 2. Dropping a [`Subscription`] removes the listener before the next
//!    notification pass; the current pass is unaffected.
//! 3. A `Subscription` outliving its bus is inert (weak handle).

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

pub(crate) type Listener = Rc<dyn Fn(&dyn Any)>;

struct BusInner {
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_id: Cell<u64>,
}

pub(crate) struct Bus {
    inner: Rc<BusInner>,
}

impl Bus {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(BusInner {
                listeners: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    pub(crate) fn subscribe(&self, listener: Listener) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, listener));
        Subscription {
            bus: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Invoke every currently registered listener with `value`.
    ///
    /// The set is snapshotted before the first call; mutations performed by
    /// listeners (subscribe, unsubscribe) take effect from the next pass.
    pub(crate) fn notify(&self, value: &dyn Any) {
        let snapshot: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(value);
        }
    }
}

/// RAII guard for one bus listener; dropping it unsubscribes.
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
}

impl Subscription {
    /// Keep the listener registered for the remaining life of its instance.
    pub fn detach(self) {
        std::mem::forget(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.listeners.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_listener(log: &Rc<RefCell<Vec<i32>>>) -> Listener {
        let log = Rc::clone(log);
        Rc::new(move |value: &dyn Any| {
            if let Some(value) = value.downcast_ref::<i32>() {
                log.borrow_mut().push(*value);
            }
        })
    }

    #[test]
    fn notifies_in_registration_order() {
        let bus = Bus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let (a, b) = (Rc::clone(&order), Rc::clone(&order));
        let _s1 = bus.subscribe(Rc::new(move |_| a.borrow_mut().push("first")));
        let _s2 = bus.subscribe(Rc::new(move |_| b.borrow_mut().push("second")));

        bus.notify(&0i32);
        assert_eq!(*order.borrow(), ["first", "second"]);
    }

    #[test]
    fn drop_unsubscribes() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sub = bus.subscribe(counting_listener(&log));

        bus.notify(&1i32);
        drop(sub);
        bus.notify(&2i32);
        assert_eq!(*log.borrow(), [1]);
    }

    #[test]
    fn unsubscribe_during_pass_spares_siblings() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let held: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let dropper = Rc::clone(&held);
        let _s1 = bus.subscribe(Rc::new(move |_| {
            dropper.borrow_mut().take();
        }));
        *held.borrow_mut() = Some(bus.subscribe(counting_listener(&log)));

        // First pass: s1 drops the sibling, but the snapshot still calls it.
        bus.notify(&1i32);
        assert_eq!(*log.borrow(), [1]);

        // Second pass: the sibling is gone.
        bus.notify(&2i32);
        assert_eq!(*log.borrow(), [1]);
    }

    #[test]
    fn detach_keeps_listener_alive() {
        let bus = Bus::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        bus.subscribe(counting_listener(&log)).detach();

        bus.notify(&5i32);
        assert_eq!(*log.borrow(), [5]);
    }
}
