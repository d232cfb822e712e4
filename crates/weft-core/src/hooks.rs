#![forbid(unsafe_code)]

//! The stateful operations a shared hook body may call during a tick.
//!
//! Every operation resolves against the innermost dispatch frame and binds
//! to one slot by call position. The body must therefore call these in the
//! same order and count on every tick; conditionally skipping or reordering
//! calls silently binds state to the wrong slot (the same contract the
//! hooks protocol imposes everywhere else).
//!
//! Identity comparison is `PartialEq`: a setter or dispatcher stores a new
//! value — and requests a re-tick — only when it compares unequal to the
//! current one.
//!
//! Unsupported operations ([`use_context`], [`use_debug_value`],
//! [`use_responder`], [`use_deferred_value`], [`use_transition`]) require
//! framework-owned scheduling this engine does not replicate; each logs a
//! diagnostic and panics naming the operation.

use std::any::Any;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use tracing::error;

use crate::deps;
use crate::frame::{self, EffectRegistration, Frame, Phase};
use crate::instance::Instance;
use crate::slot::Slot;

pub use crate::slot::Cleanup;

fn active_frame(op: &str) -> Rc<Frame> {
    match frame::current() {
        Some(frame) => frame,
        None => {
            error!(op, "hook operation called outside a shared hook body");
            panic!("{op} may only be called while a shared hook body is running");
        }
    }
}

// ─── State ───────────────────────────────────────────────────────────────────

/// Stable setter for a state cell created by [`use_state`].
///
/// Holds weak handles: once the owning instance is released the setter
/// turns inert and calls become no-ops.
pub struct Setter<T> {
    slot: Weak<RefCell<Slot>>,
    instance: Weak<Instance>,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Weak::clone(&self.slot),
            instance: Weak::clone(&self.instance),
            _marker: PhantomData,
        }
    }
}

impl<T: PartialEq + 'static> Setter<T> {
    /// An inert setter that never upgrades. Useful for building forced
    /// values handed to `mock` without a live instance behind them.
    #[must_use]
    pub fn detached() -> Self {
        Self {
            slot: Weak::new(),
            instance: Weak::new(),
            _marker: PhantomData,
        }
    }

    /// Store `next` if it differs from the current value and request a
    /// re-tick of the owning instance.
    pub fn set(&self, next: T) {
        let (Some(slot), Some(instance)) = (self.slot.upgrade(), self.instance.upgrade()) else {
            return;
        };
        {
            let mut cell = slot.borrow_mut();
            let same = cell
                .value
                .as_deref()
                .and_then(|v| v.downcast_ref::<T>())
                .is_some_and(|current| *current == next);
            if same {
                return;
            }
            cell.value = Some(Rc::new(next) as Rc<dyn Any>);
        }
        instance.request_rerun();
    }

    /// Apply `f` to the current value and store the result via [`set`].
    ///
    /// [`set`]: Setter::set
    pub fn update(&self, f: impl FnOnce(&T) -> T)
    where
        T: Clone,
    {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        // Clone the current value out so no borrow is held while `f` runs.
        let current = {
            let cell = slot.borrow();
            let Some(current) = cell.value.as_deref().and_then(|v| v.downcast_ref::<T>()) else {
                return;
            };
            current.clone()
        };
        self.set(f(&current));
    }
}

/// Persistent state cell. The initializer runs once, on the tick that
/// creates the slot; later ticks return the stored value and the same
/// setter.
pub fn use_state<T>(init: impl FnOnce() -> T) -> (T, Setter<T>)
where
    T: PartialEq + Clone + 'static,
{
    let frame = active_frame("use_state");
    let slot = frame.next_slot();
    let mut cell = slot.borrow_mut();
    if !cell.initialized {
        cell.value = Some(Rc::new(init()) as Rc<dyn Any>);
        let setter: Setter<T> = Setter {
            slot: Rc::downgrade(&slot),
            instance: Rc::downgrade(&frame.instance),
            _marker: PhantomData,
        };
        cell.handle = Some(Rc::new(setter) as Rc<dyn Any>);
        cell.initialized = true;
    }
    (cell.value_as::<T>(), cell.handle_as::<Setter<T>>())
}

// ─── Reducer ─────────────────────────────────────────────────────────────────

/// Stable dispatcher for a reducer cell created by [`use_reducer`].
pub struct Dispatch<A> {
    inner: Rc<dyn Fn(A)>,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: 'static> Dispatch<A> {
    fn new<S>(
        slot: &Rc<RefCell<Slot>>,
        instance: &Rc<Instance>,
        reducer: impl Fn(&S, A) -> S + 'static,
    ) -> Self
    where
        S: PartialEq + Clone + 'static,
    {
        let slot = Rc::downgrade(slot);
        let instance = Rc::downgrade(instance);
        Self {
            inner: Rc::new(move |action: A| {
                let (Some(slot), Some(instance)) = (slot.upgrade(), instance.upgrade()) else {
                    return;
                };
                // Clone the state out so no borrow is held while the
                // reducer runs.
                let current = {
                    let cell = slot.borrow();
                    let Some(current) = cell.value.as_deref().and_then(|v| v.downcast_ref::<S>())
                    else {
                        return;
                    };
                    current.clone()
                };
                let next = reducer(&current, action);
                let changed = {
                    let mut cell = slot.borrow_mut();
                    let same = cell
                        .value
                        .as_deref()
                        .and_then(|v| v.downcast_ref::<S>())
                        .is_some_and(|current| *current == next);
                    if !same {
                        cell.value = Some(Rc::new(next) as Rc<dyn Any>);
                    }
                    !same
                };
                if changed {
                    instance.request_rerun();
                }
            }),
        }
    }

    pub fn dispatch(&self, action: A) {
        (self.inner)(action);
    }
}

/// Reducer-backed state cell. The reducer is captured once, on the tick
/// that creates the slot; dispatch applies it to the current state and
/// re-ticks when the result differs.
pub fn use_reducer<S, A>(
    reducer: impl Fn(&S, A) -> S + 'static,
    init: impl FnOnce() -> S,
) -> (S, Dispatch<A>)
where
    S: PartialEq + Clone + 'static,
    A: 'static,
{
    let frame = active_frame("use_reducer");
    let slot = frame.next_slot();
    let mut cell = slot.borrow_mut();
    if !cell.initialized {
        cell.value = Some(Rc::new(init()) as Rc<dyn Any>);
        let dispatch = Dispatch::new(&slot, &frame.instance, reducer);
        cell.handle = Some(Rc::new(dispatch) as Rc<dyn Any>);
        cell.initialized = true;
    }
    (cell.value_as::<S>(), cell.handle_as::<Dispatch<A>>())
}

// ─── Effects ─────────────────────────────────────────────────────────────────

/// Wrap an effect's teardown closure for returning from [`use_effect`].
pub fn cleanup(f: impl FnOnce() + 'static) -> Option<Cleanup> {
    Some(Box::new(f))
}

fn register_effect<D>(
    phase: Phase,
    op: &str,
    deps: D,
    run: impl FnOnce() -> Option<Cleanup> + 'static,
) where
    D: PartialEq + 'static,
{
    let frame = active_frame(op);
    let slot = frame.next_slot();
    let changed = deps::changed(slot.borrow().deps.as_deref(), &deps);
    if changed {
        slot.borrow_mut().deps = Some(Box::new(deps));
        frame.enqueue(
            phase,
            EffectRegistration {
                slot: Rc::clone(&slot),
                run: Box::new(run),
            },
        );
    }
}

/// Deferred-phase effect: queued on the first tick and whenever `deps`
/// changed, run after the body returns and after all layout-phase effects.
/// The callback may return a cleanup, which runs before its next execution
/// and once more on release.
pub fn use_effect<D>(deps: D, run: impl FnOnce() -> Option<Cleanup> + 'static)
where
    D: PartialEq + 'static,
{
    register_effect(Phase::Deferred, "use_effect", deps, run);
}

/// Layout-phase effect: like [`use_effect`] but drained first.
pub fn use_layout_effect<D>(deps: D, run: impl FnOnce() -> Option<Cleanup> + 'static)
where
    D: PartialEq + 'static,
{
    register_effect(Phase::Layout, "use_layout_effect", deps, run);
}

// ─── Memoization ─────────────────────────────────────────────────────────────

/// Memoized computation: recomputed only when `deps` changed, otherwise the
/// cached value is returned verbatim.
pub fn use_memo<T, D>(deps: D, compute: impl FnOnce() -> T) -> T
where
    T: Clone + 'static,
    D: PartialEq + 'static,
{
    let frame = active_frame("use_memo");
    let slot = frame.next_slot();
    let changed = deps::changed(slot.borrow().deps.as_deref(), &deps);
    if changed {
        let value = compute();
        let mut cell = slot.borrow_mut();
        cell.deps = Some(Box::new(deps));
        cell.value = Some(Rc::new(value) as Rc<dyn Any>);
        cell.initialized = true;
    }
    slot.borrow().value_as::<T>()
}

/// A memoized single-argument closure returned by [`use_callback`].
pub struct Callback<A, R = ()> {
    inner: Rc<dyn Fn(A) -> R>,
}

impl<A, R> Clone for Callback<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A, R> Callback<A, R> {
    pub fn call(&self, arg: A) -> R {
        (self.inner)(arg)
    }
}

/// Memoized closure: re-captured only when `deps` changed, otherwise the
/// previously stored closure is returned — including whatever it captured
/// at that time.
pub fn use_callback<A, R, D>(deps: D, f: impl Fn(A) -> R + 'static) -> Callback<A, R>
where
    A: 'static,
    R: 'static,
    D: PartialEq + 'static,
{
    let frame = active_frame("use_callback");
    let slot = frame.next_slot();
    let changed = deps::changed(slot.borrow().deps.as_deref(), &deps);
    let mut cell = slot.borrow_mut();
    if changed {
        cell.deps = Some(Box::new(deps));
        let callback: Callback<A, R> = Callback { inner: Rc::new(f) };
        cell.value = Some(Rc::new(callback) as Rc<dyn Any>);
        cell.initialized = true;
    }
    cell.value_as::<Callback<A, R>>()
}

// ─── Refs ────────────────────────────────────────────────────────────────────

/// A stable mutable box surviving across ticks, created by [`use_ref`].
/// Mutating it never requests a re-tick.
pub struct RefHandle<T> {
    inner: Rc<RefCell<T>>,
}

impl<T> Clone for RefHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> RefHandle<T> {
    /// A free-standing box, not tied to any slot. Handy as an
    /// [`use_imperative_handle`] sink owned by the caller.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(value)),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow())
    }

    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.borrow_mut())
    }

    pub fn set(&self, value: T) {
        *self.inner.borrow_mut() = value;
    }

    pub fn replace(&self, value: T) -> T {
        self.inner.replace(value)
    }

    #[must_use]
    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.inner.borrow().clone()
    }
}

/// Stable mutable box: the initializer runs once; every later tick returns
/// a handle to the same box.
pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> RefHandle<T> {
    let frame = active_frame("use_ref");
    let slot = frame.next_slot();
    let mut cell = slot.borrow_mut();
    if !cell.initialized {
        cell.value = Some(Rc::new(RefHandle::new(init())) as Rc<dyn Any>);
        cell.initialized = true;
    }
    cell.value_as::<RefHandle<T>>()
}

/// Destination of an imperative handle: a [`RefHandle`] to assign into, or
/// a [`Setter`] to invoke.
pub trait HandleSink<T> {
    fn assign(&self, value: T);
}

impl<T: 'static> HandleSink<T> for RefHandle<T> {
    fn assign(&self, value: T) {
        self.set(value);
    }
}

impl<T: PartialEq + 'static> HandleSink<T> for Setter<T> {
    fn assign(&self, value: T) {
        self.set(value);
    }
}

/// Layout-phase effect that assigns `compute()` into a caller-supplied
/// sink whenever `deps` changed.
pub fn use_imperative_handle<T, D, S>(sink: S, deps: D, compute: impl FnOnce() -> T + 'static)
where
    T: 'static,
    D: PartialEq + 'static,
    S: HandleSink<T> + 'static,
{
    use_layout_effect(deps, move || {
        sink.assign(compute());
        None
    });
}

// ─── Refresh ─────────────────────────────────────────────────────────────────

/// Handle that requests a re-tick of the instance whose tick created it.
/// This is the "request own refresh" primitive renderer-side bindings use.
pub struct Rerun {
    instance: Weak<Instance>,
}

impl Clone for Rerun {
    fn clone(&self) -> Self {
        Self {
            instance: Weak::clone(&self.instance),
        }
    }
}

impl Rerun {
    pub fn request(&self) {
        if let Some(instance) = self.instance.upgrade() {
            instance.request_rerun();
        }
    }
}

/// Refresh handle for the instance currently ticking. Consumes no slot.
pub fn use_rerun() -> Rerun {
    let frame = active_frame("use_rerun");
    Rerun {
        instance: Rc::downgrade(&frame.instance),
    }
}

// ─── Unsupported operations ──────────────────────────────────────────────────

fn unsupported(op: &str) -> ! {
    error!(
        op,
        "operation requires framework-owned scheduling and cannot run in a shared hook body"
    );
    panic!("{op} is not supported inside a shared hook body");
}

/// Unsupported: context reads need a live component tree above the body.
pub fn use_context<T>() -> T {
    unsupported("use_context")
}

/// Unsupported: debug values need framework devtools.
pub fn use_debug_value<T: std::fmt::Debug>(_value: T) {
    unsupported("use_debug_value")
}

/// Unsupported: responder events need framework event plumbing.
pub fn use_responder() {
    unsupported("use_responder")
}

/// Unsupported: deferral needs a framework-owned scheduler.
pub fn use_deferred_value<T>(_value: T) -> T {
    unsupported("use_deferred_value")
}

/// Unsupported: transitions need a framework-owned scheduler.
pub fn use_transition() -> (bool, Callback<()>) {
    unsupported("use_transition")
}
