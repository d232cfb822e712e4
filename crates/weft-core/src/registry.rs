#![forbid(unsafe_code)]

//! Hook identity, the instance registry, and the override layer.
//!
//! A [`SharedHook`] is an opaque, stable identity for one shareable body:
//! an engine-local [`HookId`] is assigned at construction and the registry
//! is keyed by that id, never by comparing function values. Exactly one
//! instance exists per id at any time; it is created lazily on first
//! access, first-ticked before the access returns, and destroyed by
//! [`free`] (all outstanding cleanups run once). The next access after a
//! release builds an entirely fresh instance.
//!
//! The override layer ([`mock`]) forces an instance's observable state
//! without running its body, for test isolation.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use tracing::debug;

use crate::bus::Subscription;
use crate::instance::Instance;

// ─── Identity ────────────────────────────────────────────────────────────────

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Engine-local identity of one shared hook body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl HookId {
    fn next() -> Self {
        Self(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value, for diagnostics.
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A stateful body whose internal state is shared identically across all
/// consumers. Cloning duplicates the handle, not the identity: all clones
/// name the same instance.
pub struct SharedHook<T> {
    id: HookId,
    body: Rc<dyn Fn() -> T>,
}

impl<T> Clone for SharedHook<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            body: Rc::clone(&self.body),
        }
    }
}

impl<T: Clone + 'static> SharedHook<T> {
    pub fn new(body: impl Fn() -> T + 'static) -> Self {
        Self {
            id: HookId::next(),
            body: Rc::new(body),
        }
    }

    #[must_use]
    pub fn id(&self) -> HookId {
        self.id
    }

    fn erased_body(&self) -> Rc<dyn Fn() -> Rc<dyn Any>> {
        let body = Rc::clone(&self.body);
        Rc::new(move || Rc::new(body()) as Rc<dyn Any>)
    }
}

// ─── Registry ────────────────────────────────────────────────────────────────

thread_local! {
    static INSTANCES: RefCell<AHashMap<HookId, Rc<Instance>>> = RefCell::new(AHashMap::new());
}

fn lookup(id: HookId) -> Option<Rc<Instance>> {
    INSTANCES.with(|map| map.borrow().get(&id).cloned())
}

fn get_or_create<T: Clone + 'static>(hook: &SharedHook<T>) -> Rc<Instance> {
    if let Some(instance) = lookup(hook.id) {
        return instance;
    }
    let instance = Instance::new(hook.id, hook.erased_body());
    INSTANCES.with(|map| map.borrow_mut().insert(hook.id, Rc::clone(&instance)));
    debug!(hook = hook.id.raw(), "instance created");
    instance.tick();
    instance
}

/// Read the current value, creating the instance (and running its first
/// tick) if absent. While the instance is overridden this returns the
/// forced value.
pub fn get<T: Clone + 'static>(hook: &SharedHook<T>) -> T {
    let instance = get_or_create(hook);
    let value = instance.value().and_then(|v| v.downcast::<T>().ok());
    match value {
        Some(value) => (*value).clone(),
        None => panic!("shared hook {} has no settled value", hook.id.raw()),
    }
}

/// Subscribe to settled values, creating the instance if absent. The
/// listener fires once per settled tick; dropping the returned
/// [`Subscription`] unsubscribes.
pub fn on<T, F>(hook: &SharedHook<T>, listener: F) -> Subscription
where
    T: Clone + 'static,
    F: Fn(&T) + 'static,
{
    let instance = get_or_create(hook);
    instance.bus.subscribe(Rc::new(move |value: &dyn Any| {
        if let Some(value) = value.downcast_ref::<T>() {
            listener(value);
        }
    }))
}

fn release(id: HookId) {
    let instance = INSTANCES.with(|map| map.borrow_mut().remove(&id));
    if let Some(instance) = instance {
        debug!(hook = id.raw(), "instance released");
        instance.run_cleanups();
    }
}

/// Release the hook's instance: run every outstanding cleanup once and
/// remove the registry entry. A later access starts from the body's
/// initial state.
pub fn free<T>(hook: &SharedHook<T>) {
    release(hook.id);
}

/// Release every live instance.
pub fn free_all() {
    let drained: Vec<Rc<Instance>> =
        INSTANCES.with(|map| map.borrow_mut().drain().map(|(_, instance)| instance).collect());
    for instance in drained {
        debug!(hook = instance.id.raw(), "instance released");
        instance.run_cleanups();
    }
}

// ─── Override layer ──────────────────────────────────────────────────────────

/// Force the hook's observable state without running its body.
///
/// If no instance exists one is created in an overridden state and the real
/// body is never invoked; if one exists it switches to overridden and
/// subscribers are notified with the forced value immediately, without a
/// tick. The override lasts until the returned guard is dropped or
/// [`released`](MockGuard::release), which re-runs the real body and
/// notifies with the recomputed value.
pub fn mock<T: Clone + 'static>(hook: &SharedHook<T>, value: T) -> MockGuard {
    let forced: Rc<dyn Any> = Rc::new(value);
    debug!(hook = hook.id.raw(), "override installed");
    match lookup(hook.id) {
        Some(instance) => {
            instance.set_override(Rc::clone(&forced));
            instance.bus.notify(forced.as_ref());
        }
        None => {
            let instance = Instance::new(hook.id, hook.erased_body());
            instance.set_override(forced);
            INSTANCES.with(|map| map.borrow_mut().insert(hook.id, instance));
        }
    }
    MockGuard {
        id: hook.id,
        armed: true,
    }
}

/// RAII override guard returned by [`mock`]; dropping it unmocks.
pub struct MockGuard {
    id: HookId,
    armed: bool,
}

impl MockGuard {
    /// Clear the override now: the real body re-runs and subscribers are
    /// notified with the recomputed value.
    pub fn release(mut self) {
        self.unmock();
    }

    fn unmock(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        // try_with: the guard may be dropped during thread teardown, after
        // the registry itself is gone.
        let instance = INSTANCES
            .try_with(|map| map.borrow().get(&self.id).cloned())
            .ok()
            .flatten();
        if let Some(instance) = instance {
            if instance.is_overridden() {
                debug!(hook = self.id.raw(), "override cleared");
                instance.clear_override();
                instance.request_rerun();
            }
        }
    }
}

impl Drop for MockGuard {
    fn drop(&mut self) {
        self.unmock();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
