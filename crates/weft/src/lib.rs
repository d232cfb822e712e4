#![forbid(unsafe_code)]

//! Public facade for the weft shared-hook engine.
//!
//! Define a shared body once, then consume it from anywhere:
//!
//! ```
//! use weft::prelude::*;
//!
//! #[derive(Clone)]
//! struct Counter {
//!     count: i32,
//!     set: Setter<i32>,
//! }
//!
//! let counter = SharedHook::new(|| {
//!     let (count, set) = use_state(|| 0);
//!     Counter { count, set }
//! });
//!
//! get(&counter).set.update(|c| c + 1);
//! assert_eq!(get(&counter).count, 1);
//! # free(&counter);
//! ```
//!
//! On top of the engine this crate adds the two consumer-side bindings:
//! [`bind`] for hosts that drive their own refresh, and [`use_shared`] for
//! consuming one shared body from inside another.

pub use weft_core::{
    Always, Callback, Cleanup, Dispatch, HandleSink, HookId, MockGuard, RefHandle, Rerun, Setter,
    SharedHook, Subscription, cleanup, free, free_all, get, mock, on, use_callback, use_context,
    use_debug_value, use_deferred_value, use_effect, use_imperative_handle, use_layout_effect,
    use_memo, use_reducer, use_ref, use_rerun, use_responder, use_state, use_transition,
};

pub mod prelude {
    pub use crate::{
        Always, Binding, Callback, Cleanup, Dispatch, HandleSink, MockGuard, RefHandle, Rerun,
        Setter, SharedHook, Subscription, bind, cleanup, free, free_all, get, mock, on,
        use_callback, use_effect, use_imperative_handle, use_layout_effect, use_memo, use_reducer,
        use_ref, use_rerun, use_shared, use_state,
    };
}

/// Consumer-side adapter for hosts without a hooks protocol of their own.
///
/// Construction subscribes to the instance; every settled tick invokes the
/// host-supplied refresh callback; dropping the binding unsubscribes.
pub struct Binding<T> {
    hook: SharedHook<T>,
    _subscription: Subscription,
}

/// Bind a consumer to a shared hook: subscribes on creation (creating and
/// first-ticking the instance if absent) and calls `refresh` once per
/// settled notification so the consumer can re-read [`Binding::get`].
pub fn bind<T: Clone + 'static>(hook: &SharedHook<T>, refresh: impl Fn() + 'static) -> Binding<T> {
    let subscription = on(hook, move |_| refresh());
    Binding {
        hook: hook.clone(),
        _subscription: subscription,
    }
}

impl<T: Clone + 'static> Binding<T> {
    /// Current settled value of the bound instance.
    #[must_use]
    pub fn get(&self) -> T {
        get(&self.hook)
    }

    #[must_use]
    pub fn hook(&self) -> &SharedHook<T> {
        &self.hook
    }
}

/// Consume one shared hook from inside another shared body.
///
/// Subscribes the consuming instance to the source (one slot, effect-
/// keyed by the source's identity) so it re-ticks whenever the source
/// settles, and returns the source's current value. The subscription is
/// torn down by the consuming instance's release.
pub fn use_shared<T: Clone + 'static>(hook: &SharedHook<T>) -> T {
    let rerun = use_rerun();
    let source = hook.clone();
    use_effect(hook.id(), move || {
        let subscription = on(&source, move |_| rerun.request());
        cleanup(move || drop(subscription))
    });
    get(hook)
}
