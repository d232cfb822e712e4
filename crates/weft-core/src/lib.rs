#![forbid(unsafe_code)]

//! Core engine for sharing one stateful hook body across many consumers.
//!
//! A [`SharedHook`] names a stateful function whose internal state (state
//! cells, effects, memoized values, refs, reducers) must be observed
//! identically by every consumer. The engine runs that body outside any
//! per-component lifecycle and keeps all consumers synchronized:
//!
//! - [`hooks`]: the stateful operations a body may call ([`use_state`],
//!   [`use_effect`], [`use_memo`], ...), resolved against the ambient
//!   dispatch frame.
//! - `frame` (internal): the per-tick dispatch frame — slot cursor and the
//!   two effect queues — kept on a thread-local stack so nested ticks of
//!   different instances save and restore each other correctly.
//! - `instance` (internal): the tick driver. One tick runs the body, flushes
//!   layout-phase then deferred-phase effects, and coalesces reentrant
//!   update requests through an `Idle → Running → PendingRerun` state
//!   machine before notifying subscribers exactly once.
//! - [`registry`]: lazy id-keyed instance creation, release ([`free`]),
//!   external reads ([`get`]), subscriptions ([`on`]) and the test override
//!   layer ([`mock`]).
//!
//! # Invariants
//!
//! 1. Exactly one live instance exists per hook identity; all consumers
//!    observe the same instance.
//! 2. Slot position is the sole identity: a body must call hook operations
//!    in the same order and count on every tick (caller contract, not
//!    validated at runtime).
//! 3. Subscribers observe only fully settled state — every setter fired
//!    while a tick is running is folded into that same tick, and one
//!    notification is delivered per settled tick.
//! 4. No effect runs while the body is still constructing its return value.
//!
//! # Concurrency
//!
//! Execution is single-threaded and cooperative (`Rc`/`RefCell`/`Cell`
//! throughout). The only concurrency concept is reentrancy, handled by the
//! tick state machine rather than locks; nothing here suspends or blocks.

pub mod bus;
pub mod deps;
mod frame;
pub mod hooks;
mod instance;
pub mod registry;
mod slot;

pub use bus::Subscription;
pub use deps::Always;
pub use hooks::{
    Callback, Cleanup, Dispatch, HandleSink, RefHandle, Rerun, Setter, cleanup, use_callback,
    use_context, use_debug_value, use_deferred_value, use_effect, use_imperative_handle,
    use_layout_effect, use_memo, use_reducer, use_ref, use_rerun, use_responder, use_state,
    use_transition,
};
pub use registry::{HookId, MockGuard, SharedHook, free, free_all, get, mock, on};
