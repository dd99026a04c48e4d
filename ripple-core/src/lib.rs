//! Ripple Core
//!
//! A fine-grained reactivity engine: transparent dependency tracking over
//! plain data, with automatic re-execution of the computations that read it.
//! It implements:
//!
//! - A dependency graph keyed by `(source, key)`
//! - An effect runtime (effect stack, tracking toggle, schedulers, stop)
//! - Tracked views over records, arrays, maps and sets, in mutable,
//!   readonly and shallow variants
//! - Signals and lazily cached computed values
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: the dynamic value model and raw, untracked objects
//! - `graph`: operation taxonomy and the `source -> key -> effects` store
//! - `reactive`: the [`Runtime`], effects, signals and computeds
//! - `proxy`: the interception layer that tracks reads and triggers writes
//! - `registry`: wrapping, unwrapping and the identity predicates
//!
//! # Example
//!
//! ```rust,ignore
//! use ripple_core::{Obj, Runtime, Value};
//!
//! let rt = Runtime::new();
//! let state = rt.reactive(Obj::record_from([("count", 0)]));
//! let view = state.as_reactive().unwrap().clone();
//!
//! rt.effect({
//!     let view = view.clone();
//!     move || println!("count is {:?}", view.get("count"))
//! });
//!
//! // Effect automatically runs, prints: "count is 1"
//! view.set("count", 1);
//! ```

/// Emit a `tracing` warning when the runtime has advisory warnings enabled.
macro_rules! dev_warn {
    ($rt:expr, $($arg:tt)+) => {
        if $rt.warnings_enabled() {
            tracing::warn!($($arg)+);
        }
    };
}

pub(crate) use dev_warn;

pub mod config;
pub mod error;
pub mod graph;
pub mod proxy;
pub mod reactive;
pub mod registry;
pub mod value;

pub use config::RuntimeConfig;
pub use error::ReactivityError;
pub use graph::{TrackKey, TrackOp, TriggerOp};
pub use proxy::{Mode, Reactive, ReactiveEntries, ReactiveFlag, ReactiveIter};
pub use reactive::{
    is_ref, unref, Change, Computed, ComputedState, DebugOp, DebuggerEvent, Effect,
    EffectOptions, Runtime, Signal, SubscriberId, TrackingGuard,
};
pub use registry::{is_proxy, is_reactive, is_readonly, is_shallow, mark_raw, to_raw};
pub use value::{
    has_changed, Obj, ObjectId, PropKey, Symbol, TargetKind, Value, WellKnownSymbol,
    MAX_ARRAY_LENGTH,
};
