//! Reactive Primitives
//!
//! This module implements the effect runtime and the single-value cells built
//! on it: signals and computeds.
//!
//! # Concepts
//!
//! ## Runtime
//!
//! The [`Runtime`] is the explicit context every reactive value belongs to.
//! It owns the dependency graph and the effect stack; there is no global
//! state, so independent runtimes never observe each other.
//!
//! ## Effects
//!
//! An [`Effect`] wraps a function. Every tracked read made while it runs
//! subscribes it; every write to a subscribed slot re-runs it (or hands it to
//! its scheduler).
//!
//! ## Signals
//!
//! A [`Signal`] is a mutable single-value cell.
//!
//! ## Computeds
//!
//! A [`Computed`] is a lazily evaluated, cached derivation. It recomputes
//! only when read after one of its inputs changed.

mod computed;
mod context;
mod effect;
mod runtime;
mod signal;

pub use computed::{Computed, ComputedSetter, ComputedState};
pub use context::TrackingGuard;
pub use effect::{
    DebugHook, DebugOp, DebuggerEvent, Effect, EffectOptions, Scheduler, StopHook, SubscriberId,
};
pub use runtime::{Change, Runtime};
pub use signal::{is_ref, unref, Signal};

pub(crate) use runtime::WeakRuntime;
