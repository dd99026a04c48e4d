//! Error types for the reactivity engine.
//!
//! The engine's public operations never fail hard: ineligible wraps return the
//! value unchanged and readonly writes are swallowed with a warning. The
//! `try_*` variants surface the underlying condition as a [`ReactivityError`]
//! for callers that want to branch on it.

use thiserror::Error;

use crate::value::TargetKind;

/// Conditions the engine recovers from locally.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReactivityError {
    /// Only composite values (records, arrays, collections) can be wrapped.
    #[error("value cannot be made reactive: {0} is not a composite object")]
    NotComposite(&'static str),

    /// The object was opted out with `mark_raw`.
    #[error("object #{0} is marked raw and cannot be made reactive")]
    MarkedRaw(u64),

    /// Frozen objects are ineligible when `skip_frozen` is set.
    #[error("object #{0} is frozen and cannot be made reactive")]
    Frozen(u64),

    /// The structural family is not in the runtime's allow-list.
    #[error("{0:?} objects are not in the reactive allow-list")]
    KindNotAllowed(TargetKind),

    /// A computed without a setter was written.
    #[error("write operation failed: computed value is readonly")]
    ReadonlyComputed,

    /// The runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}
