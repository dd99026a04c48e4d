//! Dependency Graph
//!
//! This module implements the store that connects sources to the effects
//! reading them.
//!
//! # Overview
//!
//! The graph is a two-level map: `source -> key -> subscriber set`. Each
//! effect additionally remembers every subscriber set it joined (the reverse
//! edge), so cleanup before a re-run does not have to search the graph.
//!
//! - A read inside a running effect *tracks* `(source, key)`.
//! - A write *triggers* `(source, key)`: the affected subscriber sets are
//!   resolved (see [`target_map`]) and their effects are run or handed to
//!   their scheduler.
//!
//! Synthetic keys ([`TrackKey::Iterate`], [`TrackKey::MapKeyIterate`]) stand
//! for interest in the structure of a source rather than a single slot.

mod dep;
mod op;
pub(crate) mod target_map;

pub(crate) use dep::Dep;
pub use op::{TrackKey, TrackOp, TriggerOp};
pub(crate) use target_map::TargetMap;
