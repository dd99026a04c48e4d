//! Runtime Configuration
//!
//! Host applications tune the engine through [`RuntimeConfig`]: which
//! structural families may be wrapped, whether frozen objects are skipped, and
//! whether advisory warnings are emitted.

use serde::{Deserialize, Serialize};

use crate::error::ReactivityError;
use crate::value::TargetKind;

/// Settings shared by everything created from one [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Structural families eligible for wrapping.
    pub allowed_kinds: Vec<TargetKind>,

    /// Treat frozen objects as ineligible for wrapping.
    pub skip_frozen: bool,

    /// Emit advisory `tracing` warnings (readonly writes, ineligible wraps,
    /// mixed raw/reactive collection keys).
    pub dev_warnings: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            allowed_kinds: TargetKind::ALL.to_vec(),
            skip_frozen: true,
            dev_warnings: cfg!(debug_assertions),
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ReactivityError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Restrict wrapping to the given structural families.
    pub fn allow_kinds(mut self, kinds: impl IntoIterator<Item = TargetKind>) -> Self {
        self.allowed_kinds = kinds.into_iter().collect();
        self
    }

    pub fn skip_frozen(mut self, skip: bool) -> Self {
        self.skip_frozen = skip;
        self
    }

    pub fn dev_warnings(mut self, enabled: bool) -> Self {
        self.dev_warnings = enabled;
        self
    }

    /// Check whether a structural family may be wrapped.
    pub fn allows(&self, kind: TargetKind) -> bool {
        self.allowed_kinds.contains(&kind)
    }
}
