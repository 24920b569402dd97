//! `[dispatch]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [dispatch]
//! max_concurrent = 4          # Child builds allowed to run at once
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::dispatch::DEFAULT_MAX_CONCURRENT;
use serde::{Deserialize, Serialize};

/// Child process concurrency settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Ceiling for concurrently running (non-watch) children.
    pub max_concurrent: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

pub struct DispatchConfigFields {
    pub max_concurrent: FieldPath,
}

impl DispatchConfig {
    pub const FIELDS: DispatchConfigFields = DispatchConfigFields {
        max_concurrent: FieldPath::new("dispatch.max_concurrent"),
    };

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.max_concurrent == 0 {
            diag.error_with_hint(
                Self::FIELDS.max_concurrent,
                "must be at least 1",
                format!("the default is {DEFAULT_MAX_CONCURRENT}"),
            );
        }
    }
}
