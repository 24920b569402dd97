//! `[watch]` section configuration.
//!
//! Watch groups are keyed tables whose key suffix (`_page`, `_widget`,
//! `_common`) tells which scope they belong to. Paths and command support
//! `$BAKE_*` variables of the target being watched.
//!
//! # Example
//!
//! ```toml
//! [watch]
//! debounce_ms = 300
//!
//! [watch.groups.less_page]
//! paths = ["src/pages/$BAKE_NAME"]
//! command = ["npx", "grunt", "page", "--page", "$BAKE_TARGET"]
//!
//! [watch.groups.lib_common]
//! paths = ["src/common"]
//! command = ["npx", "grunt", "common"]
//! ```

use crate::config::{ConfigDiagnostics, FieldPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Shared, keyed watch specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Quiet period before a batch of changes is acted on.
    pub debounce_ms: u64,
    pub groups: BTreeMap<String, WatchGroup>,
}

/// One watch group: paths to observe and the command to rerun.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchGroup {
    pub paths: Vec<String>,
    pub command: Vec<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            groups: BTreeMap::new(),
        }
    }
}

pub struct WatchConfigFields {
    pub groups: FieldPath,
}

impl WatchConfig {
    pub const FIELDS: WatchConfigFields = WatchConfigFields {
        groups: FieldPath::new("watch.groups"),
    };

    /// Drop every group whose key does not end with `suffix`.
    ///
    /// Returns the removed keys.
    pub fn retain_suffix(&mut self, suffix: &str) -> Vec<String> {
        let removed: Vec<String> = self
            .groups
            .keys()
            .filter(|key| !key.ends_with(suffix))
            .cloned()
            .collect();
        for key in &removed {
            self.groups.remove(key);
        }
        removed
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        for (key, group) in &self.groups {
            if group.command.is_empty() {
                diag.error(Self::FIELDS.groups, format!("`{key}` has an empty command"));
            }
            if group.paths.is_empty() {
                diag.error(Self::FIELDS.groups, format!("`{key}` has no paths to watch"));
            }
        }
    }
}
