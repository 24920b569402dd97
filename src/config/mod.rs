//! Project configuration management for `bakehouse.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── builder    # [builder]
//! │   ├── dispatch   # [dispatch]
//! │   ├── targets    # [targets]
//! │   └── watch      # [watch] and [watch.groups.*]
//! ├── types/         # ConfigError, ConfigDiagnostics, FieldPath
//! └── mod.rs         # ProjectConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section              | Purpose                                        |
//! |----------------------|------------------------------------------------|
//! | `[dispatch]`         | Concurrency ceiling for child builds           |
//! | `[builder]`          | External command that builds one target        |
//! | `[targets]`          | Default target lists and discovery directories |
//! | `[watch]`            | Debounce and keyed watch groups                |

pub mod section;
pub mod types;
mod util;

pub use section::{BuilderConfig, DispatchConfig, TargetsConfig, WatchConfig};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};
use util::find_config_file;

use crate::cli::{Cli, Commands};
use crate::log;
use crate::utils::path::{normalize_path, resolve_in_root};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure for `bakehouse.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Absolute path of the loaded config file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root (config file's parent directory)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub builder: BuilderConfig,

    #[serde(default)]
    pub targets: TargetsConfig,

    #[serde(default)]
    pub watch: WatchConfig,
}

impl ProjectConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd for the config file; the project root is the
    /// file's parent directory.
    pub fn load(cli: &Cli) -> Result<Self> {
        let path = find_config_file(&cli.config)
            .ok_or_else(|| ConfigError::NotFound(cli.config.clone()))?;

        let mut config = Self::from_path(&path, !cli.child)?;
        config.config_path = normalize_path(&path);
        config.root = config
            .config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        if let Some(jobs) = cli.jobs {
            config.dispatch.max_concurrent = jobs;
        }

        // Children would repeat every warning their parent already printed.
        let diag = config.diagnose(&cli.subcommand());
        if !cli.child {
            diag.print_warnings();
        }
        Self::into_result(diag)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path, report_unknown: bool) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;

        // Children inherit the parent's config; warn once, in the parent.
        if report_unknown && !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {}, ignoring:", display_path);
        for field in fields {
            eprintln!("- {}", field);
        }
    }

    /// Join a config-relative path onto the project root.
    pub fn root_join(&self, raw: &str) -> PathBuf {
        resolve_in_root(&self.root, raw)
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.root_join(&self.targets.pages_dir)
    }

    pub fn widgets_dir(&self) -> PathBuf {
        self.root_join(&self.targets.widgets_dir)
    }

    /// Validate configuration for `command`.
    ///
    /// Collects all errors and warnings so they are reported at once.
    fn diagnose(&self, command: &Commands) -> ConfigDiagnostics {
        let mut diag = ConfigDiagnostics::new();

        self.dispatch.validate(&mut diag);
        self.watch.validate(&mut diag);

        // Watch runs groups, not the builder.
        if !matches!(command, Commands::Watch { .. }) {
            self.builder.validate(&self.root, &mut diag);
        }
        diag
    }

    fn into_result(diag: ConfigDiagnostics) -> Result<()> {
        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse config, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> ProjectConfig {
    let (parsed, ignored) = ProjectConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

// ============================================================================
// tests
// ============================================================================
