//! `[builder]` section configuration.
//!
//! The builder is the external command that builds exactly one target, or the
//! common stage. Arguments support `$BAKE_*` variable substitution.
//!
//! # Example
//!
//! ```toml
//! [builder]
//! command = ["npx", "grunt"]
//! page = ["page", "--page", "$BAKE_TARGET"]
//! widget = ["widget", "--widget", "$BAKE_TARGET"]
//! common = ["common"]
//! skip_output = ["Done, without errors."]
//! ```
//!
//! Every child also receives a trailing `--child` flag.

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::target::{TargetDescriptor, TargetKind};
use crate::utils::exec::{FilterRule, Invocation};
use crate::utils::vars::{build_vars, resolve_args};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// External per-target build command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Program and leading arguments.
    pub command: Vec<String>,
    /// Arguments appended for a page target.
    pub page: Vec<String>,
    /// Arguments appended for a widget target.
    pub widget: Vec<String>,
    /// Arguments appended for the common stage.
    pub common: Vec<String>,
    /// Output line prefixes dropped from successful build logs.
    pub skip_output: Vec<String>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            page: vec!["page".into(), "--page".into(), "$BAKE_TARGET".into()],
            widget: vec!["widget".into(), "--widget".into(), "$BAKE_TARGET".into()],
            common: vec!["common".into()],
            skip_output: vec!["Done, without errors.".into()],
        }
    }
}

pub struct BuilderConfigFields {
    pub command: FieldPath,
}

impl BuilderConfig {
    pub const FIELDS: BuilderConfigFields = BuilderConfigFields {
        command: FieldPath::new("builder.command"),
    };

    /// Invocation building `target`, or the common stage for `None`.
    ///
    /// Returns `None` when no builder command is configured.
    pub fn invocation(&self, root: &Path, target: Option<&TargetDescriptor>) -> Option<Invocation> {
        let vars = build_vars(root, target);
        let stage = match target.map(TargetDescriptor::kind) {
            Some(TargetKind::Page) => &self.page,
            Some(TargetKind::Widget) => &self.widget,
            None => &self.common,
        };

        let command = resolve_args(&self.command, &vars);
        let invocation = Invocation::from_slice(&command)?
            .args(resolve_args(stage, &vars))
            .cwd(root)
            .envs(&vars);
        Some(invocation)
    }

    pub fn output_filter(&self) -> FilterRule {
        FilterRule::new(self.skip_output.iter().cloned())
    }

    pub fn validate(&self, root: &Path, diag: &mut ConfigDiagnostics) {
        let Some(program) = self.command.first() else {
            diag.error_with_hint(
                Self::FIELDS.command,
                "no builder command configured",
                "e.g. command = [\"npx\", \"grunt\"]",
            );
            return;
        };

        if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
            if !root.join(program).exists() && !Path::new(program).exists() {
                diag.warn(Self::FIELDS.command, format!("`{program}` does not exist"));
            }
        } else if !program.starts_with('$') && which::which(program).is_err() {
            diag.warn(Self::FIELDS.command, format!("`{program}` not found in PATH"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigDiagnostics, test_parse_config};

    #[test]
    fn test_builder_defaults() {
        let config = test_parse_config("");
        assert!(config.builder.command.is_empty());
        assert_eq!(config.builder.common, ["common"]);
        assert!(config.builder.invocation(Path::new("/site"), None).is_none());
    }

    #[test]
    fn test_builder_page_invocation() {
        let config = test_parse_config("[builder]\ncommand = [\"npx\", \"grunt\"]");
        let target = TargetDescriptor::new(TargetKind::Page, "home", Some("v2".into())).unwrap();
        let inv = config
            .builder
            .invocation(Path::new("/site"), Some(&target))
            .unwrap();

        assert_eq!(inv.program(), "npx");
        assert_eq!(inv.arguments(), ["grunt", "page", "--page", "home/v2"]);
    }

    #[test]
    fn test_builder_common_invocation() {
        let config = test_parse_config(
            "[builder]\ncommand = [\"make\"]\ncommon = [\"-C\", \"$BAKE_ROOT/common\"]",
        );
        let inv = config.builder.invocation(Path::new("/site"), None).unwrap();
        assert_eq!(inv.to_string(), "make -C /site/common");
    }

    #[test]
    fn test_builder_validate_empty_command() {
        let config = test_parse_config("");
        let mut diag = ConfigDiagnostics::new();
        config.builder.validate(Path::new("/site"), &mut diag);
        assert!(diag.has_errors());
    }

    #[test]
    fn test_builder_validate_missing_program_warns() {
        let config = test_parse_config("[builder]\ncommand = [\"bakehouse-missing-builder-xyz\"]");
        let mut diag = ConfigDiagnostics::new();
        config.builder.validate(Path::new("/site"), &mut diag);
        assert!(!diag.has_errors());
        assert_eq!(diag.warnings().len(), 1);
        assert_eq!(diag.warnings()[0].0, BuilderConfig::FIELDS.command);
    }
}
