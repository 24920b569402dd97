//! Build targets: pages and widgets.
//!
//! # Module Structure
//!
//! ```text
//! target/
//! ├── resolve    # explicit lists and directory discovery
//! └── mod.rs     # TargetKind, TargetDescriptor, TargetError (this file)
//! ```

pub mod resolve;

pub use resolve::{discover, resolve};

use std::fmt;
use thiserror::Error;

// ============================================================================
// TargetKind
// ============================================================================

/// Category of an independently buildable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Page,
    Widget,
}

impl TargetKind {
    /// Lowercase name, also the subcommand a child is invoked with.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Widget => "widget",
        }
    }

    /// CLI flag carrying a target of this kind.
    pub const fn flag(self) -> &'static str {
        match self {
            Self::Page => "--page",
            Self::Widget => "--widget",
        }
    }

    /// Capitalized name for per-target report lines.
    pub const fn title(self) -> &'static str {
        match self {
            Self::Page => "Page",
            Self::Widget => "Widget",
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// TargetDescriptor
// ============================================================================

/// One resolved build target.
///
/// Immutable once created; the resolver is the only constructor outside tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetDescriptor {
    kind: TargetKind,
    name: String,
    variant: Option<String>,
    invocation_args: Vec<String>,
}

impl TargetDescriptor {
    /// Build a descriptor, rejecting an empty name.
    pub fn new(
        kind: TargetKind,
        name: impl Into<String>,
        variant: Option<String>,
    ) -> Result<Self, TargetError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(TargetError::InvalidTarget {
                kind,
                input: match &variant {
                    Some(v) => format!("{name}/{v}"),
                    None => name,
                },
                reason: "name is empty",
            });
        }

        let variant = variant.filter(|v| !v.is_empty());
        let spec = match &variant {
            Some(v) => format!("{name}/{v}"),
            None => name.clone(),
        };

        Ok(Self {
            kind,
            name,
            variant,
            invocation_args: vec![kind.flag().to_string(), spec],
        })
    }

    pub const fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_deref()
    }

    /// Arguments selecting this target in a child invocation, e.g. `["--page", "home/v2"]`.
    pub fn invocation_args(&self) -> &[String] {
        &self.invocation_args
    }

    /// `name[/variant]`
    pub fn spec(&self) -> &str {
        &self.invocation_args[1]
    }

    /// `Page: home/v2`
    pub fn label(&self) -> String {
        format!("{}: {}", self.kind.title(), self.spec())
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.spec())
    }
}

// ============================================================================
// TargetError
// ============================================================================

/// Validation failures raised before any process is spawned.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid {kind} target `{input}`: {reason}")]
    InvalidTarget {
        kind: TargetKind,
        input: String,
        reason: &'static str,
    },

    #[error("no {0} specified to build, pass {flag} or set defaults in the config", flag = .0.flag())]
    NoTargetsSpecified(NoTargets),

    #[error("failed to read target directory `{0}`")]
    Io(std::path::PathBuf, #[source] std::io::Error),
}

/// Which scope had nothing to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoTargets {
    Pages,
    Widgets,
    Any,
}

impl NoTargets {
    const fn flag(self) -> &'static str {
        match self {
            Self::Pages => "--page",
            Self::Widgets => "--widget",
            Self::Any => "--page/--widget",
        }
    }
}

impl From<TargetKind> for NoTargets {
    fn from(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Page => Self::Pages,
            TargetKind::Widget => Self::Widgets,
        }
    }
}

impl fmt::Display for NoTargets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pages => "pages",
            Self::Widgets => "widgets",
            Self::Any => "pages or widgets",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_args_and_label() {
        let t = TargetDescriptor::new(TargetKind::Page, "home", Some("v2".into())).unwrap();
        assert_eq!(t.invocation_args(), ["--page", "home/v2"]);
        assert_eq!(t.spec(), "home/v2");
        assert_eq!(t.label(), "Page: home/v2");

        let w = TargetDescriptor::new(TargetKind::Widget, "footer", None).unwrap();
        assert_eq!(w.invocation_args(), ["--widget", "footer"]);
        assert_eq!(w.variant(), None);
    }

    #[test]
    fn test_empty_variant_is_none() {
        let t = TargetDescriptor::new(TargetKind::Page, "home", Some(String::new())).unwrap();
        assert_eq!(t.variant(), None);
        assert_eq!(t.spec(), "home");
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = TargetDescriptor::new(TargetKind::Page, "  ", None).unwrap_err();
        assert!(matches!(err, TargetError::InvalidTarget { .. }));
    }

    #[test]
    fn test_no_targets_message() {
        let err = TargetError::NoTargetsSpecified(NoTargets::Pages);
        let msg = err.to_string();
        assert!(msg.contains("no pages"));
        assert!(msg.contains("--page"));
    }
}
