//! Target resolution from CLI strings, config defaults and directory layout.

use super::{TargetDescriptor, TargetError, TargetKind};
use std::fs;
use std::path::Path;

/// Resolve targets of one kind, CLI string first, config defaults second.
///
/// Either source may be empty; an empty result is not an error here since
/// only scope-specific commands treat it as one.
pub fn resolve(
    kind: TargetKind,
    explicit: Option<&str>,
    defaults: &[String],
) -> Result<Vec<TargetDescriptor>, TargetError> {
    match explicit {
        Some(list) => parse_list(kind, list),
        None => defaults
            .iter()
            .map(|item| parse_one(kind, item))
            .collect(),
    }
}

/// Parse a comma-separated `name[/variant]` list.
pub fn parse_list(kind: TargetKind, list: &str) -> Result<Vec<TargetDescriptor>, TargetError> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }
    list.split(',').map(|item| parse_one(kind, item)).collect()
}

fn parse_one(kind: TargetKind, item: &str) -> Result<TargetDescriptor, TargetError> {
    let item = item.trim();
    let mut segments = item.split('/');
    let name = segments.next().unwrap_or_default().trim();
    let variant = segments.next().map(|v| v.trim().to_string());

    if segments.next().is_some() {
        return Err(TargetError::InvalidTarget {
            kind,
            input: item.to_string(),
            reason: "expected `name` or `name/variant`",
        });
    }

    TargetDescriptor::new(kind, name, variant).map_err(|_| TargetError::InvalidTarget {
        kind,
        input: item.to_string(),
        reason: "name is empty",
    })
}

/// Enumerate targets from the immediate subdirectories of `root`.
///
/// With `variants`, each target directory's own subdirectories become one
/// descriptor per `(name, variant)` pair; a directory without any yields a
/// single descriptor without variant. A missing root yields nothing.
pub fn discover(
    root: &Path,
    kind: TargetKind,
    variants: bool,
) -> Result<Vec<TargetDescriptor>, TargetError> {
    if !root.is_dir() {
        crate::debug!("resolve"; "{} root missing: {}", kind, root.display());
        return Ok(Vec::new());
    }

    let mut targets = Vec::new();
    for name in visible_subdirs(root)? {
        let sub = if variants {
            visible_subdirs(&root.join(&name))?
        } else {
            Vec::new()
        };

        if sub.is_empty() {
            targets.push(TargetDescriptor::new(kind, name, None)?);
        } else {
            for variant in sub {
                targets.push(TargetDescriptor::new(kind, name.clone(), Some(variant))?);
            }
        }
    }

    crate::debug!("resolve"; "discovered {} {}(s) in {}", targets.len(), kind, root.display());
    Ok(targets)
}

/// Sorted names of non-hidden subdirectories.
fn visible_subdirs(dir: &Path) -> Result<Vec<String>, TargetError> {
    let entries = fs::read_dir(dir).map_err(|e| TargetError::Io(dir.to_path_buf(), e))?;

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect();

    names.sort();
    Ok(names)
}

// ============================================================================
// Tests
// ============================================================================
