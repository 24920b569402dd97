//! `$BAKE_*` variables for builder commands and watch groups.

use crate::target::TargetDescriptor;
use rustc_hash::FxHashMap;
use std::path::Path;

/// Variables known to builder templates.
pub type Vars = FxHashMap<String, String>;

/// Build the `$BAKE_*` variables for a target (or for the common stage).
pub fn build_vars(root: &Path, target: Option<&TargetDescriptor>) -> Vars {
    let mut vars = Vars::default();

    vars.insert("BAKE_ROOT".into(), root.display().to_string());

    let (kind, name, variant, spec) = match target {
        Some(t) => (
            t.kind().as_str(),
            t.name(),
            t.variant().unwrap_or_default(),
            t.spec(),
        ),
        None => ("common", "", "", ""),
    };
    vars.insert("BAKE_KIND".into(), kind.into());
    vars.insert("BAKE_NAME".into(), name.into());
    vars.insert("BAKE_VARIANT".into(), variant.into());
    vars.insert("BAKE_TARGET".into(), spec.into());

    vars
}

/// Replace occurrences of `$BAKE_XXX` with values from `vars`.
///
/// Longer keys are substituted first so `$BAKE_TARGET` never gets clipped
/// by a shorter key sharing its prefix.
pub fn resolve_str(input: &str, vars: &Vars) -> String {
    let mut keys: Vec<&String> = vars.keys().collect();
    keys.sort_by_key(|k| std::cmp::Reverse(k.len()));

    let mut result = input.to_string();
    for key in keys {
        let pattern = format!("${key}");
        if result.contains(&pattern) {
            result = result.replace(&pattern, &vars[key]);
        }
    }
    result
}

/// Resolve every argument of a template.
pub fn resolve_args(args: &[String], vars: &Vars) -> Vec<String> {
    args.iter().map(|arg| resolve_str(arg, vars)).collect()
}

// ============================================================================
// Tests
// ============================================================================
