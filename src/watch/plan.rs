//! Watch partitioning: one shared keyed watch config, many target subsets.
//!
//! More than one active target splits the watch into one subordinate watcher
//! per target plus a common watcher. Otherwise this process filters the
//! config down to a single scope and watches it in place.

use clap::ValueEnum;

use crate::config::WatchConfig;
use crate::target::{TargetDescriptor, TargetKind};

/// Category filter selected with `--watch-for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WatchScope {
    Page,
    Widget,
    Common,
}

impl WatchScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Widget => "widget",
            Self::Common => "common",
        }
    }

    /// Watch-group key suffix owned by this scope.
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Page => "_page",
            Self::Widget => "_widget",
            Self::Common => "_common",
        }
    }

    pub fn admits(self, kind: TargetKind) -> bool {
        self == Self::from(kind)
    }
}

impl From<TargetKind> for WatchScope {
    fn from(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Page => Self::Page,
            TargetKind::Widget => Self::Widget,
        }
    }
}

/// A subordinate `watch` invocation of this executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherSpec {
    /// Prefix for the watcher's streamed output.
    pub label: String,
    /// Arguments after the executable.
    pub args: Vec<String>,
}

impl WatcherSpec {
    fn for_target(target: &TargetDescriptor) -> Self {
        let mut args = vec!["watch".to_string()];
        args.extend(target.invocation_args().iter().cloned());
        args.extend(["--watch-for".to_string(), WatchScope::from(target.kind()).as_str().into()]);
        Self {
            label: target.label(),
            args,
        }
    }

    pub fn common() -> Self {
        Self {
            label: "Common".into(),
            args: vec!["watch".into(), "--watch-for".into(), "common".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchPlan {
    /// One forced watcher per active target, plus one for common.
    MultiProcess { watchers: Vec<WatcherSpec> },
    /// Watch the filtered config here.
    InPlace {
        /// Supplies `$BAKE_*` variables for the surviving groups.
        active: Option<TargetDescriptor>,
        common_watcher: Option<WatcherSpec>,
    },
}

/// Decide how to watch `targets` under `scope`.
///
/// For [`WatchPlan::InPlace`], `watch` is filtered to the groups this process
/// owns; it is left untouched otherwise.
pub fn plan(
    targets: &[TargetDescriptor],
    watch: &mut WatchConfig,
    scope: Option<WatchScope>,
) -> WatchPlan {
    let active: Vec<&TargetDescriptor> = targets
        .iter()
        .filter(|target| scope.is_none_or(|scope| scope.admits(target.kind())))
        .collect();

    if active.len() > 1 {
        let mut watchers: Vec<WatcherSpec> =
            active.iter().map(|target| WatcherSpec::for_target(target)).collect();
        watchers.push(WatcherSpec::common());
        return WatchPlan::MultiProcess { watchers };
    }

    let active = active.first().map(|target| (*target).clone());
    let effective = scope
        .or_else(|| active.as_ref().map(|target| target.kind().into()))
        .unwrap_or(WatchScope::Common);

    let dropped = watch.retain_suffix(effective.suffix());
    crate::debug!("watch"; "scope {}: dropped {:?}", effective.as_str(), dropped);

    let common_watcher = (scope.is_none() && active.is_some()).then(WatcherSpec::common);

    WatchPlan::InPlace {
        active,
        common_watcher,
    }
}
