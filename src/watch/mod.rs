//! Watch mode: partition the shared watch config, then watch in place.

mod debounce;
mod plan;
mod runner;

pub use plan::{WatchPlan, WatchScope, WatcherSpec, plan};
pub use runner::{WatchRunner, resolve_groups};
