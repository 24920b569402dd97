//! Configuration section definitions.
//!
//! Each submodule corresponds to a TOML section in `bakehouse.toml`.

mod builder;
mod dispatch;
mod targets;
mod watch;

pub use builder::BuilderConfig;
pub use dispatch::DispatchConfig;
pub use targets::TargetsConfig;
pub use watch::{WatchConfig, WatchGroup};
