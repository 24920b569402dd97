//! Command-line interface module.

mod args;
pub mod build;
pub mod watch;

pub use args::{Cli, Commands};

use anyhow::{Context as _, Result};
use clap::ColorChoice;
use std::path::PathBuf;

use crate::config::ProjectConfig;
use crate::dispatch::Dispatcher;
use crate::fanout::FanOut;
use crate::target::{self, TargetDescriptor, TargetError, TargetKind};
use crate::utils::exec::Invocation;

/// Everything a command needs: parsed CLI, loaded config, shared dispatcher.
pub struct Context {
    pub cli: Cli,
    pub config: ProjectConfig,
    pub dispatcher: Dispatcher,
    self_exe: PathBuf,
}

impl Context {
    pub fn new(cli: Cli, config: ProjectConfig, dispatcher: Dispatcher) -> Result<Self> {
        let self_exe = std::env::current_exe().context("failed to locate the bakehouse executable")?;
        Ok(Self {
            cli,
            config,
            dispatcher,
            self_exe,
        })
    }

    #[cfg(test)]
    pub fn with_self_exe(mut self, exe: impl Into<PathBuf>) -> Self {
        self.self_exe = exe.into();
        self
    }

    /// Targets of `kind`: the CLI list if given, else the configured defaults.
    pub fn targets(&self, kind: TargetKind) -> Result<Vec<TargetDescriptor>, TargetError> {
        let (explicit, defaults) = match kind {
            TargetKind::Page => (self.cli.page.as_deref(), &self.config.targets.pages),
            TargetKind::Widget => (self.cli.widget.as_deref(), &self.config.targets.widgets),
        };
        target::resolve(kind, explicit, defaults)
    }

    /// Re-invoke this executable with `args`, pinned to the same config file.
    pub fn self_invocation<S: AsRef<str>>(&self, args: &[S]) -> Invocation {
        let mut invocation = Invocation::new(self.self_exe.to_string_lossy())
            .args(args)
            .arg("--config")
            .arg(self.config.config_path.to_string_lossy())
            .cwd(&self.config.root);

        if self.cli.verbose {
            invocation = invocation.arg("--verbose");
        }
        match self.cli.color {
            ColorChoice::Always => invocation.args(["--color", "always"]),
            ColorChoice::Never => invocation.args(["--color", "never"]),
            ColorChoice::Auto => invocation,
        }
    }

    /// Fan-out over the shared dispatcher with the builder's output filter.
    pub fn fan_out(&self) -> FanOut {
        FanOut::new(self.dispatcher.clone()).with_filter(self.config.builder.output_filter())
    }
}

#[cfg(test)]
pub(crate) fn test_context(args: &[&str], config: &str) -> Context {
    use clap::Parser;

    let cli = Cli::try_parse_from(std::iter::once("bakehouse").chain(args.iter().copied())).unwrap();
    let mut config = crate::config::test_parse_config(config);
    config.root = PathBuf::from("/shop");
    config.config_path = PathBuf::from("/shop/bakehouse.toml");
    let dispatcher = Dispatcher::new(config.dispatch.max_concurrent);

    Context {
        cli,
        config,
        dispatcher,
        self_exe: PathBuf::from("/usr/bin/bakehouse"),
    }
}
