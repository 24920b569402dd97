//! Command-line interface definitions.

use crate::watch::WatchScope;
use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Bakehouse: parallel page/widget build orchestrator
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path, searched upward from the current directory
    #[arg(short = 'C', long, global = true, default_value = "bakehouse.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Comma-separated page targets (`name` or `name/variant`)
    #[arg(short, long, global = true)]
    pub page: Option<String>,

    /// Comma-separated widget targets (`name` or `name/variant`)
    #[arg(short, long, global = true)]
    pub widget: Option<String>,

    /// Maximum concurrent child builds (overrides `dispatch.max_concurrent`)
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Marks a process spawned by another bakehouse process
    #[arg(long, global = true, hide = true, alias = "child-grunt")]
    pub child: bool,

    /// subcommands (default: all)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Build every discovered page and widget, then the common stage
    #[command(visible_alias = "a")]
    All,

    /// Build the requested pages and widgets
    #[command(visible_alias = "b")]
    Build,

    /// Build pages only
    Page,

    /// Build widgets only
    Widget,

    /// Build the shared common stage
    Common,

    /// Watch targets and rebuild on change
    #[command(visible_alias = "w")]
    Watch {
        /// Restrict this process to one watch scope
        #[arg(long = "watch-for", value_enum)]
        watch_for: Option<WatchScope>,
    },
}

impl Cli {
    /// Subcommand to run; `all` when none was given.
    pub fn subcommand(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::All)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bakehouse").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_command_is_all() {
        let cli = parse(&[]);
        assert_eq!(cli.subcommand(), Commands::All);
        assert_eq!(cli.config, PathBuf::from("bakehouse.toml"));
    }

    #[test]
    fn test_target_flags_after_subcommand() {
        let cli = parse(&["page", "--page", "home/v2,list", "-j", "2"]);
        assert_eq!(cli.subcommand(), Commands::Page);
        assert_eq!(cli.page.as_deref(), Some("home/v2,list"));
        assert_eq!(cli.jobs, Some(2));
    }

    #[test]
    fn test_watch_for_scope() {
        let cli = parse(&["watch", "--watch-for", "page", "--page", "home"]);
        assert_eq!(
            cli.subcommand(),
            Commands::Watch {
                watch_for: Some(WatchScope::Page)
            }
        );
    }

    #[test]
    fn test_child_flag_aliases() {
        assert!(parse(&["common", "--child"]).child);
        assert!(parse(&["common", "--child-grunt"]).child);
        assert!(!parse(&["common"]).child);
    }

    #[test]
    fn test_unknown_scope_rejected() {
        let result =
            Cli::try_parse_from(["bakehouse", "watch", "--watch-for", "everything"]);
        assert!(result.is_err());
    }
}
