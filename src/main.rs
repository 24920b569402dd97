//! Bakehouse - parallel build orchestration for page and widget targets.

mod cli;
mod config;
mod core;
mod dispatch;
mod fanout;
mod logger;
mod target;
mod utils;
mod watch;

use anyhow::{Context as _, Result};
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands, Context};
use config::ProjectConfig;
use dispatch::Dispatcher;
use target::TargetKind;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let config = ProjectConfig::load(&cli)?;
    let dispatcher = Dispatcher::new(config.dispatch.max_concurrent);
    core::setup_shutdown_handler(dispatcher.clone())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let ctx = Context::new(cli, config, dispatcher)?;
    runtime.block_on(run(&ctx))
}

async fn run(ctx: &Context) -> Result<()> {
    match ctx.cli.subcommand() {
        Commands::All => cli::build::build_all(ctx).await,
        Commands::Build => cli::build::build_pages_and_widgets(ctx).await,
        Commands::Page => cli::build::build_kind(ctx, TargetKind::Page).await,
        Commands::Widget => cli::build::build_kind(ctx, TargetKind::Widget).await,
        Commands::Common => cli::build::build_common(ctx).await,
        Commands::Watch { watch_for } => cli::watch::watch(ctx, watch_for).await,
    }
}
