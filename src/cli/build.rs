//! Build commands.
//!
//! A batch runs in one of two modes, picked once from its target count:
//! - **Single**: one target, run the configured builder directly
//! - **FanOut**: many targets, re-invoke this executable once per target
//!
//! Failed targets never stop their siblings or the follow-up stage; they only
//! turn the final exit status non-zero.

use anyhow::{Result, bail};

use super::Context;
use crate::dispatch::Outcome;
use crate::fanout::{FanOutReport, TargetResult};
use crate::target::{self, NoTargets, TargetDescriptor, TargetError, TargetKind};
use crate::utils::exec::Invocation;
use crate::{debug, log, logger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Single,
    FanOut,
}

impl BuildMode {
    pub const fn select(count: usize) -> Self {
        if count > 1 { Self::FanOut } else { Self::Single }
    }
}

/// Per-target command for one batch, checked once up front.
struct TargetCommand<'a> {
    ctx: &'a Context,
    mode: BuildMode,
}

impl<'a> TargetCommand<'a> {
    fn new(ctx: &'a Context, mode: BuildMode) -> Result<Self> {
        if mode == BuildMode::Single && ctx.config.builder.command.is_empty() {
            bail!("no builder command configured, set `[builder] command`");
        }
        Ok(Self { ctx, mode })
    }

    fn invocation(&self, target: &TargetDescriptor) -> Invocation {
        match self.mode {
            BuildMode::FanOut => {
                let mut args = vec![target.kind().as_str()];
                args.extend(target.invocation_args().iter().map(String::as_str));
                self.ctx.self_invocation(&args)
            }
            BuildMode::Single => self
                .ctx
                .config
                .builder
                .invocation(&self.ctx.config.root, Some(target))
                .unwrap_or_else(|| Invocation::new(String::new())),
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// `page` / `widget`: build the requested targets of one kind.
pub async fn build_kind(ctx: &Context, kind: TargetKind) -> Result<()> {
    let targets = ctx.targets(kind)?;
    if targets.is_empty() {
        return Err(TargetError::NoTargetsSpecified(kind.into()).into());
    }

    let report = build_targets(ctx, &targets).await?;
    finish(&report, None)
}

/// `build`: requested pages, then requested widgets.
pub async fn build_pages_and_widgets(ctx: &Context) -> Result<()> {
    // Resolve both before anything is spawned.
    let pages = ctx.targets(TargetKind::Page)?;
    let widgets = ctx.targets(TargetKind::Widget)?;
    if pages.is_empty() && widgets.is_empty() {
        return Err(TargetError::NoTargetsSpecified(NoTargets::Any).into());
    }

    let mut report = build_targets(ctx, &pages).await?;
    report.merge(build_targets(ctx, &widgets).await?);
    finish(&report, None)
}

/// `all`: every discovered page and widget, then the common stage.
pub async fn build_all(ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let mut targets = target::discover(&config.pages_dir(), TargetKind::Page, config.targets.page_variants)?;
    let pages = targets.len();
    targets.extend(target::discover(&config.widgets_dir(), TargetKind::Widget, false)?);

    log!("all"; "building {} page(s) and {} widget(s)", pages, targets.len() - pages);
    let report = build_targets(ctx, &targets).await?;

    let failed = report.failures().count();
    if failed == 0 {
        log!("all"; "all {} target(s) built, building common", report.len());
    } else {
        log!("all"; "{} of {} target(s) failed, building common", failed, report.len());
    }

    let common = run_common(ctx).await?;
    finish(&report, Some(&common))
}

/// `common`: the shared stage alone.
pub async fn build_common(ctx: &Context) -> Result<()> {
    let outcome = run_common(ctx).await?;
    finish(&FanOutReport::default(), Some(&outcome))
}

// ============================================================================
// Internals
// ============================================================================

async fn build_targets(ctx: &Context, targets: &[TargetDescriptor]) -> Result<FanOutReport> {
    if targets.is_empty() {
        return Ok(FanOutReport::default());
    }

    let mode = BuildMode::select(targets.len());
    let command = TargetCommand::new(ctx, mode)?;
    debug!("build"; "{} target(s) in {:?} mode", targets.len(), mode);

    // A child relays raw builder output; its parent does the reporting.
    if ctx.cli.child && mode == BuildMode::Single {
        return Ok(relay_single(ctx, &targets[0], command.invocation(&targets[0])).await);
    }

    ctx.fan_out().run(targets, |target| command.invocation(target)).await
}

/// Subordinate relay for a `--child` run with one target, not a fan-out:
/// the parent's session owns the per-target report.
async fn relay_single(ctx: &Context, target: &TargetDescriptor, invocation: Invocation) -> FanOutReport {
    let outcome = ctx.dispatcher.run(invocation).await;

    let output = outcome.output.trim_end();
    if !output.is_empty() {
        println!("{output}");
    }
    if let Some(error) = &outcome.error {
        log!("error"; "{}: {}", target.label(), error);
    }

    FanOutReport {
        results: vec![TargetResult {
            target: target.clone(),
            outcome,
        }],
    }
}

async fn run_common(ctx: &Context) -> Result<Outcome> {
    let Some(invocation) = ctx.config.builder.invocation(&ctx.config.root, None) else {
        bail!("no builder command configured, set `[builder] command`");
    };

    debug!("common"; "{}", invocation);
    let outcome = ctx.dispatcher.run(invocation).await;

    if outcome.succeeded {
        let output = ctx.config.builder.output_filter().apply(&outcome.output);
        if !output.is_empty() {
            println!("{output}");
        }
        log!("common"; "Common built.");
    } else {
        log!("error"; "Common failed: {}", outcome.reason());
        let output = outcome.output.trim_end();
        if !output.is_empty() {
            println!("{output}");
        }
    }
    logger::blank();

    Ok(outcome)
}

/// Turn failures into the process exit status, after all stages ran.
fn finish(report: &FanOutReport, common: Option<&Outcome>) -> Result<()> {
    if crate::core::is_shutdown() {
        bail!("interrupted");
    }

    let failed: Vec<String> = report.failures().map(|r| r.target.label()).collect();
    let common_failed = common.is_some_and(|outcome| !outcome.succeeded);

    match (failed.len(), common_failed) {
        (0, false) => Ok(()),
        (0, true) => bail!("common stage failed"),
        (n, common_failed) => bail!(
            "{} of {} target(s) failed{}: {}",
            n,
            report.len(),
            if common_failed { " and the common stage failed" } else { "" },
            failed.join(", ")
        ),
    }
}
