//! `watch` command: plan the partition, then run it.

use anyhow::Result;
use std::time::Duration;
use tokio::sync::oneshot;

use super::Context;
use crate::dispatch::{DispatchRequest, Outcome, ProcessHandle};
use crate::target::TargetKind;
use crate::watch::{WatchPlan, WatchRunner, WatchScope, WatcherSpec, plan, resolve_groups};
use crate::{debug, log, logger};

/// A forced subordinate watcher and the receiver for its exit.
struct RunningWatcher {
    label: String,
    exit: oneshot::Receiver<Outcome>,
}

pub async fn watch(ctx: &Context, scope: Option<WatchScope>) -> Result<()> {
    let mut targets = ctx.targets(TargetKind::Page)?;
    targets.extend(ctx.targets(TargetKind::Widget)?);

    let mut watch_config = ctx.config.watch.clone();
    let mut watchers = Vec::new();

    match plan(&targets, &mut watch_config, scope) {
        WatchPlan::MultiProcess { watchers: specs } => {
            log!("watch"; "starting {} watchers", specs.len());
            watchers.extend(specs.into_iter().map(|spec| spawn_watcher(ctx, spec)));
        }
        WatchPlan::InPlace {
            active,
            common_watcher,
        } => {
            watchers.extend(common_watcher.map(|spec| spawn_watcher(ctx, spec)));

            let groups = resolve_groups(&ctx.config.root, &watch_config, active.as_ref());
            WatchRunner::new(
                groups,
                ctx.dispatcher.clone(),
                Duration::from_millis(watch_config.debounce_ms),
            )
            .with_filter(ctx.config.builder.output_filter())
            .run()
            .await?;
        }
    }

    for watcher in watchers {
        let Ok(outcome) = watcher.exit.await else {
            continue;
        };
        if !outcome.succeeded && !outcome.is_cancelled() {
            log!("error"; "{} watcher exited: {}", watcher.label, outcome.reason());
        }
    }
    Ok(())
}

/// Dispatch a watcher past the ceiling, streaming its output under its label.
fn spawn_watcher(ctx: &Context, spec: WatcherSpec) -> RunningWatcher {
    let invocation = ctx.self_invocation(&spec.args);
    let (tx, exit) = oneshot::channel();
    let label = spec.label.clone();

    let request = DispatchRequest::new(invocation, move |outcome| {
        let _ = tx.send(outcome);
    })
    .on_start(move |handle| {
        tokio::spawn(stream_lines(label, handle));
    });
    ctx.dispatcher.dispatch(request, true);

    RunningWatcher {
        label: spec.label,
        exit,
    }
}

async fn stream_lines(label: String, mut handle: ProcessHandle) {
    match handle.pid {
        Some(pid) => debug!("watch"; "{} watcher #{} running as pid {}", label, handle.id, pid),
        None => debug!("watch"; "{} watcher #{} running", label, handle.id),
    }
    while let Some(line) = handle.lines.recv().await {
        logger::child_line(&label, &line);
    }
}
