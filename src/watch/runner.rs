//! In-place watch runner.
//!
//! ```text
//! notify → bridge thread → Debouncer → matching groups → Dispatcher
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::debounce::Debouncer;
use crate::config::WatchConfig;
use crate::dispatch::Dispatcher;
use crate::target::TargetDescriptor;
use crate::utils::exec::{FilterRule, Invocation};
use crate::utils::path::{normalize_path, resolve_in_root};
use crate::utils::vars::{build_vars, resolve_args, resolve_str};
use crate::{debug, log};

/// A watch group with variables substituted and paths resolved.
#[derive(Debug, Clone)]
pub struct ResolvedGroup {
    pub key: String,
    pub paths: Vec<PathBuf>,
    pub invocation: Invocation,
}

impl ResolvedGroup {
    fn owns(&self, changed: &Path) -> bool {
        self.paths.iter().any(|root| changed.starts_with(root))
    }
}

/// Resolve every group of `watch` for `active` (or the common stage).
///
/// Groups with an empty command are skipped.
pub fn resolve_groups(
    root: &Path,
    watch: &WatchConfig,
    active: Option<&TargetDescriptor>,
) -> Vec<ResolvedGroup> {
    let vars = build_vars(root, active);

    watch
        .groups
        .iter()
        .filter_map(|(key, group)| {
            let command = resolve_args(&group.command, &vars);
            let invocation = Invocation::from_slice(&command)?.cwd(root).envs(&vars);
            let paths = group
                .paths
                .iter()
                .map(|raw| normalize_path(&resolve_in_root(root, &resolve_str(raw, &vars))))
                .collect();
            Some(ResolvedGroup {
                key: key.clone(),
                paths,
                invocation,
            })
        })
        .collect()
}

/// Groups owning at least one of `changed`, in key order.
pub fn affected_groups<'a, I>(groups: &'a [ResolvedGroup], changed: I) -> Vec<&'a ResolvedGroup>
where
    I: IntoIterator,
    I::Item: AsRef<Path>,
{
    let changed: Vec<I::Item> = changed.into_iter().collect();
    groups
        .iter()
        .filter(|group| changed.iter().any(|path| group.owns(path.as_ref())))
        .collect()
}

/// Watches resolved groups and reruns their commands on change.
pub struct WatchRunner {
    groups: Vec<ResolvedGroup>,
    dispatcher: Dispatcher,
    filter: FilterRule,
    debounce: Duration,
}

impl WatchRunner {
    pub fn new(groups: Vec<ResolvedGroup>, dispatcher: Dispatcher, debounce: Duration) -> Self {
        Self {
            groups,
            dispatcher,
            filter: FilterRule::default(),
            debounce,
        }
    }

    pub fn with_filter(mut self, filter: FilterRule) -> Self {
        self.filter = filter;
        self
    }

    /// Run until the dispatcher is cancelled.
    pub async fn run(self) -> Result<()> {
        if self.groups.is_empty() {
            log!("watch"; "no watch groups to run");
            return Ok(());
        }

        let (notify_tx, notify_rx) = std::sync::mpsc::channel();
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })
        .context("failed to create file watcher")?;

        let mut watched = 0;
        for group in &self.groups {
            for path in &group.paths {
                if !path.exists() {
                    debug!("watch"; "[{}] skipping missing {}", group.key, path.display());
                    continue;
                }
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .with_context(|| format!("failed to watch {}", path.display()))?;
                watched += 1;
            }
        }

        let keys: Vec<&str> = self.groups.iter().map(|g| g.key.as_str()).collect();
        log!("watch"; "watching {} path(s) for {}", watched, keys.join(", "));

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        let mut debouncer = Debouncer::new(self.debounce);
        let cancelled = self.dispatcher.cancelled();
        tokio::pin!(cancelled);

        loop {
            tokio::select! {
                biased;
                _ = &mut cancelled => break,
                Some(event) = async_rx.recv() => debouncer.add_event(&event),
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    if let Some(changes) = debouncer.take_if_ready() {
                        self.rerun(changes.keys()).await;
                    }
                }
            }
        }

        drop(watcher);
        debug!("watch"; "runner stopped");
        Ok(())
    }

    async fn rerun<I>(&self, changed: I)
    where
        I: IntoIterator,
        I::Item: AsRef<Path>,
    {
        for group in affected_groups(&self.groups, changed) {
            log!("watch"; "{}: {}", group.key, group.invocation);
            let outcome = self.dispatcher.run(group.invocation.clone()).await;

            if outcome.is_cancelled() {
                return;
            }
            if outcome.succeeded {
                let output = self.filter.apply(&outcome.output);
                if !output.is_empty() {
                    println!("{output}");
                }
                log!("watch"; "{} done", group.key);
            } else {
                log!("error"; "{} failed: {}", group.key, outcome.reason());
                let output = outcome.output.trim_end();
                if !output.is_empty() {
                    println!("{output}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::section::WatchGroup;
    use crate::target::TargetKind;
    use tempfile::TempDir;

    fn group(paths: &[&str], command: &[&str]) -> WatchGroup {
        WatchGroup {
            paths: paths.iter().map(|s| s.to_string()).collect(),
            command: command.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_resolve_groups_substitutes_vars() {
        let dir = TempDir::new().unwrap();
        let root = normalize_path(dir.path());
        let mut watch = WatchConfig::default();
        watch.groups.insert(
            "less_page".into(),
            group(&["src/pages/$BAKE_NAME"], &["grunt", "page", "--page", "$BAKE_TARGET"]),
        );

        let target = TargetDescriptor::new(TargetKind::Page, "home", Some("v2".into())).unwrap();
        let groups = resolve_groups(&root, &watch, Some(&target));

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].paths, [root.join("src/pages/home")]);
        assert_eq!(groups[0].invocation.arguments(), ["page", "--page", "home/v2"]);
    }

    #[test]
    fn test_resolve_groups_skips_empty_command() {
        let mut watch = WatchConfig::default();
        watch.groups.insert("x_common".into(), group(&["src"], &[]));
        assert!(resolve_groups(Path::new("/site"), &watch, None).is_empty());
    }

    #[test]
    fn test_affected_groups_by_prefix() {
        let mut watch = WatchConfig::default();
        watch.groups.insert("a_common".into(), group(&["/site/src/common"], &["a"]));
        watch.groups.insert("b_common".into(), group(&["/site/src/lib"], &["b"]));
        watch.groups.insert("c_common".into(), group(&["/site/src"], &["c"]));
        let groups = resolve_groups(Path::new("/site"), &watch, None);

        let hit = affected_groups(&groups, [Path::new("/site/src/common/x.less")]);
        let keys: Vec<_> = hit.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, ["a_common", "c_common"]);

        assert!(affected_groups(&groups, [Path::new("/other/file")]).is_empty());
    }

    #[tokio::test]
    async fn test_runner_without_groups_returns() {
        let runner = WatchRunner::new(Vec::new(), Dispatcher::new(1), Duration::ZERO);
        assert!(runner.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_runner_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let root = normalize_path(dir.path());
        let mut watch = WatchConfig::default();
        watch.groups.insert("src_common".into(), group(&["."], &["true"]));
        let groups = resolve_groups(&root, &watch, None);

        let dispatcher = Dispatcher::new(1);
        let handle = tokio::spawn(WatchRunner::new(groups, dispatcher.clone(), Duration::ZERO).run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        dispatcher.cancel_all();

        let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
