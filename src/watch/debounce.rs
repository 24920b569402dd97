//! Event debouncing for the watch runner.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::utils::path::normalize_path;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// Collects notify events until the quiet period elapses.
pub struct Debouncer {
    delay: Duration,
    /// Path → ChangeKind (dedup is free via HashMap key uniqueness)
    changes: FxHashMap<PathBuf, ChangeKind>,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            changes: FxHashMap::default(),
            last_event: None,
        }
    }

    /// Add a notify event, applying dedup rules:
    /// - Remove + Create/Modify → Create/Modify (file was restored)
    /// - Modify + Remove → Remove (file was deleted)
    /// - Create + Remove → dropped (never existed for the builder)
    /// - otherwise the first event wins
    pub fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // mtime/chmod noise from the builder itself would loop forever
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }
            self.record(normalize_path(path), kind);
        }
    }

    fn record(&mut self, path: PathBuf, kind: ChangeKind) {
        match (self.changes.get(&path).copied(), kind) {
            (None, _) => {
                crate::debug!("watch"; "{}: {}", kind.label(), path.display());
                self.changes.insert(path, kind);
            }
            (Some(ChangeKind::Removed), ChangeKind::Created | ChangeKind::Modified) => {
                self.changes.insert(path, kind);
            }
            (Some(ChangeKind::Modified), ChangeKind::Removed) => {
                self.changes.insert(path, ChangeKind::Removed);
            }
            (Some(ChangeKind::Created), ChangeKind::Removed) => {
                self.changes.remove(&path);
            }
            _ => return,
        }
        self.last_event = (!self.changes.is_empty()).then(Instant::now);
    }

    pub fn is_ready(&self) -> bool {
        self.last_event
            .is_some_and(|last| last.elapsed() >= self.delay && !self.changes.is_empty())
    }

    /// Take the batch once the quiet period has elapsed.
    pub fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        if !self.is_ready() {
            return None;
        }
        self.last_event = None;
        Some(std::mem::take(&mut self.changes))
    }

    /// Sleep duration until the batch may be ready.
    pub fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        self.delay
            .saturating_sub(last_event.elapsed())
            .max(Duration::from_millis(1))
    }
}

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}
