//! Bounded process dispatcher.
//!
//! Spawns child processes with a fixed concurrency ceiling:
//!
//! ```text
//! dispatch(req) ─┬─ running < max ──→ spawn ──→ on_start(handle)
//!                │                      │
//!                └─ otherwise ──→ waiting (FIFO)
//!                                       │ exit
//!                                       ▼
//!                    running -= 1 → on_complete(outcome) → yield → admit head
//! ```
//!
//! Forced requests skip the ceiling check but still occupy a slot while they
//! run. They are meant for long-lived watchers that must never queue.
//!
//! Every spawned invocation is marked with [`CHILD_FLAG`] so the child can
//! tell it is a subordinate run.

mod process;
#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};

use crate::utils::exec::Invocation;

/// Default concurrency ceiling.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Marker flag appended to every child invocation.
pub const CHILD_FLAG: &str = "--child";

/// Marker environment variable set on every child.
pub const CHILD_ENV: &str = "BAKEHOUSE_CHILD";

pub type CompleteFn = Box<dyn FnOnce(Outcome) + Send + 'static>;
pub type StartFn = Box<dyn FnOnce(ProcessHandle) + Send + 'static>;

// =============================================================================
// Request / Outcome
// =============================================================================

/// One pending or running child invocation.
pub struct DispatchRequest {
    invocation: Invocation,
    on_complete: CompleteFn,
    on_start: Option<StartFn>,
}

impl DispatchRequest {
    pub fn new<F>(invocation: Invocation, on_complete: F) -> Self
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        Self {
            invocation,
            on_complete: Box::new(on_complete),
            on_start: None,
        }
    }

    /// Called synchronously once the process is running.
    ///
    /// The handle carries a live stream of the child's output lines.
    pub fn on_start<F>(mut self, on_start: F) -> Self
    where
        F: FnOnce(ProcessHandle) + Send + 'static,
    {
        self.on_start = Some(Box::new(on_start));
        self
    }
}

/// Result of one child invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// Dispatcher-assigned request id
    pub id: u64,
    pub succeeded: bool,
    /// `None` when killed by a signal, never started, or cancelled
    pub exit_code: Option<i32>,
    /// stdout and stderr lines in arrival order; only the last
    /// `STREAMED_TAIL_LINES` when the lines were streamed through `on_start`
    pub output: String,
    /// Spawn failure or cancellation reason
    pub error: Option<String>,
}

impl Outcome {
    const CANCELLED: &'static str = "cancelled";

    fn cancelled(id: u64) -> Self {
        Self {
            id,
            succeeded: false,
            exit_code: None,
            output: String::new(),
            error: Some(Self::CANCELLED.into()),
        }
    }

    fn spawn_failed(id: u64, invocation: &Invocation, err: &std::io::Error) -> Self {
        Self {
            id,
            succeeded: false,
            exit_code: None,
            output: String::new(),
            error: Some(format!("failed to spawn `{}`: {err}", invocation.program())),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_deref() == Some(Self::CANCELLED)
    }

    /// Short human-readable failure reason.
    pub fn reason(&self) -> String {
        match (&self.error, self.exit_code) {
            (Some(err), _) => err.clone(),
            (None, Some(code)) => format!("exit code {code}"),
            (None, None) => "terminated by signal".into(),
        }
    }
}

/// Handle given to `on_start` for a running child.
#[derive(Debug)]
pub struct ProcessHandle {
    pub id: u64,
    pub pid: Option<u32>,
    /// Output lines as they arrive; closes when the child's pipes close.
    pub lines: mpsc::UnboundedReceiver<String>,
}

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub running: usize,
    pub waiting: usize,
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Shared, cloneable dispatcher. All clones drive the same state.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    max_concurrent: usize,
    state: Mutex<DispatchState>,
    next_id: AtomicU64,
    cancel: watch::Sender<bool>,
}

#[derive(Default)]
struct DispatchState {
    running: usize,
    waiting: VecDeque<Queued>,
}

struct Queued {
    id: u64,
    request: DispatchRequest,
}

impl Dispatcher {
    /// Create a dispatcher admitting at most `max_concurrent` (min 1) children.
    pub fn new(max_concurrent: usize) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                max_concurrent: max_concurrent.max(1),
                state: Mutex::new(DispatchState::default()),
                next_id: AtomicU64::new(1),
                cancel,
            }),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        let state = self.inner.state.lock();
        DispatchStats {
            running: state.running,
            waiting: state.waiting.len(),
        }
    }

    /// Start `request` now if a slot is free (or `force` is set), else queue it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, request: DispatchRequest, force: bool) {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        if self.is_cancelled() {
            (request.on_complete)(Outcome::cancelled(id));
            return;
        }

        {
            let mut state = self.inner.state.lock();
            // A free slot with a non-empty queue belongs to the queue head.
            let admit = force
                || (state.running < self.inner.max_concurrent && state.waiting.is_empty());
            if !admit {
                state.waiting.push_back(Queued { id, request });
                crate::debug!("dispatch"; "#{} queued ({} waiting)", id, state.waiting.len());
                return;
            }
            state.running += 1;
        }

        self.start(id, request);
    }

    /// Dispatch and get the outcome through a oneshot channel.
    pub fn submit(&self, invocation: Invocation, force: bool) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        let request = DispatchRequest::new(invocation, move |outcome| {
            let _ = tx.send(outcome);
        });
        self.dispatch(request, force);
        rx
    }

    /// Dispatch under the ceiling and wait for the outcome.
    pub async fn run(&self, invocation: Invocation) -> Outcome {
        self.submit(invocation, false)
            .await
            .unwrap_or_else(|_| Outcome::cancelled(0))
    }

    /// Kill running children and complete every queued request as cancelled.
    ///
    /// Later dispatches complete immediately as cancelled.
    pub fn cancel_all(&self) {
        self.inner.cancel.send_replace(true);

        let drained: Vec<Queued> = self.inner.state.lock().waiting.drain(..).collect();
        for queued in drained {
            crate::debug!("dispatch"; "#{} cancelled while queued", queued.id);
            (queued.request.on_complete)(Outcome::cancelled(queued.id));
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancel.borrow()
    }

    /// Resolve once `cancel_all` has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.inner.cancel.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

// =============================================================================
// Admission and completion
// =============================================================================

impl Dispatcher {
    /// Spawn an admitted request. The slot is already counted in `running`.
    fn start(&self, id: u64, request: DispatchRequest) {
        let DispatchRequest {
            invocation,
            on_complete,
            on_start,
        } = request;
        let invocation = mark_child(invocation);

        crate::debug!("dispatch"; "#{} start: {}", id, invocation);

        let child = match invocation.to_command().spawn() {
            Ok(child) => child,
            Err(err) => {
                let outcome = Outcome::spawn_failed(id, &invocation, &err);
                let this = self.clone();
                tokio::spawn(async move { this.complete(outcome, on_complete).await });
                return;
            }
        };

        let line_tx = on_start.map(|on_start| {
            let (tx, lines) = mpsc::unbounded_channel();
            on_start(ProcessHandle {
                id,
                pid: child.id(),
                lines,
            });
            tx
        });

        let this = self.clone();
        let cancel = self.inner.cancel.subscribe();
        tokio::spawn(async move {
            let outcome = process::supervise(id, child, line_tx, cancel).await;
            this.complete(outcome, on_complete).await;
        });
    }

    async fn complete(&self, outcome: Outcome, on_complete: CompleteFn) {
        {
            let mut state = self.inner.state.lock();
            state.running = state.running.saturating_sub(1);
        }
        crate::debug!("dispatch"; "#{} done (success: {})", outcome.id, outcome.succeeded);

        on_complete(outcome);

        // Next tick: the callback above always sees the decremented count.
        tokio::task::yield_now().await;
        self.admit_waiting();
    }

    /// Admit queued requests from the head while slots are free.
    fn admit_waiting(&self) {
        loop {
            let next = {
                let mut state = self.inner.state.lock();
                if state.running >= self.inner.max_concurrent {
                    None
                } else {
                    let next = state.waiting.pop_front();
                    if next.is_some() {
                        state.running += 1;
                    }
                    next
                }
            };

            match next {
                Some(queued) => self.start(queued.id, queued.request),
                None => break,
            }
        }
    }
}

/// Append the subordinate marker unless the caller already did.
fn mark_child(invocation: Invocation) -> Invocation {
    let invocation = if invocation.has_arg(CHILD_FLAG) {
        invocation
    } else {
        invocation.arg(CHILD_FLAG)
    };
    invocation.envs([(CHILD_ENV, "1")])
}
