//! Fan-out/fan-in over the dispatcher.
//!
//! One dispatch per target; an [`AggregationSession`] counts completions and
//! fires the single `on_all_done` once every target has reported, in
//! whatever order they finish.

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::dispatch::{DispatchRequest, Dispatcher, Outcome};
use crate::logger;
use crate::target::TargetDescriptor;
use crate::utils::exec::{FilterRule, Invocation};

// =============================================================================
// Report
// =============================================================================

/// Outcome of one target in a fan-out.
#[derive(Debug, Clone)]
pub struct TargetResult {
    pub target: TargetDescriptor,
    pub outcome: Outcome,
}

/// All results of a fan-out, in completion order.
#[derive(Debug, Clone, Default)]
pub struct FanOutReport {
    pub results: Vec<TargetResult>,
}

impl FanOutReport {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TargetResult> {
        self.results.iter().filter(|r| !r.outcome.succeeded)
    }

    pub fn succeeded(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Append another report (e.g. widgets after pages).
    pub fn merge(&mut self, other: FanOutReport) {
        self.results.extend(other.results);
    }
}

// =============================================================================
// Session
// =============================================================================

/// Counting join over `expected` completions.
struct AggregationSession<D> {
    expected: usize,
    state: Mutex<SessionState<D>>,
}

struct SessionState<D> {
    completed: usize,
    results: Vec<TargetResult>,
    on_all_done: Option<D>,
}

impl<D> AggregationSession<D>
where
    D: FnOnce(FanOutReport),
{
    fn new(expected: usize, on_all_done: D) -> Self {
        Self {
            expected,
            state: Mutex::new(SessionState {
                completed: 0,
                results: Vec::with_capacity(expected),
                on_all_done: Some(on_all_done),
            }),
        }
    }

    fn record(&self, result: TargetResult) {
        let finished = {
            let mut state = self.state.lock();
            if state.completed >= self.expected {
                return;
            }
            state.completed += 1;
            state.results.push(result);

            if state.completed == self.expected {
                state
                    .on_all_done
                    .take()
                    .map(|done| (done, std::mem::take(&mut state.results)))
            } else {
                None
            }
        };

        if let Some((on_all_done, results)) = finished {
            on_all_done(FanOutReport { results });
        }
    }
}

// =============================================================================
// FanOut
// =============================================================================

/// Dispatches one child per target and joins on all of them.
#[derive(Clone)]
pub struct FanOut {
    dispatcher: Dispatcher,
    filter: Arc<FilterRule>,
}

impl FanOut {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            filter: Arc::new(FilterRule::default()),
        }
    }

    /// Filter applied to captured output of successful targets before printing.
    pub fn with_filter(mut self, filter: FilterRule) -> Self {
        self.filter = Arc::new(filter);
        self
    }

    /// Dispatch every target in order; `on_all_done` fires exactly once after
    /// the last one completes, or immediately for an empty list.
    pub fn run_all<C, D>(&self, targets: &[TargetDescriptor], command_for: C, on_all_done: D)
    where
        C: Fn(&TargetDescriptor) -> Invocation,
        D: FnOnce(FanOutReport) + Send + 'static,
    {
        if targets.is_empty() {
            on_all_done(FanOutReport::default());
            return;
        }

        let session = Arc::new(AggregationSession::new(targets.len(), on_all_done));

        for target in targets {
            let invocation = command_for(target);
            let session = session.clone();
            let filter = self.filter.clone();
            let target = target.clone();

            let request = DispatchRequest::new(invocation, move |outcome| {
                report_target(&target, &outcome, &filter);
                session.record(TargetResult { target, outcome });
            });
            self.dispatcher.dispatch(request, false);
        }
    }

    /// Async form of [`run_all`](Self::run_all).
    pub async fn run<C>(&self, targets: &[TargetDescriptor], command_for: C) -> Result<FanOutReport>
    where
        C: Fn(&TargetDescriptor) -> Invocation,
    {
        let (tx, rx) = oneshot::channel();
        self.run_all(targets, command_for, move |report| {
            let _ = tx.send(report);
        });
        wait_report(rx, targets.len()).await
    }
}

/// Wait for the session's report.
///
/// The sender is dropped unsent only if a completion callback was lost.
async fn wait_report(rx: oneshot::Receiver<FanOutReport>, expected: usize) -> Result<FanOutReport> {
    rx.await
        .with_context(|| format!("build session lost before all {expected} target(s) reported"))
}

/// Per-target report: output, status line, blank separator.
fn report_target(target: &TargetDescriptor, outcome: &Outcome, filter: &FilterRule) {
    let module = target.kind().as_str();

    if outcome.succeeded {
        let output = filter.apply(&outcome.output);
        if !output.is_empty() {
            println!("{output}");
        }
        crate::log!(module; "{} built.", target.label());
    } else {
        crate::log!("error"; "{} failed: {}", target.label(), outcome.reason());
        let output = outcome.output.trim_end();
        if !output.is_empty() {
            println!("{output}");
        }
    }

    logger::blank();
}
