//! Child supervision: capture output, relay lines, wait or kill.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::Outcome;

/// How long to keep draining pipes after the child exited.
///
/// A grandchild holding the pipe open must not block completion.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Lines kept in the outcome of a child whose output is streamed live.
///
/// Streamed children are usually long-lived watchers; the listener already
/// saw every line, so only the tail is kept for the exit report.
pub(super) const STREAMED_TAIL_LINES: usize = 200;

/// Output collected from both pipes in arrival order.
struct Captured {
    lines: VecDeque<String>,
    limit: Option<usize>,
}

impl Captured {
    fn new(limit: Option<usize>) -> Self {
        Self {
            lines: VecDeque::new(),
            limit,
        }
    }

    fn push(&mut self, line: &str) {
        if self.limit.is_some_and(|limit| self.lines.len() >= limit) {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    fn take(&mut self) -> String {
        let mut out = String::new();
        for line in self.lines.drain(..) {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

/// Wait for `child` to exit (or kill it on cancel) and build its outcome.
pub(super) async fn supervise(
    id: u64,
    mut child: Child,
    line_tx: Option<mpsc::UnboundedSender<String>>,
    mut cancel: watch::Receiver<bool>,
) -> Outcome {
    let limit = line_tx.is_some().then_some(STREAMED_TAIL_LINES);
    let captured = Arc::new(Mutex::new(Captured::new(limit)));

    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, captured.clone(), line_tx.clone()));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, captured.clone(), line_tx.clone()));
    }
    drop(line_tx);

    let cancelled = async {
        if cancel.wait_for(|c| *c).await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let status = tokio::select! {
        status = child.wait() => Some(status),
        _ = cancelled => {
            let _ = child.kill().await;
            None
        }
    };

    for reader in readers {
        if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
            crate::debug!("dispatch"; "#{} output still open after exit", id);
        }
    }
    let output = captured.lock().take();

    match status {
        Some(Ok(status)) => Outcome {
            id,
            succeeded: status.success(),
            exit_code: status.code(),
            output,
            error: None,
        },
        Some(Err(err)) => Outcome {
            id,
            succeeded: false,
            exit_code: None,
            output,
            error: Some(format!("failed to wait for child: {err}")),
        },
        None => Outcome {
            output,
            ..Outcome::cancelled(id)
        },
    }
}

/// Read `stream` line by line into `captured`, forwarding each line to `tx`.
fn spawn_reader<R>(
    stream: R,
    captured: Arc<Mutex<Captured>>,
    tx: Option<mpsc::UnboundedSender<String>>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    captured.lock().push(line);
                    if let Some(tx) = &tx {
                        let _ = tx.send(line.to_string());
                    }
                }
            }
        }
    })
}
