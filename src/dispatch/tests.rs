use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::*;

fn sh(script: &str) -> Invocation {
    Invocation::new("sh").args(["-c", script])
}

/// Request that records its start index and tracks how many run at once.
fn tracked(
    index: usize,
    invocation: Invocation,
    live: &Arc<AtomicUsize>,
    peak: &Arc<AtomicUsize>,
    started: &Arc<Mutex<Vec<usize>>>,
) -> (DispatchRequest, oneshot::Receiver<Outcome>) {
    let (tx, rx) = oneshot::channel();
    let (live_start, live_done) = (live.clone(), live.clone());
    let peak = peak.clone();
    let started = started.clone();

    let request = DispatchRequest::new(invocation, move |outcome| {
        live_done.fetch_sub(1, Ordering::SeqCst);
        let _ = tx.send(outcome);
    })
    .on_start(move |_handle| {
        let now = live_start.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        started.lock().push(index);
    });

    (request, rx)
}

#[tokio::test]
async fn test_four_of_six_start_immediately() {
    let dispatcher = Dispatcher::new(4);
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Mutex::new(Vec::new()));

    let mut receivers = Vec::new();
    for i in 0..6 {
        let script = format!("sleep 0.{}", 1 + i % 3);
        let (request, rx) = tracked(i, sh(&script), &live, &peak, &started);
        dispatcher.dispatch(request, false);
        receivers.push(rx);
    }

    assert_eq!(*started.lock(), [0, 1, 2, 3]);
    assert_eq!(
        dispatcher.stats(),
        DispatchStats {
            running: 4,
            waiting: 2
        }
    );

    for rx in receivers {
        assert!(rx.await.unwrap().succeeded);
    }

    assert!(peak.load(Ordering::SeqCst) <= 4);
    assert_eq!(*started.lock(), [0, 1, 2, 3, 4, 5]);
    assert_eq!(dispatcher.stats(), DispatchStats::default());
}

#[tokio::test]
async fn test_ceiling_holds_for_many_requests() {
    let dispatcher = Dispatcher::new(3);
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Mutex::new(Vec::new()));

    let mut receivers = Vec::new();
    for i in 0..12 {
        let script = format!("sleep 0.0{}", i % 5);
        let (request, rx) = tracked(i, sh(&script), &live, &peak, &started);
        dispatcher.dispatch(request, false);
        receivers.push(rx);
    }
    for rx in receivers {
        rx.await.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert_eq!(started.lock().len(), 12);
}

#[tokio::test]
async fn test_queue_is_fifo() {
    let dispatcher = Dispatcher::new(1);
    let live = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let started = Arc::new(Mutex::new(Vec::new()));

    let mut receivers = Vec::new();
    for i in 0..5 {
        let (request, rx) = tracked(i, Invocation::new("true"), &live, &peak, &started);
        dispatcher.dispatch(request, false);
        receivers.push(rx);
    }
    for rx in receivers {
        rx.await.unwrap();
    }

    assert_eq!(*started.lock(), [0, 1, 2, 3, 4]);
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_forced_bypasses_full_ceiling() {
    let dispatcher = Dispatcher::new(1);

    let slow = dispatcher.submit(sh("sleep 0.3"), false);
    let queued = dispatcher.submit(Invocation::new("true"), false);
    assert_eq!(dispatcher.stats().waiting, 1);

    let forced_started = Arc::new(AtomicBool::new(false));
    let flag = forced_started.clone();
    let (tx, forced) = oneshot::channel();
    let request = DispatchRequest::new(Invocation::new("true"), move |o| {
        let _ = tx.send(o);
    })
    .on_start(move |_| flag.store(true, Ordering::SeqCst));
    dispatcher.dispatch(request, true);

    // on_start runs synchronously inside dispatch
    assert!(forced_started.load(Ordering::SeqCst));
    assert_eq!(
        dispatcher.stats(),
        DispatchStats {
            running: 2,
            waiting: 1
        }
    );

    // The forced one finishing frees only its own slot; the slow one still holds the ceiling.
    assert!(forced.await.unwrap().succeeded);
    tokio::task::yield_now().await;
    assert_eq!(dispatcher.stats().waiting, 1);

    assert!(slow.await.unwrap().succeeded);
    assert!(queued.await.unwrap().succeeded);
    assert_eq!(dispatcher.stats(), DispatchStats::default());
}

#[tokio::test]
async fn test_outcome_captures_output_and_exit_code() {
    let dispatcher = Dispatcher::new(2);
    let outcome = dispatcher
        .run(sh("echo hello; echo oops >&2; exit 3"))
        .await;

    assert!(!outcome.succeeded);
    assert_eq!(outcome.exit_code, Some(3));
    assert!(outcome.output.contains("hello"));
    assert!(outcome.output.contains("oops"));
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.reason(), "exit code 3");
}

#[tokio::test]
async fn test_child_marker_is_appended() {
    let dispatcher = Dispatcher::new(1);
    let outcome = dispatcher
        .run(sh("echo \"$0 $BAKEHOUSE_CHILD\""))
        .await;

    assert!(outcome.succeeded);
    assert_eq!(outcome.output.trim(), "--child 1");
}

#[tokio::test]
async fn test_child_marker_not_duplicated() {
    let dispatcher = Dispatcher::new(1);
    let outcome = dispatcher
        .run(Invocation::new("echo").args(["a", CHILD_FLAG]))
        .await;
    assert_eq!(outcome.output.trim(), "a --child");
}

#[tokio::test]
async fn test_spawn_failure_does_not_stall_queue() {
    let dispatcher = Dispatcher::new(1);

    let missing = dispatcher.submit(Invocation::new("bakehouse-no-such-program-xyz"), false);
    let next = dispatcher.submit(Invocation::new("true"), false);

    let missing = missing.await.unwrap();
    assert!(!missing.succeeded);
    assert_eq!(missing.exit_code, None);
    assert!(missing.error.unwrap().contains("failed to spawn"));

    assert!(next.await.unwrap().succeeded);
    assert_eq!(dispatcher.stats(), DispatchStats::default());
}

#[tokio::test]
async fn test_on_start_streams_lines() {
    let dispatcher = Dispatcher::new(1);

    let (handle_tx, handle_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();
    let request = DispatchRequest::new(sh("echo one; echo two"), move |o| {
        let _ = done_tx.send(o);
    })
    .on_start(move |handle| {
        let _ = handle_tx.send(handle);
    });
    dispatcher.dispatch(request, false);

    let mut handle = handle_rx.await.unwrap();
    assert!(handle.pid.is_some());

    let mut lines = Vec::new();
    while let Some(line) = handle.lines.recv().await {
        lines.push(line);
    }
    assert_eq!(lines, ["one", "two"]);
    assert!(done_rx.await.unwrap().succeeded);
}

#[tokio::test]
async fn test_cancel_all_kills_running_and_drains_queue() {
    let dispatcher = Dispatcher::new(1);

    let running = dispatcher.submit(sh("exec sleep 5"), false);
    let queued_done = Arc::new(AtomicBool::new(false));
    let flag = queued_done.clone();
    dispatcher.dispatch(
        DispatchRequest::new(Invocation::new("true"), move |o| {
            assert!(o.is_cancelled());
            flag.store(true, Ordering::SeqCst);
        }),
        false,
    );

    dispatcher.cancel_all();
    assert!(queued_done.load(Ordering::SeqCst));
    assert!(dispatcher.is_cancelled());

    let outcome = running.await.unwrap();
    assert!(outcome.is_cancelled());
    assert!(!outcome.succeeded);

    let late = dispatcher.run(Invocation::new("true")).await;
    assert!(late.is_cancelled());
    dispatcher.cancelled().await;
}

#[tokio::test]
async fn test_on_complete_sees_decremented_count() {
    let dispatcher = Dispatcher::new(1);

    let (seen_tx, seen_rx) = oneshot::channel();
    let observer = dispatcher.clone();
    dispatcher.dispatch(
        DispatchRequest::new(Invocation::new("true"), move |_| {
            let _ = seen_tx.send(observer.stats());
        }),
        false,
    );
    let queued = dispatcher.submit(Invocation::new("true"), false);

    // The head of the queue is admitted only after the callback returned.
    assert_eq!(
        seen_rx.await.unwrap(),
        DispatchStats {
            running: 0,
            waiting: 1
        }
    );
    assert!(queued.await.unwrap().succeeded);
    assert_eq!(dispatcher.stats(), DispatchStats::default());
}

#[tokio::test]
async fn test_streamed_output_keeps_bounded_tail() {
    let dispatcher = Dispatcher::new(1);
    let total = 20_000;

    let (count_tx, count_rx) = oneshot::channel();
    let (done_tx, done_rx) = oneshot::channel();
    let request = DispatchRequest::new(
        sh(&format!("i=1; while [ $i -le {total} ]; do echo line-$i; i=$((i+1)); done")),
        move |o| {
            let _ = done_tx.send(o);
        },
    )
    .on_start(move |mut handle| {
        tokio::spawn(async move {
            let mut count = 0;
            while handle.lines.recv().await.is_some() {
                count += 1;
            }
            let _ = count_tx.send(count);
        });
    });
    dispatcher.dispatch(request, true);

    assert_eq!(count_rx.await.unwrap(), total);

    let outcome = done_rx.await.unwrap();
    assert!(outcome.succeeded);
    let kept: Vec<&str> = outcome.output.lines().collect();
    assert_eq!(kept.len(), process::STREAMED_TAIL_LINES);
    assert_eq!(kept.last(), Some(&"line-20000"));
}

#[tokio::test]
async fn test_unstreamed_output_is_kept_whole() {
    let dispatcher = Dispatcher::new(1);
    let outcome = dispatcher
        .run(sh("i=1; while [ $i -le 500 ]; do echo $i; i=$((i+1)); done"))
        .await;
    assert_eq!(outcome.output.lines().count(), 500);
}
