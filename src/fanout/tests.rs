use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::target::TargetKind;
use crate::target::resolve::parse_list;

fn sleep_for(target: &TargetDescriptor) -> Invocation {
    // Later targets finish first.
    let delay = match target.name() {
        "a" => "0.3",
        "b" => "0.2",
        "c" => "0.1",
        _ => "0",
    };
    Invocation::new("sh").args(["-c", &format!("sleep {delay}")])
}

#[test]
fn test_zero_targets_fire_synchronously() {
    let fanout = FanOut::new(Dispatcher::new(4));
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();

    fanout.run_all(&[], |_| Invocation::new("true"), move |report| {
        assert!(report.is_empty());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_all_done_fires_once_after_every_target() {
    let fanout = FanOut::new(Dispatcher::new(2));
    let targets = parse_list(TargetKind::Page, "a,b,c,d,e").unwrap();

    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let (tx, rx) = oneshot::channel();

    fanout.run_all(&targets, sleep_for, move |report| {
        counter.fetch_add(1, Ordering::SeqCst);
        let _ = tx.send(report);
    });

    let report = rx.await.unwrap();
    assert_eq!(report.len(), 5);
    assert!(report.succeeded());

    let mut names: Vec<_> = report.results.iter().map(|r| r.target.name()).collect();
    names.sort_unstable();
    assert_eq!(names, ["a", "b", "c", "d", "e"]);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_completion_order_independent() {
    let fanout = FanOut::new(Dispatcher::new(4));
    let targets = parse_list(TargetKind::Widget, "a,b,c").unwrap();

    let report = fanout.run(&targets, sleep_for).await.unwrap();
    let order: Vec<_> = report.results.iter().map(|r| r.target.name()).collect();
    assert_eq!(order, ["c", "b", "a"]);
}

#[tokio::test]
async fn test_failure_does_not_abort_siblings() {
    let fanout = FanOut::new(Dispatcher::new(4));
    let targets = parse_list(TargetKind::Page, "ok1,bad,ok2").unwrap();

    let report = fanout
        .run(&targets, |t| {
            let script = if t.name() == "bad" { "echo broken; exit 2" } else { "true" };
            Invocation::new("sh").args(["-c", script])
        })
        .await
        .unwrap();

    assert_eq!(report.len(), 3);
    assert!(!report.succeeded());
    let failed: Vec<_> = report.failures().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].target.name(), "bad");
    assert_eq!(failed[0].outcome.exit_code, Some(2));
    assert!(failed[0].outcome.output.contains("broken"));
}

#[tokio::test]
async fn test_single_target_uses_session() {
    let fanout = FanOut::new(Dispatcher::new(4));
    let targets = parse_list(TargetKind::Page, "home/v2").unwrap();

    let report = fanout
        .run(&targets, |t| Invocation::new("echo").args(t.invocation_args()))
        .await
        .unwrap();

    assert_eq!(report.len(), 1);
    assert!(report.results[0].outcome.output.contains("--page home/v2"));
}

#[test]
fn test_session_ignores_extra_records() {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    let session = AggregationSession::new(1, move |_report: FanOutReport| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let target = TargetDescriptor::new(TargetKind::Page, "x", None).unwrap();
    let outcome = Outcome {
        id: 1,
        succeeded: true,
        exit_code: Some(0),
        output: String::new(),
        error: None,
    };
    session.record(TargetResult {
        target: target.clone(),
        outcome: outcome.clone(),
    });
    session.record(TargetResult { target, outcome });

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(session.state.lock().completed, 1);
}

#[test]
fn test_report_merge() {
    let mut a = FanOutReport::default();
    let b = FanOutReport {
        results: vec![TargetResult {
            target: TargetDescriptor::new(TargetKind::Widget, "w", None).unwrap(),
            outcome: Outcome {
                id: 7,
                succeeded: false,
                exit_code: Some(1),
                output: String::new(),
                error: None,
            },
        }],
    };
    a.merge(b);
    assert_eq!(a.len(), 1);
    assert!(!a.succeeded());
}

#[tokio::test]
async fn test_lost_session_is_an_error() {
    let (tx, rx) = oneshot::channel::<FanOutReport>();
    drop(tx);

    let err = wait_report(rx, 3).await.unwrap_err();
    assert!(err.to_string().contains("all 3 target(s)"));
}
