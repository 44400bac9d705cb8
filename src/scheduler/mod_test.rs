use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration as StdDuration;

#[tokio::test(start_paused = true)]
async fn runs_body_on_each_tick() {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    let mut scheduler = TaskScheduler::new();
    scheduler.register(ScheduledTask::new("counter", StdDuration::from_millis(10), move || {
        let counter = counter_clone.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }));

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(scheduler.run(shutdown_clone));

    tokio::time::advance(StdDuration::from_millis(35)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert!(counter.load(Ordering::SeqCst) >= 3);
}

#[tokio::test(start_paused = true)]
async fn predicate_false_skips_the_tick() {
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = ran.clone();

    let mut scheduler = TaskScheduler::new();
    scheduler.register(
        ScheduledTask::new("gated", StdDuration::from_millis(10), move || {
            let ran = ran_clone.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .with_predicate(|| false),
    );

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(scheduler.run(shutdown_clone));

    tokio::time::advance(StdDuration::from_millis(35)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn a_failing_tick_does_not_stop_subsequent_ticks() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();

    let mut scheduler = TaskScheduler::new();
    scheduler.register(ScheduledTask::new("flaky", StdDuration::from_millis(10), move || {
        let attempts = attempts_clone.clone();
        async move {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                anyhow::bail!("first tick fails on purpose");
            }
            Ok(())
        }
    }));

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(scheduler.run(shutdown_clone));

    tokio::time::advance(StdDuration::from_millis(35)).await;
    shutdown.cancel();
    handle.await.unwrap();

    assert!(attempts.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn shutdown_stops_the_loop_promptly() {
    let mut scheduler = TaskScheduler::new();
    scheduler.register(ScheduledTask::new("idle", StdDuration::from_secs(3600), || async {
        Ok(())
    }));

    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    let handle = tokio::spawn(scheduler.run(shutdown_clone));

    shutdown.cancel();
    tokio::time::timeout(StdDuration::from_secs(1), handle)
        .await
        .expect("scheduler should shut down promptly")
        .unwrap();
}
