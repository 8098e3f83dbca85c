//! Async flush on a tokio `LocalSet`.
//!
//! With [`TokioLocalQueue`], queued watcher jobs become local tasks and run
//! when the current task yields.

use tokio::sync::mpsc;
use tokio::task::LocalSet;

use utakata_core::{watch, Runtime, Signal, TokioLocalQueue, WatcherOptions};

#[tokio::test]
async fn watch_jobs_run_as_local_tasks() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let runtime = Runtime::with_queue(TokioLocalQueue);
            let count = Signal::new(&runtime, 0);
            let (tx, mut rx) = mpsc::unbounded_channel();

            let _handle = watch(
                &runtime,
                &count,
                move |new, old| {
                    let _ = tx.send((new, old));
                },
                WatcherOptions::new().immediate(true),
            );

            // Nothing runs until this task yields.
            assert!(rx.try_recv().is_err());
            assert_eq!(rx.recv().await, Some((0, None)));

            // Two writes queue two jobs; the second sees no change.
            count.set(1);
            count.set(2);
            assert_eq!(rx.recv().await, Some((2, Some(0))));

            count.set(3);
            assert_eq!(rx.recv().await, Some((3, Some(2))));
        })
        .await;
}

#[tokio::test]
async fn stopped_watch_sends_nothing() {
    let local = LocalSet::new();
    local
        .run_until(async {
            let runtime = Runtime::with_queue(TokioLocalQueue);
            let count = Signal::new(&runtime, 0);
            let (tx, mut rx) = mpsc::unbounded_channel::<i32>();

            let handle = watch(
                &runtime,
                &count,
                move |new, _| {
                    let _ = tx.send(new);
                },
                WatcherOptions::new(),
            );
            handle.stop();
            count.set(1);

            tokio::task::yield_now().await;
            assert!(rx.try_recv().is_err());
            assert_eq!(count.subscriber_count(), 0);
        })
        .await;
}
