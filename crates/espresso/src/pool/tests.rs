use super::*;
use crate::{Error, FnStage, StageError};
use core::time::Duration;
use futures::future::join_all;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

const KIND: &str = "echo";

fn config(workers: usize, queue_capacity: usize) -> PoolConfig {
    PoolConfig {
        workers,
        queue_capacity,
        shutdown_timeout: Duration::from_secs(3),
    }
}

/// A pool whose stage returns its input after `latency`.
fn echo_pool(workers: usize, queue_capacity: usize, latency: Duration) -> WorkerPool<u64, u64> {
    WorkerPool::spawn(
        KIND,
        config(workers, queue_capacity),
        FnStage::new(move |n: u64| async move {
            sleep(latency).await;
            Ok::<_, StageError>(n)
        }),
    )
    .unwrap()
}

fn assert_elapsed_near(start: Instant, expected: Duration) {
    let elapsed = start.elapsed();
    assert!(elapsed >= expected, "{elapsed:?} < {expected:?}");
    assert!(
        elapsed < expected + Duration::from_millis(50),
        "{elapsed:?} too far past {expected:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_get_their_own_results() {
    let pool = Arc::new(WorkerPool::spawn(
        KIND,
        config(2, 1),
        FnStage::new(|tag: u64| async move {
            // Uneven latencies shuffle completion order between the workers.
            sleep(Duration::from_micros(tag % 7 * 100)).await;
            Ok::<_, StageError>(format!("served-{tag}"))
        }),
    )
    .unwrap());

    let handles: Vec<_> = (0..200u64)
        .map(|tag| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { (tag, pool.submit(tag).await) })
        })
        .collect();

    for handle in handles {
        let (tag, result) = handle.await.unwrap();
        assert_eq!(result, Ok(format!("served-{tag}")));
    }

    pool.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_request_is_served_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let stage_calls = Arc::clone(&calls);
    let pool = Arc::new(
        WorkerPool::spawn(
            KIND,
            config(2, 1),
            FnStage::new(move |n: u64| {
                let calls = Arc::clone(&stage_calls);
                async move {
                    calls.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                    Ok::<_, StageError>(n)
                }
            }),
        )
        .unwrap(),
    );

    let handles: Vec<_> = (0..500u64)
        .map(|n| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.submit(n).await })
        })
        .collect();

    let mut completed = 0;
    for handle in handles {
        handle.await.unwrap().unwrap();
        completed += 1;
    }

    pool.shutdown().await.unwrap();

    assert_eq!(completed, 500);
    assert_eq!(calls.load(Ordering::Relaxed), 500);
    assert_eq!(pool.served_per_worker().iter().sum::<u64>(), 500);
}

#[tokio::test(start_paused = true)]
async fn two_workers_halve_the_wall_clock() {
    let pool = echo_pool(2, 1, Duration::from_millis(10));
    let start = Instant::now();

    let results = join_all((0..100).map(|n| pool.submit(n))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_elapsed_near(start, Duration::from_millis(500));

    let served = pool.served_per_worker();
    assert_eq!(served.len(), 2);
    assert!(served.iter().all(|&n| n >= 40), "unbalanced: {served:?}");
}

#[tokio::test(start_paused = true)]
async fn six_shots_on_two_porta_filters_take_three_rounds() {
    let pool = echo_pool(2, 1, Duration::from_millis(600));
    let start = Instant::now();

    let results = join_all((0..6).map(|n| pool.submit(n))).await;

    assert_eq!(results, (0..6).map(Ok).collect::<Vec<_>>());
    assert_elapsed_near(start, Duration::from_millis(1800));
}

#[tokio::test]
async fn submits_after_shutdown_are_refused() {
    let pool = echo_pool(2, 1, Duration::ZERO);
    assert_eq!(pool.submit(1).await, Ok(1));

    pool.shutdown().await.unwrap();
    assert_eq!(pool.state(), PoolState::ShutDown);

    for n in 0..10 {
        assert_eq!(pool.submit(n).await, Err(Error::PoolClosed { kind: KIND }));
    }
    let cancel = CancellationToken::new();
    assert_eq!(
        pool.submit_with_cancel(1, &cancel).await,
        Err(Error::PoolClosed { kind: KIND })
    );
}

#[tokio::test(start_paused = true)]
async fn shutdown_drains_every_admitted_request() {
    let pool = echo_pool(2, 1, Duration::from_millis(50));
    let start = Instant::now();

    // `join!` polls the submits first, so all of them are admitted before
    // shutdown starts, but only two fit in the worker queues.
    let (results, shutdown) = tokio::join!(
        join_all((0..10).map(|n| pool.submit(n))),
        pool.shutdown()
    );

    assert_eq!(shutdown, Ok(()));
    assert_eq!(results, (0..10).map(Ok).collect::<Vec<_>>());
    assert_eq!(pool.served_per_worker().iter().sum::<u64>(), 10);
    assert_elapsed_near(start, Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn shutdown_refuses_only_late_callers() {
    let pool = echo_pool(2, 1, Duration::from_millis(600));
    let start = Instant::now();

    let (results, shutdown, late) = tokio::join!(
        join_all((0..6).map(|n| pool.submit(n))),
        pool.shutdown(),
        async {
            tokio::task::yield_now().await;
            pool.submit(99).await
        }
    );

    assert_eq!(shutdown, Ok(()));
    assert_eq!(results, (0..6).map(Ok).collect::<Vec<_>>());
    assert_eq!(late, Err(Error::PoolClosed { kind: KIND }));
    assert_elapsed_near(start, Duration::from_millis(1800));
    assert_eq!(pool.state(), PoolState::ShutDown);
}

#[tokio::test(start_paused = true)]
async fn interrupted_shutdown_resumes_on_the_next_call() {
    let pool = Arc::new(echo_pool(1, 1, Duration::from_millis(600)));

    let caller = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.submit(7).await })
    };
    sleep(Duration::from_millis(1)).await;

    let first = tokio::time::timeout(Duration::from_millis(10), pool.shutdown()).await;
    assert!(first.is_err());
    assert_eq!(pool.state(), PoolState::ShuttingDown);
    assert!(!caller.is_finished());

    let start = Instant::now();
    assert_eq!(pool.shutdown().await, Ok(()));
    // The in-flight request ends at 600 ms; this call starts at 11 ms.
    assert_elapsed_near(start, Duration::from_millis(589));
    assert_eq!(pool.state(), PoolState::ShutDown);
    assert_eq!(caller.await.unwrap(), Ok(7));
    assert_eq!(pool.shutdown().await, Ok(()));
}

#[tokio::test]
async fn shutdown_is_idempotent() {
    let pool = echo_pool(2, 1, Duration::ZERO);

    let (first, second) = tokio::join!(pool.shutdown(), pool.shutdown());
    assert_eq!(first, Ok(()));
    assert_eq!(second, Ok(()));
    assert_eq!(pool.shutdown().await, Ok(()));
    assert_eq!(pool.state(), PoolState::ShutDown);
    assert_eq!(pool.submit(1).await, Err(Error::PoolClosed { kind: KIND }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stage_failures_stay_with_their_caller() {
    let pool = WorkerPool::spawn(
        KIND,
        config(2, 1),
        FnStage::new(|n: u64| async move {
            if n % 5 == 0 {
                Err(StageError::new(format!("{n} burnt")))
            } else {
                Ok(n)
            }
        }),
    )
    .unwrap();

    let results = join_all((1..=20).map(|n| pool.submit(n))).await;

    for (n, result) in (1..=20).zip(results) {
        if n % 5 == 0 {
            assert_eq!(
                result,
                Err(Error::StageFailure {
                    kind: KIND,
                    reason: format!("{n} burnt"),
                })
            );
        } else {
            assert_eq!(result, Ok(n));
        }
    }
    pool.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelled_caller_does_not_disturb_others() {
    let pool = echo_pool(1, 1, Duration::from_millis(100));
    let cancel = CancellationToken::new();

    let (first, abandoned, ()) = tokio::join!(
        pool.submit(1),
        pool.submit_with_cancel(2, &cancel),
        async {
            sleep(Duration::from_millis(10)).await;
            cancel.cancel();
        }
    );

    assert_eq!(first, Ok(1));
    assert_eq!(abandoned, Err(Error::Cancelled));
    assert_eq!(pool.submit(3).await, Ok(3));

    // The abandoned request was skipped rather than processed.
    assert_eq!(pool.served_per_worker(), vec![2]);
    pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn panicking_worker_fails_its_caller_and_shutdown() {
    let pool = WorkerPool::spawn(
        KIND,
        config(1, 1),
        FnStage::new(|n: u64| async move {
            if n == 0 {
                panic!("porta-filter cracked");
            }
            Ok::<_, StageError>(n)
        }),
    )
    .unwrap();

    assert_eq!(pool.submit(0).await, Err(Error::WorkerLost { kind: KIND }));
    assert_eq!(
        pool.shutdown().await,
        Err(Error::WorkerPanicked {
            worker: WorkerId {
                kind: KIND,
                index: 0
            }
        })
    );
}

#[tokio::test(start_paused = true)]
async fn stuck_worker_times_out_shutdown() {
    let pool = Arc::new(
        WorkerPool::spawn(
            KIND,
            PoolConfig {
                workers: 1,
                queue_capacity: 1,
                shutdown_timeout: Duration::from_secs(1),
            },
            FnStage::new(|n: u64| async move {
                sleep(Duration::from_secs(60)).await;
                Ok::<_, StageError>(n)
            }),
        )
        .unwrap(),
    );

    let caller = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.submit(7).await })
    };
    sleep(Duration::from_millis(1)).await;

    assert_eq!(
        pool.shutdown().await,
        Err(Error::ShutdownTimeout {
            worker: WorkerId {
                kind: KIND,
                index: 0
            },
            timeout: Duration::from_secs(1),
        })
    );
    // The aborted worker dropped the request, so its caller does not hang.
    assert_eq!(caller.await.unwrap(), Err(Error::WorkerLost { kind: KIND }));
}

#[test]
fn empty_pools_are_rejected() {
    let stage = FnStage::new(|n: u64| async move { Ok::<_, StageError>(n) });
    let result = WorkerPool::<u64, u64>::spawn(KIND, config(0, 1), stage.clone());
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));

    let result = WorkerPool::<u64, u64>::spawn(KIND, config(2, 0), stage);
    assert!(matches!(result, Err(Error::InvalidConfig { .. })));
}
