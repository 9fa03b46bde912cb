// crates/sdk-harness-mocks/src/capture/tests.rs
// ============================================================================
// Module: Capture Queue Tests
// Description: Unit tests for ordering, timeouts, and close semantics.
// Purpose: Ensure blocking reads are bounded and never lose items.
// Dependencies: sdk-harness-mocks, tokio
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tokio::runtime::Builder;
use tokio::runtime::Runtime;

use super::CaptureError;
use super::CaptureQueue;

fn runtime() -> Runtime {
    Builder::new_multi_thread().worker_threads(2).enable_all().build().unwrap()
}

#[test]
fn items_arrive_in_record_order() {
    let runtime = runtime();
    let queue = CaptureQueue::new(8, runtime.handle().clone());
    let sender = queue.sender();
    runtime.block_on(async {
        for index in 0 .. 5 {
            sender.record(index).await.unwrap();
        }
    });
    let read: Vec<i32> =
        (0 .. 5).map(|_| queue.await_next(Duration::from_millis(100)).unwrap()).collect();
    assert_eq!(read, vec![0, 1, 2, 3, 4]);
}

#[test]
fn await_next_times_out_without_items() {
    let runtime = runtime();
    let queue = CaptureQueue::<u8>::new(4, runtime.handle().clone());
    let started = Instant::now();
    assert_eq!(queue.await_next(Duration::from_millis(30)), Err(CaptureError::Timeout(30)));
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[test]
fn await_next_wakes_on_late_item() {
    let runtime = runtime();
    let queue = CaptureQueue::new(4, runtime.handle().clone());
    let sender = queue.sender();
    let _task = runtime.spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        sender.record("late").await
    });
    assert_eq!(queue.await_next(Duration::from_secs(2)).unwrap(), "late");
}

#[test]
fn close_wakes_blocked_reader() {
    let runtime = runtime();
    let queue = Arc::new(CaptureQueue::<u8>::new(4, runtime.handle().clone()));
    let closer = Arc::clone(&queue);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        closer.close();
    });
    let started = Instant::now();
    assert_eq!(queue.await_next(Duration::from_secs(5)), Err(CaptureError::Closed));
    assert!(started.elapsed() < Duration::from_secs(5));
    handle.join().unwrap();
}

#[test]
fn buffered_items_survive_close() {
    let runtime = runtime();
    let queue = CaptureQueue::new(4, runtime.handle().clone());
    let sender = queue.sender();
    sender.try_record(7).unwrap();
    queue.close();
    assert_eq!(sender.try_record(8), Err(CaptureError::Closed));
    assert_eq!(queue.await_next(Duration::from_millis(10)).unwrap(), 7);
    assert_eq!(queue.await_next(Duration::from_millis(10)), Err(CaptureError::Closed));
}

#[test]
fn try_record_reports_full_queue() {
    let runtime = runtime();
    let queue = CaptureQueue::new(1, runtime.handle().clone());
    let sender = queue.sender();
    sender.try_record(1).unwrap();
    assert_eq!(sender.try_record(2), Err(CaptureError::Full));
}

#[test]
fn blocked_producer_resumes_when_reader_drains() {
    let runtime = runtime();
    let queue = CaptureQueue::new(1, runtime.handle().clone());
    let sender = queue.sender();
    let producer = runtime.spawn(async move {
        for index in 0 .. 3 {
            sender.record(index).await.unwrap();
        }
    });
    for expected in 0 .. 3 {
        assert_eq!(queue.await_next(Duration::from_secs(2)).unwrap(), expected);
    }
    runtime.block_on(producer).unwrap();
}

#[test]
fn peek_all_does_not_consume() {
    let runtime = runtime();
    let queue = CaptureQueue::new(4, runtime.handle().clone());
    let sender = queue.sender();
    sender.try_record("a").unwrap();
    sender.try_record("b").unwrap();
    assert_eq!(queue.peek_all(), vec!["a", "b"]);
    assert_eq!(queue.await_next(Duration::from_millis(10)).unwrap(), "a");
    assert_eq!(queue.take_all(), vec!["b"]);
    assert!(queue.take_all().is_empty());
}
