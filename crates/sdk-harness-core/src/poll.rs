// crates/sdk-harness-core/src/poll.rs
// ============================================================================
// Module: Poll Helpers
// Description: Deadline-bounded condition polling.
// Purpose: Wait for asynchronous SDK effects without unbounded blocking.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Used for propagation and cache-expiry checks where the harness cannot
//! observe the moment a change lands. The condition is always evaluated at
//! least once and once more at the deadline.

use std::thread;
use std::time::Duration;
use std::time::Instant;

/// Polls `condition` every `interval` until it holds or `timeout` elapses.
///
/// Returns `false` when the deadline passes.
pub fn poll_until<F>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    poll_for_value(timeout, interval, || condition().then_some(())).is_some()
}

/// Polls `probe` until it yields a value or `timeout` elapses.
///
/// A `timeout` too large to add to the current instant, such as
/// [`Duration::MAX`], waits without a deadline.
pub fn poll_for_value<T, F>(timeout: Duration, interval: Duration, mut probe: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
{
    let deadline = Instant::now().checked_add(timeout);
    loop {
        if let Some(value) = probe() {
            return Some(value);
        }
        let Some(deadline) = deadline else {
            thread::sleep(interval);
            continue;
        };
        let now = Instant::now();
        if now >= deadline {
            return None;
        }
        thread::sleep(interval.min(deadline - now));
    }
}
