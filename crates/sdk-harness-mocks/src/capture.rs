// crates/sdk-harness-mocks/src/capture.rs
// ============================================================================
// Module: Capture Queues
// Description: Bounded multi-producer capture channels with blocking reads.
// Purpose: Hand captured requests and payloads from HTTP workers to tests.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! Every piece of state a mock captures (requests, event payloads, store
//! queries, poll signals) flows through a [`CaptureQueue`]. HTTP workers hold
//! a [`CaptureSender`] and record asynchronously; test code reads from the
//! synchronous side with a bounded wait.
//!
//! Closing a queue wakes blocked readers with [`CaptureError::Closed`] once
//! buffered items are drained; items recorded before the close stay readable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::watch;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Capture queue errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// Nothing arrived before the deadline.
    #[error("nothing captured within {0}ms")]
    Timeout(u64),
    /// The queue was closed and is drained.
    #[error("capture queue closed")]
    Closed,
    /// The queue is at capacity.
    #[error("capture queue full")]
    Full,
}

// ============================================================================
// SECTION: Producer
// ============================================================================

/// Producer half used by HTTP workers.
pub struct CaptureSender<T> {
    /// Bounded channel sender.
    sender: mpsc::Sender<T>,
    /// Close signal.
    closed: watch::Receiver<bool>,
}

impl<T> Clone for CaptureSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<T> CaptureSender<T> {
    /// Records an item, waiting for capacity.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Closed`] when the queue closes first.
    pub async fn record(&self, item: T) -> Result<(), CaptureError> {
        if *self.closed.borrow() {
            return Err(CaptureError::Closed);
        }
        let mut closed = self.closed.clone();
        tokio::select! {
            sent = self.sender.send(item) => sent.map_err(|_| CaptureError::Closed),
            _ = closed.wait_for(|closed| *closed) => Err(CaptureError::Closed),
        }
    }

    /// Records an item without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Full`] at capacity or
    /// [`CaptureError::Closed`] after close.
    pub fn try_record(&self, item: T) -> Result<(), CaptureError> {
        if *self.closed.borrow() {
            return Err(CaptureError::Closed);
        }
        self.sender.try_send(item).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => CaptureError::Full,
            mpsc::error::TrySendError::Closed(_) => CaptureError::Closed,
        })
    }
}

// ============================================================================
// SECTION: Consumer
// ============================================================================

/// Bounded, ordered capture queue.
///
/// # Invariants
/// - Items are read in the order they were recorded.
/// - Reads never block past their timeout.
pub struct CaptureQueue<T> {
    /// Sender cloned into producers.
    sender: mpsc::Sender<T>,
    /// Single-consumer receiver.
    receiver: Mutex<mpsc::Receiver<T>>,
    /// Items pulled from the channel by `peek_all` but not yet consumed.
    pending: Mutex<VecDeque<T>>,
    /// Close signal shared with producers.
    closed: watch::Sender<bool>,
    /// Runtime used to drive blocking reads.
    runtime: Handle,
}

impl<T> CaptureQueue<T> {
    /// Creates a queue holding at most `capacity` unread items.
    #[must_use]
    pub fn new(capacity: usize, runtime: Handle) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let (closed, _) = watch::channel(false);
        Self {
            sender,
            receiver: Mutex::new(receiver),
            pending: Mutex::new(VecDeque::new()),
            closed,
            runtime,
        }
    }

    /// Returns a producer handle.
    #[must_use]
    pub fn sender(&self) -> CaptureSender<T> {
        CaptureSender {
            sender: self.sender.clone(),
            closed: self.closed.subscribe(),
        }
    }

    /// Blocks until the next item arrives or `timeout` elapses.
    ///
    /// Must not be called from inside an async task.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::Timeout`] on deadline or
    /// [`CaptureError::Closed`] once closed and drained.
    pub fn await_next(&self, timeout: Duration) -> Result<T, CaptureError> {
        if let Some(item) = self.pending.lock().unwrap_or_else(PoisonError::into_inner).pop_front() {
            return Ok(item);
        }
        let mut receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        if let Ok(item) = receiver.try_recv() {
            return Ok(item);
        }
        if self.is_closed() {
            return Err(CaptureError::Closed);
        }
        let mut closed = self.closed.subscribe();
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.runtime.block_on(async {
            tokio::select! {
                biased;
                item = receiver.recv() => item.ok_or(CaptureError::Closed),
                _ = closed.wait_for(|closed| *closed) => Err(CaptureError::Closed),
                () = tokio::time::sleep(timeout) => Err(CaptureError::Timeout(timeout_ms)),
            }
        })
    }

    /// Returns every item captured so far, consuming them.
    pub fn take_all(&self) -> Vec<T> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let mut receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        while let Ok(item) = receiver.try_recv() {
            pending.push_back(item);
        }
        pending.drain(..).collect()
    }

    /// Returns copies of every unread item without consuming them.
    pub fn peek_all(&self) -> Vec<T>
    where
        T: Clone,
    {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let mut receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        while let Ok(item) = receiver.try_recv() {
            pending.push_back(item);
        }
        pending.iter().cloned().collect()
    }

    /// Closes the queue; producers fail and drained readers wake.
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    /// Returns true once closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
