//! Event Queue
//!
//! Serializes every state-mutating entry into the orchestrator: at most one
//! event is processed at a time, and callers that arrive while the queue is
//! busy are suspended and resumed in strict FIFO order.
//!
//! # Why not an async mutex
//!
//! The queue is an explicit wait list plus a busy flag. On release the busy
//! flag is handed directly to the next live waiter inside the same critical
//! section, so there is no window where a newly arriving caller can slip in
//! ahead of a queued one. The guard releases on drop, which keeps the queue
//! making progress even when a handler fails mid-flight.

use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::oneshot;
use tracing::trace;

struct QueueInner {
    busy: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// FIFO mutual-exclusion gate for serialized events.
pub struct EventQueue {
    inner: Mutex<QueueInner>,
}

impl EventQueue {
    /// Create an idle queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                busy: false,
                waiters: VecDeque::new(),
            }),
        }
    }

    /// Enter the serialized region.
    ///
    /// Returns immediately when the queue is idle; otherwise suspends until
    /// every earlier caller has finished. Hold the guard for the whole
    /// handler; dropping it releases the queue. Cancellation-safe: a caller
    /// whose future is dropped mid-wait (timeout, `select!`) never strands
    /// the region, even when the handoff already happened.
    pub async fn acquire(&self) -> QueueGuard<'_> {
        let waiter = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.busy {
                inner.busy = true;
                return QueueGuard { queue: self };
            }
            let (tx, rx) = oneshot::channel();
            inner.waiters.push_back(tx);
            trace!("Event queue busy, {} waiter(s) queued", inner.waiters.len());
            rx
        };

        // The releasing holder hands the busy flag over without clearing it,
        // so a successful recv means the region is ours. The handoff wrapper
        // covers the window between the send and this poll: if the future is
        // dropped in it, the permit is passed on instead of lost.
        let mut handoff = PendingHandoff {
            queue: self,
            waiter: Some(waiter),
        };
        if let Some(waiter) = handoff.waiter.as_mut() {
            let _ = waiter.await;
        }
        handoff.waiter = None;
        QueueGuard { queue: self }
    }

    /// Check whether an event is currently being processed.
    pub fn is_busy(&self) -> bool {
        self.inner.lock().unwrap().busy
    }

    /// Number of callers currently waiting their turn.
    pub fn queued(&self) -> usize {
        self.inner.lock().unwrap().waiters.len()
    }

    fn release(&self) {
        let mut inner = self.inner.lock().unwrap();
        while let Some(waiter) = inner.waiters.pop_front() {
            // A waiter whose future was dropped is skipped
            if waiter.send(()).is_ok() {
                return;
            }
        }
        inner.busy = false;
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive hold on the serialized region; released on drop.
pub struct QueueGuard<'a> {
    queue: &'a EventQueue,
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        self.queue.release();
    }
}

/// A queued waiter between enqueue and guard construction.
///
/// Dropped with the permit already delivered but unconsumed, it releases
/// the region on the waiter's behalf; dropped before delivery, the dead
/// oneshot makes `release` skip this waiter.
struct PendingHandoff<'a> {
    queue: &'a EventQueue,
    waiter: Option<oneshot::Receiver<()>>,
}

impl Drop for PendingHandoff<'_> {
    fn drop(&mut self) {
        let Some(mut waiter) = self.waiter.take() else {
            return;
        };
        if waiter.try_recv().is_ok() {
            self.queue.release();
        }
    }
}
