//! Retry Timer
//!
//! A cancelable, reschedulable one-shot timer. At most one delayed
//! recomputation is ever pending: arming the timer always aborts the
//! previous instance first, so repeated connectivity flaps restart the
//! same fixed delay instead of stacking recomputations.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

struct TimerSlot {
    /// Bumped on every schedule/cancel; a fired instance only proceeds
    /// when its generation is still the current one
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

/// One-shot recovery timer. Owned exclusively by the orchestrator.
pub struct RetryTimer {
    slot: Arc<Mutex<TimerSlot>>,
}

impl RetryTimer {
    /// Create an idle timer.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(TimerSlot {
                generation: 0,
                pending: None,
            })),
        }
    }

    /// Arm the timer: after `delay`, run `task` to completion.
    ///
    /// Any previously scheduled instance is aborted first, and an instance
    /// already past its sleep stands down when it sees it was superseded.
    /// The timer disarms itself before the callback runs, so the callback
    /// may cancel or reschedule freely.
    pub fn schedule<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = {
            let mut slot = self.slot.lock().unwrap();
            slot.generation += 1;
            if let Some(previous) = slot.pending.take() {
                debug!("Retry timer rescheduled, prior instance canceled");
                previous.abort();
            } else {
                debug!("Retry timer armed for {:?}", delay);
            }
            slot.generation
        };

        let task_slot = Arc::clone(&self.slot);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut slot = task_slot.lock().unwrap();
                if slot.generation != generation {
                    return;
                }
                slot.pending = None;
            }
            task.await;
        });

        let mut slot = self.slot.lock().unwrap();
        if slot.generation == generation {
            slot.pending = Some(handle);
        } else {
            // Superseded between the two locks
            handle.abort();
        }
    }

    /// Cancel a pending instance. No-op when idle or already fired.
    pub fn cancel(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.generation += 1;
        if let Some(handle) = slot.pending.take() {
            handle.abort();
        }
    }

    /// Check whether an instance is armed and has not yet fired.
    pub fn is_armed(&self) -> bool {
        self.slot
            .lock()
            .unwrap()
            .pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Default for RetryTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let timer = RetryTimer::new();
        let fired = Arc::new(AtomicU32::new(0));

        let counter = fired.clone();
        timer.schedule(Duration::from_millis(5000), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_armed());

        tokio::time::advance(Duration::from_millis(4999)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(2)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_cancels_prior() {
        let timer = RetryTimer::new();
        let fired = Arc::new(AtomicU32::new(0));

        for _ in 0..3 {
            let counter = fired.clone();
            timer.schedule(Duration::from_millis(5000), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::advance(Duration::from_millis(1000)).await;
        }

        tokio::time::advance(Duration::from_millis(5000)).await;
        tokio::task::yield_now().await;

        // Only the last instance survives
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_noop_when_idle() {
        let timer = RetryTimer::new();
        timer.cancel();
        assert!(!timer.is_armed());

        let fired = Arc::new(AtomicU32::new(0));
        let counter = fired.clone();
        timer.schedule(Duration::from_millis(100), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        timer.cancel();
        assert!(!timer.is_armed());

        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_instance_never_fires_or_disarms_replacement() {
        let timer = RetryTimer::new();
        let first_fired = Arc::new(AtomicU32::new(0));
        let second_fired = Arc::new(AtomicU32::new(0));

        let counter = first_fired.clone();
        timer.schedule(Duration::from_millis(1000), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // The first instance is past its deadline but has not run when the
        // replacement is armed; it must stand down without touching the
        // replacement's slot
        tokio::time::advance(Duration::from_millis(1000)).await;
        let counter = second_fired.clone();
        timer.schedule(Duration::from_millis(1000), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::task::yield_now().await;

        assert_eq!(first_fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_armed());

        // Cancel still reaches the replacement
        timer.cancel();
        tokio::time::advance(Duration::from_millis(2000)).await;
        tokio::task::yield_now().await;
        assert_eq!(second_fired.load(Ordering::SeqCst), 0);
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_may_cancel_and_reschedule() {
        let timer = Arc::new(RetryTimer::new());
        let fired = Arc::new(AtomicU32::new(0));

        // The callback cancels (a no-op by then) and re-arms, mirroring a
        // recovery recomputation that fails again
        let inner_timer = timer.clone();
        let counter = fired.clone();
        timer.schedule(Duration::from_millis(1000), async move {
            counter.fetch_add(1, Ordering::SeqCst);
            inner_timer.cancel();
            let counter = counter.clone();
            inner_timer.schedule(Duration::from_millis(1000), async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        });

        tokio::time::advance(Duration::from_millis(1001)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(timer.is_armed());

        tokio::time::advance(Duration::from_millis(1001)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
