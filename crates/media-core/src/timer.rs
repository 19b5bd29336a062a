//! One-shot timers firing task messages.
//!
//! There is no cooperative cancellation inside in-flight operations:
//! owners interpret the fired message as a cancellation event. A
//! terminating owner simply stops scheduling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::trace;

/// Timer identifier.
pub type TimerId = u64;

/// Owner of one-shot timers.
pub struct TimerManager {
    next_id: AtomicU64,
    timers: Mutex<HashMap<TimerId, JoinHandle<()>>>,
}

impl TimerManager {
    /// Empty manager.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Schedule `action` to run once after `delay`.
    pub fn schedule(
        &self,
        delay: Duration,
        action: impl FnOnce() + Send + 'static,
    ) -> TimerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!("Schedule timer {} for {:?}", id, delay);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });
        self.timers.lock().expect("timer lock").insert(id, handle);
        id
    }

    /// Abort a scheduled timer; firing already-fired timers is a no-op.
    pub fn cancel(&self, id: TimerId) {
        if let Some(handle) = self.timers.lock().expect("timer lock").remove(&id) {
            handle.abort();
        }
    }

    /// Abort everything still scheduled.
    pub fn shutdown(&self) {
        let mut timers = self.timers.lock().expect("timer lock");
        for (_, handle) in timers.drain() {
            handle.abort();
        }
    }
}

impl Default for TimerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_timer_fires_once() {
        let manager = TimerManager::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        manager.schedule(Duration::from_millis(10), move || {
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancelled_timer_does_not_fire() {
        let manager = TimerManager::new();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let id = manager.schedule(Duration::from_millis(30), move || {
            flag.store(true, Ordering::SeqCst);
        });
        manager.cancel(id);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
