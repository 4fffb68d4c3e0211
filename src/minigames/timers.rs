//! Cancellable deferred callbacks owned by a minigame session.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tokio::task::JoinHandle;

/// Handle returned by the scheduling methods.
pub type TimerId = u64;

type Handles = Arc<Mutex<HashMap<TimerId, JoinHandle<()>>>>;

/// Set of timers that die with their session.
///
/// Fired one-shot timers remove themselves; everything still pending is
/// aborted by [`cancel_all`](Self::cancel_all) or on drop.
#[derive(Debug, Default)]
pub struct SessionTimers {
    next_id: AtomicU64,
    handles: Handles,
}

impl SessionTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` once after `delay`. Must be called inside a tokio runtime.
    pub fn schedule_once<F>(&self, delay: Duration, callback: F) -> TimerId
    where
        F: FnOnce() + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handles = Arc::clone(&self.handles);
        // Holding the lock while spawning keeps the task from unregistering
        // itself before it was registered.
        let mut guard = self.lock();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            callback();
        });
        guard.insert(id, task);
        id
    }

    /// Run `tick` after `first`, then again after every delay it returns,
    /// until it returns `None` or the timer is cancelled.
    pub fn schedule_periodic<F>(&self, first: Duration, mut tick: F) -> TimerId
    where
        F: FnMut() -> Option<Duration> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handles = Arc::clone(&self.handles);
        let mut guard = self.lock();
        let task = tokio::spawn(async move {
            let mut delay = first;
            loop {
                tokio::time::sleep(delay).await;
                match tick() {
                    Some(next) => delay = next,
                    None => break,
                }
            }
            handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
        });
        guard.insert(id, task);
        id
    }

    /// Abort one timer; `false` when it already fired or was cancelled.
    pub fn cancel(&self, id: TimerId) -> bool {
        match self.lock().remove(&id) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every pending timer.
    pub fn cancel_all(&self) {
        let drained: Vec<_> = self.lock().drain().map(|(_, task)| task).collect();
        for task in drained {
            task.abort();
        }
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<TimerId, JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let count = Arc::new(AtomicUsize::new(0));
        let read = {
            let count = Arc::clone(&count);
            move || count.load(Ordering::SeqCst)
        };
        (count, read)
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_fires_and_unregisters() {
        let timers = SessionTimers::new();
        let (count, fired) = counter();
        timers.schedule_once(Duration::from_secs(2), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(timers.pending(), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(fired(), 1);
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timers_never_call_back() {
        let timers = SessionTimers::new();
        let (count, fired) = counter();
        let once = Arc::clone(&count);
        timers.schedule_once(Duration::from_secs(1), move || {
            once.fetch_add(1, Ordering::SeqCst);
        });
        timers.schedule_periodic(Duration::from_millis(100), move || {
            count.fetch_add(1, Ordering::SeqCst);
            Some(Duration::from_millis(100))
        });
        assert_eq!(timers.pending(), 2);

        timers.cancel_all();
        assert_eq!(timers.pending(), 0);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_follows_returned_delays_until_none() {
        let timers = SessionTimers::new();
        let (count, fired) = counter();
        timers.schedule_periodic(Duration::from_secs(1), move || {
            let ticks = count.fetch_add(1, Ordering::SeqCst) + 1;
            (ticks < 3).then(|| Duration::from_secs(ticks as u64))
        });

        // Ticks at 1 s, 2 s and 4 s.
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        assert_eq!(fired(), 2);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired(), 3);
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_single_timer() {
        let timers = SessionTimers::new();
        let (count, fired) = counter();
        let id = timers.schedule_once(Duration::from_secs(1), move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_owner_cancels() {
        let (count, fired) = counter();
        {
            let timers = SessionTimers::new();
            timers.schedule_once(Duration::from_secs(1), move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired(), 0);
    }
}
