use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Re-armable one-shot signal between one waiter and any number of signalers.
///
/// A [`signal`](WaitGate::signal) that lands before [`wait`](WaitGate::wait)
/// is kept until consumed. Repeated signals before a wait collapse into one.
#[derive(Debug, Default)]
pub struct WaitGate {
    signaled: AtomicBool,
    notify: Notify,
}

impl WaitGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any signal left over from a previous use.
    pub fn arm(&self) {
        self.signaled.store(false, Ordering::Release);
    }

    /// Raise the signal and wake the waiter, if any.
    pub fn signal(&self) {
        self.signaled.store(true, Ordering::Release);
        self.notify.notify_one();
    }

    /// Whether a signal is pending.
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// Block until signaled, consuming the signal.
    pub async fn wait(&self) {
        loop {
            if self.signaled.swap(false, Ordering::AcqRel) {
                return;
            }
            // A permit stored by an earlier `signal` wakes us spuriously; the
            // flag check above decides.
            self.notify.notified().await;
        }
    }
}
