//! Component C: re-armable logical timers.
//!
//! Boost::asio's `steady_timer` (the original implementation) delivers a
//! "cancelled" status to a wait's callback when it is cancelled out from
//! under it, and the callback is expected to check that status and skip its
//! error-reporting path. Rust's idiomatic equivalent doesn't run the
//! callback at all for a superseded wait: each `arm` bumps a generation
//! counter, and a sleeping task only invokes its callback if the generation
//! it captured is still current when it wakes. A stale wakeup simply
//! returns — which trivially satisfies "a cancelled expiry must not record
//! an error", without needing an explicit cancelled-status enum.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A single logical countdown timer. Re-arming is idempotent: it cancels
/// any pending wait and schedules a fresh one for the full duration.
#[derive(Clone)]
pub struct RearmableTimer {
    generation: Arc<AtomicU64>,
}

impl Default for RearmableTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl RearmableTimer {
    pub fn new() -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cancels any pending wait and schedules `on_fire` to run after
    /// `duration`, unless superseded by a later `arm`/`cancel` in the
    /// meantime.
    pub fn arm<F, Fut>(&self, duration: Duration, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let this_generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = self.generation.clone();

        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            if generation.load(Ordering::SeqCst) == this_generation {
                on_fire().await;
            }
        });
    }

    /// Cancels any pending wait without scheduling a new one.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}
