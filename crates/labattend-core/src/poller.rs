//! Long-interval fallback refresh.
//!
//! The realtime channel is the primary invalidation trigger. The poller is a
//! heartbeat on top of it for events the stream might have missed, at a
//! cadence far slower than push updates.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::{CacheManager, ResourceKey};

/// Default fallback refresh interval.
pub const DEFAULT_FALLBACK_POLL_SECS: u64 = 300;

/// Handle to a running poller. The timer stops on `stop()` or when the
/// handle is dropped.
#[must_use = "dropping the poller stops it"]
pub struct FallbackPoller {
    task: Option<JoinHandle<()>>,
    interval: Duration,
}

impl FallbackPoller {
    /// Force a refresh of `keys` every `interval`, the first one after a
    /// full interval. Must be called from within a Tokio runtime.
    pub fn start(cache: CacheManager, interval: Duration, keys: Vec<ResourceKey>) -> Self {
        let period = interval.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                debug!(resources = ?keys, "Fallback refresh");
                for &key in &keys {
                    cache.refresh(key).await;
                }
            }
        });

        info!(interval_secs = interval.as_secs(), "Fallback poller started");
        Self {
            task: Some(task),
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Fallback poller stopped");
        }
    }
}

impl Drop for FallbackPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::test_support::MockSource;

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_each_interval() {
        let source = Arc::new(MockSource::default());
        let cache = CacheManager::new(source.clone());
        let poller = FallbackPoller::start(cache, Duration::from_secs(300), vec![ResourceKey::Attendance]);

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(source.attendance_calls(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(source.attendance_calls(), 1);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(source.attendance_calls(), 3);
        assert_eq!(source.member_calls(), 0);
        assert!(poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_drop_cancel_timer() {
        let source = Arc::new(MockSource::default());
        let cache = CacheManager::new(source.clone());

        let mut stopped = FallbackPoller::start(cache.clone(), Duration::from_secs(10), vec![ResourceKey::Members]);
        stopped.stop();
        stopped.stop();
        assert!(!stopped.is_running());

        let dropped = FallbackPoller::start(cache, Duration::from_secs(10), vec![ResourceKey::Members]);
        drop(dropped);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.member_calls(), 0);
    }
}
