use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::cache::CacheManager;
use crate::config::RealtimeConfig;
use crate::listeners::{Listeners, Subscription};

use super::error::RealtimeError;
use super::event::{RealtimeEvent, ALL_EVENTS};
use super::transport::{EventTransport, SseTransport};

/// Consecutive failed connection attempts before the channel gives up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Delay before the first reconnect; doubles with every further attempt.
pub const DEFAULT_RECONNECT_BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_RECONNECT_BASE_DELAY_MS),
        }
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self {
            max_attempts: config.max_reconnect_attempts,
            base_delay: Duration::from_millis(config.reconnect_base_delay_ms),
        }
    }

    /// Wait after the `failures`-th consecutive failure: base, 2×base, 4×base…
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }
}

struct Shared {
    transport: Arc<dyn EventTransport>,
    policy: ReconnectPolicy,
    listeners: Listeners<String, RealtimeEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    /// Bumped by `disconnect` so a cancelled worker can no longer publish.
    generation: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn lock_task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.lock_task().take() {
            handle.abort();
        }
    }
}

/// Long-lived subscription to the backend's attendance event stream.
///
/// Clone is cheap; clones share the connection and subscribers. The
/// connection task stops when the last clone is dropped.
#[derive(Clone)]
pub struct RealtimeChannel {
    shared: Arc<Shared>,
}

impl RealtimeChannel {
    pub fn new(transport: Arc<dyn EventTransport>) -> Self {
        Self::with_policy(transport, ReconnectPolicy::default())
    }

    pub fn with_policy(transport: Arc<dyn EventTransport>, policy: ReconnectPolicy) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            shared: Arc::new(Shared {
                transport,
                policy,
                listeners: Listeners::new(),
                status: Arc::new(status),
                generation: Arc::new(AtomicU64::new(0)),
                task: Mutex::new(None),
            }),
        }
    }

    /// Channel over server-sent events from the API's realtime endpoint.
    pub fn sse(api: ApiClient, config: &RealtimeConfig) -> Result<Self, RealtimeError> {
        let transport = SseTransport::new(api)?;
        Ok(Self::with_policy(
            Arc::new(transport),
            ReconnectPolicy::from_config(config),
        ))
    }

    pub fn policy(&self) -> ReconnectPolicy {
        self.shared.policy
    }

    /// Start the connection task. A no-op while a task is running; after
    /// the channel gave up or was disconnected it starts fresh.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut task = self.shared.lock_task();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("Realtime channel already running");
            return;
        }

        let worker = Worker {
            transport: Arc::clone(&self.shared.transport),
            policy: self.shared.policy,
            listeners: self.shared.listeners.clone(),
            status: Arc::clone(&self.shared.status),
            generation: Arc::clone(&self.shared.generation),
            id: self.shared.generation.load(Ordering::SeqCst),
        };
        *task = Some(tokio::spawn(worker.run()));
    }

    /// Close the connection, drop every subscriber and reset to
    /// `Disconnected`. A later `connect` starts from a clean slate.
    pub fn disconnect(&self) {
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = self.shared.lock_task().take() {
            handle.abort();
        }
        self.shared.listeners.clear();
        self.shared.status.send_replace(ConnectionStatus::Disconnected);
        info!("Realtime channel disconnected");
    }

    /// Register a callback for one event type, or `"all"` for every event.
    pub fn subscribe<F>(&self, event_type: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&RealtimeEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.subscribe(event_type.into(), callback)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.listeners.len()
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn status_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    /// Refresh the cache entries an event affects, one background fetch per
    /// key. Unrelated entries are left alone.
    pub fn bind_cache(&self, cache: CacheManager) -> Subscription {
        self.subscribe(ALL_EVENTS, move |event: &RealtimeEvent| {
            for &key in event.affected_resources() {
                debug!(event = %event.event_type, resource = %key, "Refreshing from realtime event");
                let cache = cache.clone();
                tokio::spawn(async move { cache.refresh(key).await });
            }
        })
    }
}

/// State owned by one connection task.
struct Worker {
    transport: Arc<dyn EventTransport>,
    policy: ReconnectPolicy,
    listeners: Listeners<String, RealtimeEvent>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    generation: Arc<AtomicU64>,
    id: u64,
}

impl Worker {
    fn publish(&self, next: ConnectionStatus) {
        self.status.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != self.id || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    async fn run(self) {
        let mut failures: u32 = 0;

        loop {
            self.publish(ConnectionStatus::Connecting);

            let error = match self.transport.open().await {
                Ok(mut events) => {
                    failures = 0;
                    self.publish(ConnectionStatus::Connected);
                    info!("Realtime channel connected");

                    let mut error = RealtimeError::Closed;
                    while let Some(item) = events.next().await {
                        match item {
                            Ok(event) => self.dispatch(&event),
                            Err(e) => {
                                error = e;
                                break;
                            }
                        }
                    }
                    error
                }
                Err(e) => e,
            };

            failures += 1;
            if failures >= self.policy.max_attempts {
                warn!(attempts = failures, error = %error, "Realtime channel giving up");
                self.publish(ConnectionStatus::Disconnected);
                return;
            }

            let delay = self.policy.delay_for(failures);
            warn!(
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Realtime connection lost, reconnecting"
            );
            self.publish(ConnectionStatus::Connecting);
            tokio::time::sleep(delay).await;
        }
    }

    /// Type-specific subscribers first, then the `"all"` subscribers.
    fn dispatch(&self, event: &RealtimeEvent) {
        let mut delivered = 0;
        if event.event_type != ALL_EVENTS {
            delivered += self
                .listeners
                .notify(|topic| *topic == event.event_type, event);
        }
        delivered += self.listeners.notify(|topic| topic == ALL_EVENTS, event);
        debug!(event = %event.event_type, delivered = delivered, "Dispatched realtime event");
    }
}
