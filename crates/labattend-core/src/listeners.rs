//! Callback registry shared by the cache manager and the realtime channel.
//!
//! Delivery works from a snapshot of the registered callbacks taken before
//! any callback runs, so a callback may subscribe or unsubscribe (itself or
//! others) without deadlocking. A panicking callback is caught and logged;
//! the remaining callbacks still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::error;

pub type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct Entry<K, A> {
    id: u64,
    topic: K,
    callback: Callback<A>,
}

struct Registry<K, A> {
    next_id: u64,
    entries: Vec<Entry<K, A>>,
}

trait Unregister: Send + Sync {
    fn unregister(&self, id: u64);
}

impl<K: Send + 'static, A: 'static> Unregister for Mutex<Registry<K, A>> {
    fn unregister(&self, id: u64) {
        let mut registry = self.lock().unwrap_or_else(PoisonError::into_inner);
        registry.entries.retain(|e| e.id != id);
    }
}

/// Handle returned by `subscribe`. Unsubscribing is idempotent and safe to
/// call from inside a callback. Dropping the handle does not unsubscribe.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    registry: Weak<dyn Unregister>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Callbacks keyed by a topic `K`, each receiving a `&A`.
pub struct Listeners<K, A> {
    inner: Arc<Mutex<Registry<K, A>>>,
}

impl<K, A> Clone for Listeners<K, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K: Send + 'static, A: 'static> Default for Listeners<K, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Send + 'static, A: 'static> Listeners<K, A> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Registry<K, A>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, topic: K, callback: F) -> Subscription
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.lock();
            registry.next_id += 1;
            let id = registry.next_id;
            registry.entries.push(Entry {
                id,
                topic,
                callback: Arc::new(callback),
            });
            id
        };

        let strong: Arc<dyn Unregister> = self.inner.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&strong),
        }
    }

    /// Deliver `arg` to every callback whose topic passes `filter`, in
    /// registration order. Returns how many callbacks completed normally.
    pub fn notify(&self, filter: impl Fn(&K) -> bool, arg: &A) -> usize {
        let targets: Vec<(u64, Callback<A>)> = self
            .lock()
            .entries
            .iter()
            .filter(|e| filter(&e.topic))
            .map(|e| (e.id, Arc::clone(&e.callback)))
            .collect();

        let mut delivered = 0;
        for (id, callback) in targets {
            match catch_unwind(AssertUnwindSafe(|| callback(arg))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    let reason = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    error!(subscriber = id, reason = %reason, "Subscriber callback panicked");
                }
            }
        }
        delivered
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
