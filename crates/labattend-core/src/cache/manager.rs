use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use crate::api::{ApiError, ApiResponse, DataSource};
use crate::config::Config;
use crate::listeners::{Listeners, Subscription};
use crate::models::{
    AttendancePayload, AttendanceRecord, AttendanceStats, Identified, Member, MemberPayload,
};
use crate::roster::{build_daily_roster, RosterEntry};
use crate::status::StatusPolicy;

use super::chart::{derive_chart_series, ChartPoint};
use super::entry::{CacheEntry, EntryState, ResourceKey};

/// Cached snapshots are served without a network call for 5 minutes.
pub const CACHE_TTL_SECS: u64 = 300;

#[derive(Default)]
struct CacheState {
    /// Bumped by `clear`; fetches started under an older epoch are discarded.
    epoch: u64,
    members: CacheEntry<Vec<Member>>,
    attendance: CacheEntry<Vec<AttendanceRecord>>,
    stats: CacheEntry<AttendanceStats>,
}

type Slot<T> = fn(&mut CacheState) -> &mut CacheEntry<T>;

impl CacheState {
    fn members_mut(&mut self) -> &mut CacheEntry<Vec<Member>> {
        &mut self.members
    }

    fn attendance_mut(&mut self) -> &mut CacheEntry<Vec<AttendanceRecord>> {
        &mut self.attendance
    }

    fn stats_mut(&mut self) -> &mut CacheEntry<AttendanceStats> {
        &mut self.stats
    }

    /// Bookkeeping of one entry with the data replaced by a presence marker.
    fn meta(&self, key: ResourceKey) -> CacheEntry<()> {
        match key {
            ResourceKey::Members => bookkeeping(&self.members),
            ResourceKey::Attendance => bookkeeping(&self.attendance),
            ResourceKey::AttendanceStats => bookkeeping(&self.stats),
        }
    }
}

fn bookkeeping<T>(entry: &CacheEntry<T>) -> CacheEntry<()> {
    CacheEntry {
        data: entry.data.as_ref().map(|_| ()),
        last_fetched_at: entry.last_fetched_at,
        is_loading: entry.is_loading,
        refresh_pending: entry.refresh_pending,
        last_error: entry.last_error.clone(),
    }
}

struct Inner {
    source: Arc<dyn DataSource>,
    ttl: Duration,
    policy: StatusPolicy,
    state: Mutex<CacheState>,
    listeners: Listeners<(), Option<ResourceKey>>,
}

/// Clears the loading flag if a fetch future is dropped before completing.
struct LoadingGuard<'a, T> {
    inner: &'a Inner,
    slot: Slot<T>,
    epoch: u64,
    armed: bool,
}

impl<T> Drop for LoadingGuard<'_, T> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.inner.lock();
            if state.epoch == self.epoch {
                let entry = (self.slot)(&mut *state);
                entry.is_loading = false;
                entry.refresh_pending = false;
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory store for members, attendance and attendance statistics.
///
/// - Reads are served from the snapshot while it is younger than the TTL.
/// - At most one fetch per resource is in flight; concurrent readers get the
///   current snapshot instead of starting another.
/// - A failed fetch keeps the previous snapshot and records the error.
/// - Mutations go to the backend first and patch the snapshot on success.
///
/// Clone is cheap and every clone shares the same state.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<Inner>,
}

impl CacheManager {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        Self::with_settings(source, Duration::from_secs(CACHE_TTL_SECS), StatusPolicy::default())
    }

    pub fn from_config(source: Arc<dyn DataSource>, config: &Config) -> Self {
        Self::with_settings(source, Duration::from_secs(config.cache_ttl_secs), config.status)
    }

    pub fn with_settings(source: Arc<dyn DataSource>, ttl: Duration, policy: StatusPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                ttl,
                policy,
                state: Mutex::new(CacheState::default()),
                listeners: Listeners::new(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    pub fn policy(&self) -> StatusPolicy {
        self.inner.policy
    }

    // ===== Reads =====

    pub async fn members(&self, force_refresh: bool) -> Vec<Member> {
        self.get(ResourceKey::Members, force_refresh, CacheState::members_mut, |source| async move {
            source.list_members().await
        })
        .await
    }

    pub async fn attendance(&self, force_refresh: bool) -> Vec<AttendanceRecord> {
        self.get(ResourceKey::Attendance, force_refresh, CacheState::attendance_mut, |source| async move {
            source.list_attendance().await
        })
        .await
    }

    pub async fn attendance_stats(&self, force_refresh: bool) -> AttendanceStats {
        self.get(ResourceKey::AttendanceStats, force_refresh, CacheState::stats_mut, |source| async move {
            source.attendance_stats().await
        })
        .await
    }

    /// Force a fetch of one resource. Failures are visible via `last_error`.
    pub async fn refresh(&self, key: ResourceKey) {
        match key {
            ResourceKey::Members => {
                self.members(true).await;
            }
            ResourceKey::Attendance => {
                self.attendance(true).await;
            }
            ResourceKey::AttendanceStats => {
                self.attendance_stats(true).await;
            }
        }
    }

    async fn get<T, F, Fut>(&self, key: ResourceKey, force_refresh: bool, slot: Slot<T>, fetch: F) -> T
    where
        T: Clone + Default,
        F: Fn(Arc<dyn DataSource>) -> Fut,
        Fut: Future<Output = ApiResponse<T>>,
    {
        let epoch = {
            let mut state = self.inner.lock();
            let epoch = state.epoch;
            let entry = slot(&mut *state);

            if entry.is_loading {
                if force_refresh {
                    entry.refresh_pending = true;
                }
                debug!(
                    resource = %key,
                    queued = force_refresh,
                    "Fetch already in flight, serving current snapshot"
                );
                return entry.data.clone().unwrap_or_default();
            }
            if !force_refresh && entry.data.is_some() && !entry.is_stale_at(Utc::now(), self.inner.ttl) {
                debug!(resource = %key, "Cache hit");
                return entry.data.clone().unwrap_or_default();
            }

            entry.is_loading = true;
            epoch
        };

        let mut guard = LoadingGuard {
            inner: &self.inner,
            slot,
            epoch,
            armed: true,
        };

        let (snapshot, updated) = loop {
            debug!(resource = %key, force = force_refresh, "Fetching");
            let response = fetch(Arc::clone(&self.inner.source)).await;

            let outcome = {
                let mut state = self.inner.lock();
                if state.epoch != epoch {
                    guard.armed = false;
                    debug!(resource = %key, "Cache cleared during fetch, discarding result");
                    return slot(&mut *state).data.clone().unwrap_or_default();
                }

                let entry = slot(&mut *state);
                if entry.refresh_pending {
                    // The response may predate whatever triggered the request.
                    entry.refresh_pending = false;
                    debug!(resource = %key, "Refresh requested during fetch, fetching again");
                    None
                } else if response.success {
                    entry.is_loading = false;
                    entry.data = Some(response.data.clone());
                    entry.last_fetched_at = Some(Utc::now());
                    entry.last_error = None;
                    Some((response.data, true))
                } else {
                    entry.is_loading = false;
                    let message = response
                        .message
                        .unwrap_or_else(|| format!("Failed to load {}", key));
                    warn!(resource = %key, error = %message, "Fetch failed, keeping cached snapshot");
                    entry.last_error = Some(message);
                    Some((entry.data.clone().unwrap_or_default(), false))
                }
            };

            if let Some(outcome) = outcome {
                break outcome;
            }
        };
        guard.armed = false;

        if updated {
            self.notify(Some(key));
        }
        snapshot
    }

    // ===== Mutations =====

    pub async fn create_member(&self, payload: &MemberPayload) -> Result<Member, ApiError> {
        let member = self
            .inner
            .source
            .create_member(payload)
            .await
            .inspect_err(|e| warn!(error = %e, "Create member failed"))?;
        self.patch(ResourceKey::Members, CacheState::members_mut, |list| upsert(list, member.clone()));
        Ok(member)
    }

    pub async fn update_member(&self, id: &str, payload: &MemberPayload) -> Result<Member, ApiError> {
        let member = self
            .inner
            .source
            .update_member(id, payload)
            .await
            .inspect_err(|e| warn!(member = id, error = %e, "Update member failed"))?;
        self.patch(ResourceKey::Members, CacheState::members_mut, |list| {
            replace_by_id(list, id, member.clone())
        });
        Ok(member)
    }

    pub async fn delete_member(&self, id: &str) -> Result<(), ApiError> {
        self.inner
            .source
            .delete_member(id)
            .await
            .inspect_err(|e| warn!(member = id, error = %e, "Delete member failed"))?;
        self.patch(ResourceKey::Members, CacheState::members_mut, |list| remove_by_id(list, id));
        Ok(())
    }

    pub async fn create_attendance(&self, payload: &AttendancePayload) -> Result<AttendanceRecord, ApiError> {
        let record = self
            .inner
            .source
            .create_attendance(payload)
            .await
            .inspect_err(|e| warn!(error = %e, "Create attendance failed"))?;
        self.patch(ResourceKey::Attendance, CacheState::attendance_mut, |list| {
            upsert(list, record.clone())
        });
        Ok(record)
    }

    pub async fn update_attendance(
        &self,
        id: &str,
        payload: &AttendancePayload,
    ) -> Result<AttendanceRecord, ApiError> {
        let record = self
            .inner
            .source
            .update_attendance(id, payload)
            .await
            .inspect_err(|e| warn!(record = id, error = %e, "Update attendance failed"))?;
        self.patch(ResourceKey::Attendance, CacheState::attendance_mut, |list| {
            replace_by_id(list, id, record.clone())
        });
        Ok(record)
    }

    pub async fn delete_attendance(&self, id: &str) -> Result<(), ApiError> {
        self.inner
            .source
            .delete_attendance(id)
            .await
            .inspect_err(|e| warn!(record = id, error = %e, "Delete attendance failed"))?;
        self.patch(ResourceKey::Attendance, CacheState::attendance_mut, |list| remove_by_id(list, id));
        Ok(())
    }

    /// Apply a confirmed mutation to the snapshot, if one is loaded, and
    /// notify. Attendance changes also age out the server-side statistics.
    fn patch<T>(&self, key: ResourceKey, slot: Slot<T>, apply: impl FnOnce(&mut T)) {
        {
            let mut state = self.inner.lock();
            let entry = slot(&mut *state);
            if let Some(data) = entry.data.as_mut() {
                apply(data);
                entry.last_fetched_at = Some(Utc::now());
            }
            if key == ResourceKey::Attendance {
                state.stats.last_fetched_at = None;
            }
        }
        self.notify(Some(key));
    }

    // ===== Subscribers =====

    /// Register a change callback. It receives the key that changed, or
    /// `None` after `clear`.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<ResourceKey>) + Send + Sync + 'static,
    {
        self.inner
            .listeners
            .subscribe((), move |key: &Option<ResourceKey>| callback(*key))
    }

    fn notify(&self, key: Option<ResourceKey>) {
        let delivered = self.inner.listeners.notify(|_| true, &key);
        debug!(resource = ?key, delivered = delivered, "Notified subscribers");
    }

    /// Drop every snapshot and timestamp and notify with no key.
    pub fn clear(&self) {
        {
            let mut state = self.inner.lock();
            let epoch = state.epoch + 1;
            *state = CacheState {
                epoch,
                ..CacheState::default()
            };
        }
        info!("Cache cleared");
        self.notify(None);
    }

    // ===== Snapshot accessors (never fetch) =====

    pub fn cached_members(&self) -> Vec<Member> {
        self.inner.lock().members.data.clone().unwrap_or_default()
    }

    pub fn cached_attendance(&self) -> Vec<AttendanceRecord> {
        self.inner.lock().attendance.data.clone().unwrap_or_default()
    }

    pub fn cached_stats(&self) -> Option<AttendanceStats> {
        self.inner.lock().stats.data.clone()
    }

    pub fn state(&self, key: ResourceKey) -> EntryState {
        self.inner.lock().meta(key).state()
    }

    pub fn is_loading(&self, key: ResourceKey) -> bool {
        self.state(key) == EntryState::Loading
    }

    pub fn last_error(&self, key: ResourceKey) -> Option<String> {
        self.inner.lock().meta(key).last_error
    }

    pub fn last_fetched_at(&self, key: ResourceKey) -> Option<DateTime<Utc>> {
        self.inner.lock().meta(key).last_fetched_at
    }

    pub fn is_stale(&self, key: ResourceKey) -> bool {
        let meta = self.inner.lock().meta(key);
        meta.is_stale_at(Utc::now(), self.inner.ttl)
    }

    /// "just now", "5m ago", or "never".
    pub fn age_display(&self, key: ResourceKey) -> String {
        let meta = self.inner.lock().meta(key);
        meta.age_display_at(Utc::now())
    }

    // ===== Derived views =====

    /// Seven-day present/absent series over the cached attendance.
    pub fn chart_series(&self) -> Vec<ChartPoint> {
        let state = self.inner.lock();
        let records = state.attendance.data.as_deref().unwrap_or_default();
        derive_chart_series(records, &self.inner.policy)
    }

    /// Roster for `date` from the cached members and attendance.
    pub fn daily_roster(&self, date: NaiveDate, now: NaiveDateTime) -> Vec<RosterEntry> {
        let state = self.inner.lock();
        let members = state.members.data.as_deref().unwrap_or_default();
        let records = state.attendance.data.as_deref().unwrap_or_default();
        build_daily_roster(members, records, date, now, &self.inner.policy)
    }
}

fn upsert<T: Identified>(list: &mut Vec<T>, item: T) {
    match list.iter().position(|x| x.id() == item.id()) {
        Some(i) => list[i] = item,
        None => list.push(item),
    }
}

fn replace_by_id<T: Identified>(list: &mut Vec<T>, id: &str, item: T) {
    match list.iter().position(|x| x.id() == id) {
        Some(i) => list[i] = item,
        None => list.push(item),
    }
}

fn remove_by_id<T: Identified>(list: &mut Vec<T>, id: &str) {
    list.retain(|x| x.id() != id);
}

// ============================================================================
// Tests
// ============================================================================
