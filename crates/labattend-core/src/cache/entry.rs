use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Cached resources. Subscribers receive the key of the resource that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKey {
    Members,
    Attendance,
    AttendanceStats,
}

impl ResourceKey {
    pub const ALL: [ResourceKey; 3] = [
        ResourceKey::Members,
        ResourceKey::Attendance,
        ResourceKey::AttendanceStats,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKey::Members => "members",
            ResourceKey::Attendance => "attendance",
            ResourceKey::AttendanceStats => "attendanceStats",
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Never fetched (or cleared)
    Empty,
    /// A fetch is in flight
    Loading,
    /// Holds data from the last successful fetch
    Ready,
    /// The last fetch failed; any earlier data is still served
    Failed,
}

/// Snapshot of one resource plus its fetch bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: Option<T>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub is_loading: bool,
    /// A forced refresh arrived while a fetch was in flight; fetch once more
    /// when it lands.
    pub refresh_pending: bool,
    pub last_error: Option<String>,
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        Self {
            data: None,
            last_fetched_at: None,
            is_loading: false,
            refresh_pending: false,
            last_error: None,
        }
    }
}

impl<T> CacheEntry<T> {
    pub fn state(&self) -> EntryState {
        if self.is_loading {
            EntryState::Loading
        } else if self.last_error.is_some() {
            EntryState::Failed
        } else if self.data.is_some() {
            EntryState::Ready
        } else {
            EntryState::Empty
        }
    }

    /// Age of the snapshot; a timestamp in the future counts as zero.
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_fetched_at
            .map(|at| (now - at).to_std().unwrap_or(Duration::ZERO))
    }

    /// An entry never stamped is always stale.
    pub fn is_stale_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self.age_at(now) {
            Some(age) => age >= ttl,
            None => true,
        }
    }

    pub fn age_display_at(&self, now: DateTime<Utc>) -> String {
        match self.age_at(now) {
            Some(age) => age_display(age),
            None => "never".to_string(),
        }
    }
}

/// Short relative age: "just now", "5m ago", "2h ago", "3d ago".
pub fn age_display(age: Duration) -> String {
    let minutes = age.as_secs() / 60;
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            // Round up: 1h 30m+ becomes 2h
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}
