use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::ResourceKey;

/// Subscription topic that receives every event.
pub const ALL_EVENTS: &str = "all";

pub const ATTENDANCE_SCAN: &str = "attendance_scan";
pub const ATTENDANCE_UPDATE: &str = "attendance_update";
pub const MEMBER_UPDATE: &str = "member_update";
pub const HEARTBEAT: &str = "heartbeat";

/// One frame from the attendance event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl RealtimeEvent {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: None,
        }
    }

    /// Cache entries made stale by this event. Unknown types and heartbeats
    /// touch nothing.
    pub fn affected_resources(&self) -> &'static [ResourceKey] {
        match self.event_type.as_str() {
            ATTENDANCE_SCAN | ATTENDANCE_UPDATE => {
                &[ResourceKey::Attendance, ResourceKey::AttendanceStats]
            }
            MEMBER_UPDATE => &[ResourceKey::Members],
            _ => &[],
        }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.event_type == HEARTBEAT
    }
}
