use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::de::{self, KeyGroup};
use super::{AttendanceRecord, RfidScan};

const STATS_KEYS: &[KeyGroup] = &[
    ("totalMembers", &["totalMember"]),
    ("totalRecords", &["totalAttendance"]),
    ("hadirHariIni", &["presentToday", "hadir"]),
    ("tidakHadirHariIni", &["absentToday", "tidakHadir"]),
    ("attendanceRate", &["rate"]),
];

const DASHBOARD_KEYS: &[KeyGroup] = &[("recentAttendance", &["recentAttendances"])];
const SUMMARY_KEYS: &[KeyGroup] = &[("onDutyNow", &["sedangPiket"])];

/// Aggregate counters served by `GET /attendance/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase", default)]
pub struct AttendanceStats {
    pub total_members: u64,
    pub total_records: u64,
    pub hadir_hari_ini: u64,
    pub tidak_hadir_hari_ini: u64,
    pub attendance_rate: f64,
}

impl<'de> Deserialize<'de> for AttendanceStats {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::with_aliases(deserializer, STATS_KEYS, |value| AttendanceStats::deserialize(value))
    }
}

impl Serialize for AttendanceStats {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AttendanceStats::serialize(self, serializer)
    }
}

/// Payload of `GET /dashboard`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase", default)]
pub struct DashboardData {
    pub stats: AttendanceStats,
    pub recent_attendance: Vec<AttendanceRecord>,
    pub recent_scans: Vec<RfidScan>,
}

impl<'de> Deserialize<'de> for DashboardData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::with_aliases(deserializer, DASHBOARD_KEYS, |value| DashboardData::deserialize(value))
    }
}

impl Serialize for DashboardData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DashboardData::serialize(self, serializer)
    }
}

/// Payload of `GET /dashboard/summary`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase", default)]
pub struct DashboardSummary {
    pub total_members: u64,
    pub present_today: u64,
    pub absent_today: u64,
    pub on_duty_now: u64,
}

impl<'de> Deserialize<'de> for DashboardSummary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::with_aliases(deserializer, SUMMARY_KEYS, |value| DashboardSummary::deserialize(value))
    }
}

impl Serialize for DashboardSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DashboardSummary::serialize(self, serializer)
    }
}
