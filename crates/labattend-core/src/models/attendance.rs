use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::de::{self, KeyGroup};
use crate::status::is_absent_marker;

const RECORD_KEYS: &[KeyGroup] = &[
    ("id", &["_id"]),
    ("memberId", &["member_id"]),
    ("idRfid", &["id_rfid"]),
    ("tanggal", &["date"]),
    ("jamDatang", &["jam_datang"]),
    ("jamPulang", &["jam_pulang"]),
];

/// One member's check-in/check-out pair for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct AttendanceRecord {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "de::member_ref")]
    pub member_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub nim: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub id_rfid: Option<String>,
    #[serde(default)]
    pub nama: Option<String>,
    #[serde(default)]
    pub tanggal: String,
    #[serde(default)]
    pub jam_datang: Option<String>,
    #[serde(default)]
    pub jam_pulang: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl<'de> Deserialize<'de> for AttendanceRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::with_aliases(deserializer, RECORD_KEYS, |value| AttendanceRecord::deserialize(value))
    }
}

impl Serialize for AttendanceRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        AttendanceRecord::serialize(self, serializer)
    }
}

impl AttendanceRecord {
    /// Calendar day of the record, read from the leading `YYYY-MM-DD` of `tanggal`.
    pub fn date(&self) -> Option<NaiveDate> {
        let head = self.tanggal.trim().get(..10)?;
        NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
    }

    pub fn has_check_in(&self) -> bool {
        !is_absent_marker(self.jam_datang.as_deref())
    }

    pub fn has_check_out(&self) -> bool {
        !is_absent_marker(self.jam_pulang.as_deref())
    }

    pub fn jam_datang_display(&self) -> &str {
        display_time(self.jam_datang.as_deref())
    }

    pub fn jam_pulang_display(&self) -> &str {
        display_time(self.jam_pulang.as_deref())
    }
}

fn display_time(token: Option<&str>) -> &str {
    if is_absent_marker(token) {
        "-"
    } else {
        token.unwrap_or("-").trim()
    }
}

/// Body for attendance create/update requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendancePayload {
    pub member_id: String,
    pub tanggal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jam_datang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jam_pulang: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}
