use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::de::{self, KeyGroup};
use super::{AttendanceRecord, Member};

const SCAN_KEYS: &[KeyGroup] = &[
    ("id", &["_id"]),
    ("idRfid", &["id_rfid", "rfid", "uid"]),
    ("memberId", &["member_id"]),
    ("deviceId", &["device_id"]),
    ("scannedAt", &["timestamp", "createdAt"]),
    ("scanType", &["type"]),
];

const DEVICE_KEYS: &[KeyGroup] = &[
    ("deviceId", &["id"]),
    ("online", &["isOnline"]),
    ("lastHeartbeat", &["lastSeen"]),
];

/// A single card tap reported by a reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct RfidScan {
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub id: Option<String>,
    #[serde(deserialize_with = "de::string_or_number")]
    pub id_rfid: String,
    #[serde(default, deserialize_with = "de::member_ref")]
    pub member_id: Option<String>,
    #[serde(default)]
    pub nama: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub scanned_at: Option<String>,
    #[serde(default)]
    pub scan_type: Option<String>,
}

impl<'de> Deserialize<'de> for RfidScan {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::with_aliases(deserializer, SCAN_KEYS, |value| RfidScan::deserialize(value))
    }
}

impl Serialize for RfidScan {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RfidScan::serialize(self, serializer)
    }
}

impl RfidScan {
    /// A scan is unknown when no member claims the card.
    pub fn is_unknown(&self) -> bool {
        self.member_id.is_none()
    }
}

/// Body for `POST /rfid/scan`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub id_rfid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// Outcome of a recorded scan: which member, and the check-in/out it produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub attendance: Option<AttendanceRecord>,
}

/// Reader health as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct DeviceStatus {
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub device_id: Option<String>,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub last_heartbeat: Option<String>,
}

impl<'de> Deserialize<'de> for DeviceStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::with_aliases(deserializer, DEVICE_KEYS, |value| DeviceStatus::deserialize(value))
    }
}

impl Serialize for DeviceStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        DeviceStatus::serialize(self, serializer)
    }
}
