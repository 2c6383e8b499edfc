use chrono::Weekday;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::de::{self, KeyGroup};
use super::AttendanceRecord;

/// Prefix for ids of synthetic members built from unmatched records
pub const PLACEHOLDER_ID_PREFIX: &str = "unknown-";

/// Display name used when an unmatched record carries no name
const PLACEHOLDER_NAME: &str = "Tidak Dikenal";

const MEMBER_KEYS: &[KeyGroup] = &[
    ("id", &["_id"]),
    ("idRfid", &["id_rfid", "rfid"]),
    ("hariPiket", &["hari_piket"]),
];

/// A lab member as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", rename_all = "camelCase")]
pub struct Member {
    #[serde(deserialize_with = "de::string_or_number")]
    pub id: String,
    #[serde(default)]
    pub nama: String,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub nim: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub id_rfid: Option<String>,
    #[serde(default, deserialize_with = "de::day_list")]
    pub hari_piket: Vec<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub jurusan: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string_or_number")]
    pub angkatan: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl<'de> Deserialize<'de> for Member {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        de::with_aliases(deserializer, MEMBER_KEYS, |value| Member::deserialize(value))
    }
}

impl Serialize for Member {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Member::serialize(self, serializer)
    }
}

impl Member {
    /// Whether one of the member's duty days falls on `day`.
    pub fn is_scheduled_on(&self, day: Weekday) -> bool {
        self.hari_piket
            .iter()
            .any(|name| parse_weekday(name) == Some(day))
    }

    /// Synthetic member standing in for a record no roster entry claims.
    pub fn placeholder(record: &AttendanceRecord) -> Self {
        Self {
            id: format!("{}{}", PLACEHOLDER_ID_PREFIX, record.id),
            nama: record
                .nama
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| PLACEHOLDER_NAME.to_string()),
            nim: record.nim.clone(),
            id_rfid: record.id_rfid.clone(),
            hari_piket: Vec::new(),
            email: None,
            jurusan: None,
            angkatan: None,
            status: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.id.starts_with(PLACEHOLDER_ID_PREFIX)
    }

    pub fn nim_display(&self) -> &str {
        self.nim.as_deref().unwrap_or("-")
    }
}

/// Body for member create/update requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPayload {
    pub nama: String,
    pub nim: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_rfid: Option<String>,
    #[serde(default)]
    pub hari_piket: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jurusan: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub angkatan: Option<String>,
}

/// Indonesian display name for a weekday, as used in duty rosters.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Senin",
        Weekday::Tue => "Selasa",
        Weekday::Wed => "Rabu",
        Weekday::Thu => "Kamis",
        Weekday::Fri => "Jumat",
        Weekday::Sat => "Sabtu",
        Weekday::Sun => "Minggu",
    }
}

/// Parse an Indonesian or English day name, ignoring case and apostrophes.
pub fn parse_weekday(name: &str) -> Option<Weekday> {
    let normalized: String = name
        .trim()
        .chars()
        .filter(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();

    match normalized.as_str() {
        "senin" | "monday" | "mon" => Some(Weekday::Mon),
        "selasa" | "tuesday" | "tue" => Some(Weekday::Tue),
        "rabu" | "wednesday" | "wed" => Some(Weekday::Wed),
        "kamis" | "thursday" | "thu" => Some(Weekday::Thu),
        "jumat" | "friday" | "fri" => Some(Weekday::Fri),
        "sabtu" | "saturday" | "sat" => Some(Weekday::Sat),
        "minggu" | "ahad" | "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_json() -> &'static str {
        r#"{"_id": 3, "nama": "Siti Aminah", "nim": 1203456, "idRfid": "A1B2C3",
            "hariPiket": "Senin, Kamis", "email": null}"#
    }

    #[test]
    fn test_parse_member_lenient_fields() {
        let m: Member = serde_json::from_str(member_json()).unwrap();
        assert_eq!(m.id, "3");
        assert_eq!(m.nim.as_deref(), Some("1203456"));
        assert_eq!(m.id_rfid.as_deref(), Some("A1B2C3"));
        assert_eq!(m.hari_piket, vec!["Senin", "Kamis"]);
        assert!(m.email.is_none());
    }

    #[test]
    fn test_parse_member_with_virtual_id_and_legacy_keys() {
        let m: Member = serde_json::from_str(
            r#"{"_id": "665f1c", "id": "665f1c", "nama": "Budi", "idRfid": "04AA",
                "rfid": "stale", "hari_piket": ["Rabu"], "__v": 0}"#,
        )
        .unwrap();
        assert_eq!(m.id, "665f1c");
        assert_eq!(m.id_rfid.as_deref(), Some("04AA"));
        assert_eq!(m.hari_piket, vec!["Rabu"]);

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["id"], "665f1c");
        assert_eq!(json["hariPiket"], serde_json::json!(["Rabu"]));
        assert!(json.get("_id").is_none());
    }

    #[test]
    fn test_is_scheduled_on() {
        let m: Member = serde_json::from_str(member_json()).unwrap();
        assert!(m.is_scheduled_on(Weekday::Mon));
        assert!(m.is_scheduled_on(Weekday::Thu));
        assert!(!m.is_scheduled_on(Weekday::Fri));
    }

    #[test]
    fn test_parse_weekday_variants() {
        assert_eq!(parse_weekday("JUM'AT"), Some(Weekday::Fri));
        assert_eq!(parse_weekday(" minggu "), Some(Weekday::Sun));
        assert_eq!(parse_weekday("Wednesday"), Some(Weekday::Wed));
        assert_eq!(parse_weekday("libur"), None);
    }

    #[test]
    fn test_weekday_name_round_trips_through_parser() {
        for day in [Weekday::Mon, Weekday::Fri, Weekday::Sun] {
            assert_eq!(parse_weekday(weekday_name(day)), Some(day));
        }
    }

    #[test]
    fn test_placeholder_from_record() {
        let record: AttendanceRecord = serde_json::from_str(
            r#"{"id": 44, "tanggal": "2024-03-04", "nama": "  ", "idRfid": "FFEE"}"#,
        )
        .unwrap();
        let m = Member::placeholder(&record);
        assert_eq!(m.id, "unknown-44");
        assert_eq!(m.nama, "Tidak Dikenal");
        assert_eq!(m.id_rfid.as_deref(), Some("FFEE"));
        assert!(m.is_placeholder());
        assert_eq!(m.nim_display(), "-");
    }
}
