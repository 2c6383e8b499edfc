//! Attendance status derivation.
//!
//! Every call site that needs to know whether a member is present, on duty,
//! not yet arrived or absent goes through this module. Status is computed on
//! read from the record and the wall clock; it is never cached.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::AttendanceRecord;

/// Hour of day (0-23) from which a member with no check-in counts as absent.
pub const CUTOFF_HOUR: u32 = 18;

/// Minimum minutes between check-in and check-out for a day to count as present.
pub const MIN_DURATION_MINUTES: u32 = 60;

/// Marker the backend stores for a missing check-in or check-out time.
pub const ABSENT_MARKER: &str = "-";

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Displayed attendance state for one member on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivedStatus {
    /// Checked in and out with a valid duration
    Hadir,
    /// Checked in, not yet checked out
    SedangPiket,
    /// No check-in yet, cutoff not reached
    BelumHadir,
    /// No check-in after cutoff, or an invalid duration
    TidakHadir,
}

impl DerivedStatus {
    pub const ALL: [DerivedStatus; 4] = [
        DerivedStatus::Hadir,
        DerivedStatus::SedangPiket,
        DerivedStatus::BelumHadir,
        DerivedStatus::TidakHadir,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DerivedStatus::Hadir => "Hadir",
            DerivedStatus::SedangPiket => "Sedang Piket",
            DerivedStatus::BelumHadir => "Belum Hadir",
            DerivedStatus::TidakHadir => "Tidak Hadir",
        }
    }

    /// Present for charting purposes: on site now or completed a valid day.
    pub fn counts_as_present(&self) -> bool {
        matches!(self, DerivedStatus::Hadir | DerivedStatus::SedangPiket)
    }
}

impl fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Policy thresholds for status derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPolicy {
    pub cutoff_hour: u32,
    pub min_duration_minutes: u32,
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            cutoff_hour: CUTOFF_HOUR,
            min_duration_minutes: MIN_DURATION_MINUTES,
        }
    }
}

impl StatusPolicy {
    pub fn is_valid_duration(&self, jam_datang: Option<&str>, jam_pulang: Option<&str>) -> bool {
        duration_minutes(jam_datang, jam_pulang) >= self.min_duration_minutes
    }

    pub fn derive(&self, now_hour: u32, record: Option<&AttendanceRecord>) -> DerivedStatus {
        match record {
            Some(r) if r.has_check_in() && r.has_check_out() => {
                if self.is_valid_duration(r.jam_datang.as_deref(), r.jam_pulang.as_deref()) {
                    DerivedStatus::Hadir
                } else {
                    DerivedStatus::TidakHadir
                }
            }
            Some(r) if r.has_check_in() => DerivedStatus::SedangPiket,
            _ if now_hour >= self.cutoff_hour => DerivedStatus::TidakHadir,
            _ => DerivedStatus::BelumHadir,
        }
    }
}

/// True for a missing, blank or `-` time token.
pub fn is_absent_marker(token: Option<&str>) -> bool {
    match token {
        None => true,
        Some(t) => {
            let t = t.trim();
            t.is_empty() || t == ABSENT_MARKER
        }
    }
}

/// Minutes since midnight for an `HH:MM` (or `HH:MM:SS`, or `HH.MM`) token.
fn parse_clock(token: &str) -> Option<i64> {
    let mut parts = token.trim().split([':', '.']);
    let hours: i64 = parts.next()?.trim().parse().ok()?;
    let minutes: i64 = parts.next()?.trim().parse().ok()?;
    if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Minutes between check-in and check-out.
///
/// A check-out earlier than the check-in is taken to be on the following
/// day. Missing, absent-marked or malformed input yields 0.
pub fn duration_minutes(jam_datang: Option<&str>, jam_pulang: Option<&str>) -> u32 {
    if is_absent_marker(jam_datang) || is_absent_marker(jam_pulang) {
        return 0;
    }
    let (Some(datang), Some(pulang)) = (
        jam_datang.and_then(parse_clock),
        jam_pulang.and_then(parse_clock),
    ) else {
        return 0;
    };

    let mut diff = pulang - datang;
    if diff < 0 {
        diff += MINUTES_PER_DAY;
    }
    diff as u32
}

/// Whether the duration meets the default minimum.
pub fn is_valid_duration(jam_datang: Option<&str>, jam_pulang: Option<&str>) -> bool {
    StatusPolicy::default().is_valid_duration(jam_datang, jam_pulang)
}

/// Derive a status with the default policy.
pub fn derive_status(now_hour: u32, record: Option<&AttendanceRecord>) -> DerivedStatus {
    StatusPolicy::default().derive(now_hour, record)
}

/// Render a duration as `"1j 30m"`, `"45m"` or `"-"` for zero.
pub fn format_duration(minutes: u32) -> String {
    match (minutes / 60, minutes % 60) {
        (0, 0) => "-".to_string(),
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}j", h),
        (h, m) => format!("{}j {}m", h, m),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(datang: Option<&str>, pulang: Option<&str>) -> AttendanceRecord {
        AttendanceRecord {
            id: "r1".to_string(),
            member_id: Some("m1".to_string()),
            nim: None,
            id_rfid: None,
            nama: None,
            tanggal: "2024-05-06".to_string(),
            jam_datang: datang.map(str::to_string),
            jam_pulang: pulang.map(str::to_string),
            status: None,
        }
    }

    #[test]
    fn test_duration_absent_inputs_are_zero() {
        let tokens = [None, Some(""), Some("-"), Some("  ")];
        for a in tokens {
            assert_eq!(duration_minutes(a, Some("10:00")), 0);
            assert_eq!(duration_minutes(Some("08:00"), a), 0);
        }
    }

    #[test]
    fn test_duration_basic_and_overnight() {
        assert_eq!(duration_minutes(Some("08:00"), Some("09:30")), 90);
        assert_eq!(duration_minutes(Some("23:30"), Some("00:15")), 45);
        assert_eq!(duration_minutes(Some("08:00:59"), Some("10:00:00")), 120);
        assert_eq!(duration_minutes(Some("08.00"), Some("08.45")), 45);
    }

    #[test]
    fn test_duration_malformed_is_zero() {
        assert_eq!(duration_minutes(Some("pagi"), Some("09:00")), 0);
        assert_eq!(duration_minutes(Some("08:00"), Some("25:00")), 0);
        assert_eq!(duration_minutes(Some("08"), Some("09:00")), 0);
        assert_eq!(duration_minutes(Some("08:61"), Some("09:00")), 0);
    }

    #[test]
    fn test_valid_duration_boundary() {
        assert!(is_valid_duration(Some("08:00"), Some("09:00")));
        assert!(!is_valid_duration(Some("08:00"), Some("08:59")));
        assert!(!is_valid_duration(None, Some("09:00")));
    }

    #[test]
    fn test_derive_without_record_depends_on_cutoff() {
        assert_eq!(derive_status(10, None), DerivedStatus::BelumHadir);
        assert_eq!(derive_status(17, None), DerivedStatus::BelumHadir);
        assert_eq!(derive_status(18, None), DerivedStatus::TidakHadir);
        assert_eq!(derive_status(19, None), DerivedStatus::TidakHadir);
    }

    #[test]
    fn test_derive_with_record() {
        assert_eq!(
            derive_status(10, Some(&record(Some("08:00"), Some("-")))),
            DerivedStatus::SedangPiket
        );
        assert_eq!(
            derive_status(20, Some(&record(Some("08:00"), None))),
            DerivedStatus::SedangPiket
        );
        assert_eq!(
            derive_status(12, Some(&record(Some("08:00"), Some("09:30")))),
            DerivedStatus::Hadir
        );
        assert_eq!(
            derive_status(12, Some(&record(Some("08:00"), Some("08:30")))),
            DerivedStatus::TidakHadir
        );
    }

    #[test]
    fn test_derive_record_missing_check_in_uses_cutoff() {
        let r = record(Some("-"), Some("10:00"));
        assert_eq!(derive_status(9, Some(&r)), DerivedStatus::BelumHadir);
        assert_eq!(derive_status(18, Some(&r)), DerivedStatus::TidakHadir);
    }

    #[test]
    fn test_custom_policy() {
        let policy = StatusPolicy {
            cutoff_hour: 12,
            min_duration_minutes: 30,
        };
        assert_eq!(policy.derive(12, None), DerivedStatus::TidakHadir);
        assert_eq!(
            policy.derive(9, Some(&record(Some("08:00"), Some("08:30")))),
            DerivedStatus::Hadir
        );
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "-");
        assert_eq!(format_duration(45), "45m");
        assert_eq!(format_duration(120), "2j");
        assert_eq!(format_duration(90), "1j 30m");
    }

    #[test]
    fn test_counts_as_present() {
        assert!(DerivedStatus::Hadir.counts_as_present());
        assert!(DerivedStatus::SedangPiket.counts_as_present());
        assert!(!DerivedStatus::BelumHadir.counts_as_present());
        assert!(!DerivedStatus::TidakHadir.counts_as_present());
    }
}
