//! Plain-text rendering for roster and chart output.

use chrono::{Datelike, NaiveDate};

use labattend_core::cache::ChartPoint;
use labattend_core::models::weekday_name;
use labattend_core::roster::{RosterEntry, RosterSummary};
use labattend_core::status::{duration_minutes, format_duration};

/// Width of the widest chart bar
const BAR_WIDTH: u32 = 30;

pub fn roster(date: NaiveDate, entries: &[RosterEntry], age: &str) -> String {
    let mut out = format!(
        "Piket {} {}  (data {})\n",
        weekday_name(date.weekday()),
        date.format("%Y-%m-%d"),
        age
    );

    if entries.is_empty() {
        out.push_str("  Tidak ada jadwal piket.\n");
        return out;
    }

    out.push_str(&format!(
        "  {:<24} {:<12} {:<7} {:<7} {:<8} {}\n",
        "NAMA", "NIM", "DATANG", "PULANG", "DURASI", "STATUS"
    ));
    for entry in entries {
        let (datang, pulang, durasi) = match &entry.record {
            Some(r) => (
                r.jam_datang_display().to_string(),
                r.jam_pulang_display().to_string(),
                format_duration(duration_minutes(r.jam_datang.as_deref(), r.jam_pulang.as_deref())),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        out.push_str(&format!(
            "  {:<24} {:<12} {:<7} {:<7} {:<8} {}\n",
            truncate(&entry.member.nama, 24),
            entry.member.nim_display(),
            datang,
            pulang,
            durasi,
            entry.status
        ));
    }

    let summary = RosterSummary::from_entries(entries);
    out.push_str(&format!(
        "\n  Hadir: {}  Sedang Piket: {}  Belum Hadir: {}  Tidak Hadir: {}\n",
        summary.hadir, summary.sedang_piket, summary.belum_hadir, summary.tidak_hadir
    ));
    out
}

pub fn chart(series: &[ChartPoint]) -> String {
    if series.is_empty() {
        return "Belum ada data kehadiran.\n".to_string();
    }

    let max = series
        .iter()
        .map(|p| p.present + p.absent)
        .max()
        .unwrap_or(1)
        .max(1);

    let mut out = String::new();
    for point in series {
        let present = point.present * BAR_WIDTH / max;
        let absent = point.absent * BAR_WIDTH / max;
        out.push_str(&format!(
            "{} {:>3}/{:<3} {}{}\n",
            point.date.format("%d/%m"),
            point.present,
            point.absent,
            "#".repeat(present as usize),
            ".".repeat(absent as usize)
        ));
    }
    out.push_str("(# hadir, . tidak hadir)\n");
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labattend_core::models::{AttendanceRecord, Member};
    use labattend_core::status::DerivedStatus;

    fn entry(nama: &str, status: DerivedStatus, record: Option<AttendanceRecord>) -> RosterEntry {
        RosterEntry {
            member: Member {
                id: "m1".to_string(),
                nama: nama.to_string(),
                nim: Some("2101".to_string()),
                id_rfid: None,
                hari_piket: vec!["Senin".to_string()],
                email: None,
                jurusan: None,
                angkatan: None,
                status: None,
            },
            record,
            matched_by: None,
            status,
        }
    }

    #[test]
    fn test_roster_lines_and_summary() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 6).unwrap();
        let record = AttendanceRecord {
            id: "a1".to_string(),
            member_id: Some("m1".to_string()),
            nim: None,
            id_rfid: None,
            nama: None,
            tanggal: "2024-05-06".to_string(),
            jam_datang: Some("08:00".to_string()),
            jam_pulang: Some("09:30".to_string()),
            status: None,
        };
        let text = roster(
            date,
            &[
                entry("Budi", DerivedStatus::Hadir, Some(record)),
                entry("Citra", DerivedStatus::BelumHadir, None),
            ],
            "just now",
        );
        assert!(text.starts_with("Piket Senin 2024-05-06"));
        assert!(text.contains("1j 30m"));
        assert!(text.contains("Hadir: 1  Sedang Piket: 0  Belum Hadir: 1  Tidak Hadir: 0"));
    }

    #[test]
    fn test_empty_roster() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 5).unwrap();
        assert!(roster(date, &[], "never").contains("Tidak ada jadwal piket"));
    }

    #[test]
    fn test_chart_bars_scale_to_widest_day() {
        let series = vec![
            ChartPoint {
                date: NaiveDate::from_ymd_opt(2024, 5, 6).unwrap(),
                present: 3,
                absent: 0,
            },
            ChartPoint {
                date: NaiveDate::from_ymd_opt(2024, 5, 7).unwrap(),
                present: 1,
                absent: 2,
            },
        ];
        let text = chart(&series);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].ends_with(&"#".repeat(30)));
        assert!(lines[1].ends_with(&format!("{}{}", "#".repeat(10), ".".repeat(20))));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Budi", 24), "Budi");
        assert_eq!(truncate("abcdef", 4), "abc…");
    }
}
