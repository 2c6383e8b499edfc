use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::AttendanceRecord;
use crate::status::StatusPolicy;

/// Number of most recent days kept in the chart series
pub const CHART_DAYS: usize = 7;

/// Present/absent counts for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub present: u32,
    pub absent: u32,
}

/// Group records by day and count present/absent, oldest day first, keeping
/// the last `CHART_DAYS` days that have records.
///
/// Each record is judged as if its day were over: checked in (still on duty
/// or with a valid duration) counts as present, anything else as absent.
/// Records with an unreadable date are ignored.
pub fn derive_chart_series(records: &[AttendanceRecord], policy: &StatusPolicy) -> Vec<ChartPoint> {
    let mut days: HashMap<NaiveDate, (u32, u32)> = HashMap::new();

    for record in records {
        let Some(date) = record.date() else {
            continue;
        };
        let counts = days.entry(date).or_insert((0, 0));
        if policy.derive(policy.cutoff_hour, Some(record)).counts_as_present() {
            counts.0 += 1;
        } else {
            counts.1 += 1;
        }
    }

    let mut series: Vec<ChartPoint> = days
        .into_iter()
        .map(|(date, (present, absent))| ChartPoint {
            date,
            present,
            absent,
        })
        .collect();
    series.sort_by_key(|p| p.date);

    if series.len() > CHART_DAYS {
        series.drain(..series.len() - CHART_DAYS);
    }
    series
}
