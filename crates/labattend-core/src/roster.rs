//! Record-to-member correlation and daily roster assembly.
//!
//! Attendance records do not always carry the member id: older readers
//! stored only the NIM, the card id or the typed name. `RecordMatcher` tries
//! those keys in a fixed precedence and the first hit wins. Records nobody
//! claims are kept and shown against a placeholder member.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::models::{AttendanceRecord, Member};
use crate::status::{DerivedStatus, StatusPolicy};

/// Key that linked a record to a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MatchKey {
    MemberId,
    Nim,
    RfidId,
    Name,
}

fn normalize_nim(nim: &str) -> String {
    nim.trim().to_string()
}

fn normalize_rfid(rfid: &str) -> String {
    rfid.trim().to_uppercase()
}

fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Lookup tables over a member list. The first member wins on duplicate keys.
pub struct MemberIndex<'a> {
    members: &'a [Member],
    by_id: HashMap<&'a str, usize>,
    by_nim: HashMap<String, usize>,
    by_rfid: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl<'a> MemberIndex<'a> {
    pub fn new(members: &'a [Member]) -> Self {
        let mut index = Self {
            members,
            by_id: HashMap::with_capacity(members.len()),
            by_nim: HashMap::new(),
            by_rfid: HashMap::new(),
            by_name: HashMap::new(),
        };

        for (i, m) in members.iter().enumerate() {
            index.by_id.entry(m.id.as_str()).or_insert(i);
            if let Some(nim) = m.nim.as_deref().filter(|n| !n.trim().is_empty()) {
                index.by_nim.entry(normalize_nim(nim)).or_insert(i);
            }
            if let Some(rfid) = m.id_rfid.as_deref().filter(|r| !r.trim().is_empty()) {
                index.by_rfid.entry(normalize_rfid(rfid)).or_insert(i);
            }
            let name = normalize_name(&m.nama);
            if !name.is_empty() {
                index.by_name.entry(name).or_insert(i);
            }
        }
        index
    }

    fn lookup(&self, key: MatchKey, record: &AttendanceRecord) -> Option<usize> {
        match key {
            MatchKey::MemberId => record
                .member_id
                .as_deref()
                .and_then(|id| self.by_id.get(id.trim()).copied()),
            MatchKey::Nim => record
                .nim
                .as_deref()
                .and_then(|nim| self.by_nim.get(&normalize_nim(nim)).copied()),
            MatchKey::RfidId => record
                .id_rfid
                .as_deref()
                .and_then(|rfid| self.by_rfid.get(&normalize_rfid(rfid)).copied()),
            MatchKey::Name => record
                .nama
                .as_deref()
                .map(normalize_name)
                .filter(|n| !n.is_empty())
                .and_then(|n| self.by_name.get(&n).copied()),
        }
    }

    /// Member at a position returned by `RecordMatcher::resolve`.
    pub fn member(&self, idx: usize) -> Option<&'a Member> {
        self.members.get(idx)
    }
}

/// Ordered matcher; the default precedence is id, NIM, card id, then name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMatcher {
    order: Vec<MatchKey>,
}

impl Default for RecordMatcher {
    fn default() -> Self {
        Self {
            order: vec![MatchKey::MemberId, MatchKey::Nim, MatchKey::RfidId, MatchKey::Name],
        }
    }
}

impl RecordMatcher {
    pub fn new(order: Vec<MatchKey>) -> Self {
        Self { order }
    }

    pub fn order(&self) -> &[MatchKey] {
        &self.order
    }

    /// Position of the member claiming `record`, and the key that matched.
    pub fn resolve(&self, index: &MemberIndex<'_>, record: &AttendanceRecord) -> Option<(usize, MatchKey)> {
        self.order
            .iter()
            .find_map(|key| index.lookup(*key, record).map(|i| (i, *key)))
    }

    pub fn match_member<'a>(
        &self,
        record: &AttendanceRecord,
        members: &'a [Member],
    ) -> Option<(&'a Member, MatchKey)> {
        let index = MemberIndex::new(members);
        self.claim(&index, record)
    }

    fn claim<'a>(&self, index: &MemberIndex<'a>, record: &AttendanceRecord) -> Option<(&'a Member, MatchKey)> {
        let (i, key) = self.resolve(index, record)?;
        Some((index.member(i)?, key))
    }

    /// Pair every record with its member, or a placeholder when unmatched.
    pub fn match_records(&self, members: &[Member], records: &[AttendanceRecord]) -> Vec<MatchedRecord> {
        let index = MemberIndex::new(members);
        records
            .iter()
            .map(|record| match self.claim(&index, record) {
                Some((member, key)) => MatchedRecord {
                    member: member.clone(),
                    record: record.clone(),
                    matched_by: Some(key),
                },
                None => MatchedRecord {
                    member: Member::placeholder(record),
                    record: record.clone(),
                    matched_by: None,
                },
            })
            .collect()
    }

    /// Roster for `date` as seen at `now`.
    ///
    /// Includes every member on duty that weekday, any other member with a
    /// record that day, and a placeholder row per unmatched record. When a
    /// member has several records for the day the most complete one is used.
    pub fn daily_roster(
        &self,
        members: &[Member],
        records: &[AttendanceRecord],
        date: NaiveDate,
        now: NaiveDateTime,
        policy: &StatusPolicy,
    ) -> Vec<RosterEntry> {
        let index = MemberIndex::new(members);
        let hour = effective_hour(date, now);

        let mut claimed: HashMap<usize, (&AttendanceRecord, MatchKey)> = HashMap::new();
        let mut unmatched: Vec<&AttendanceRecord> = Vec::new();

        for record in records.iter().filter(|r| r.date() == Some(date)) {
            match self.resolve(&index, record) {
                Some((i, key)) => {
                    claimed
                        .entry(i)
                        .and_modify(|current| {
                            if completeness(record) > completeness(current.0) {
                                *current = (record, key);
                            }
                        })
                        .or_insert((record, key));
                }
                None => unmatched.push(record),
            }
        }

        let weekday = date.weekday();
        let mut entries: Vec<RosterEntry> = members
            .iter()
            .enumerate()
            .filter_map(|(i, member)| {
                let hit = claimed.get(&i).copied();
                if !member.is_scheduled_on(weekday) && hit.is_none() {
                    return None;
                }
                Some(RosterEntry {
                    member: member.clone(),
                    record: hit.map(|(r, _)| r.clone()),
                    matched_by: hit.map(|(_, k)| k),
                    status: policy.derive(hour, hit.map(|(r, _)| r)),
                })
            })
            .collect();

        entries.extend(unmatched.into_iter().map(|record| RosterEntry {
            member: Member::placeholder(record),
            record: Some(record.clone()),
            matched_by: None,
            status: policy.derive(hour, Some(record)),
        }));

        entries.sort_by(|a, b| cmp_names(&a.member.nama, &b.member.nama));
        entries
    }
}

/// Hour used for status derivation: a finished day is past every cutoff, a
/// future day has not started.
fn effective_hour(date: NaiveDate, now: NaiveDateTime) -> u32 {
    match date.cmp(&now.date()) {
        Ordering::Less => 24,
        Ordering::Greater => 0,
        Ordering::Equal => now.hour(),
    }
}

fn completeness(record: &AttendanceRecord) -> u8 {
    u8::from(record.has_check_in()) + u8::from(record.has_check_out())
}

fn cmp_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// Daily roster with the default matcher.
pub fn build_daily_roster(
    members: &[Member],
    records: &[AttendanceRecord],
    date: NaiveDate,
    now: NaiveDateTime,
    policy: &StatusPolicy,
) -> Vec<RosterEntry> {
    RecordMatcher::default().daily_roster(members, records, date, now, policy)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedRecord {
    pub member: Member,
    pub record: AttendanceRecord,
    pub matched_by: Option<MatchKey>,
}

/// One member's line on the daily roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub member: Member,
    pub record: Option<AttendanceRecord>,
    pub matched_by: Option<MatchKey>,
    pub status: DerivedStatus,
}

/// Counts per status over a roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RosterSummary {
    pub hadir: usize,
    pub sedang_piket: usize,
    pub belum_hadir: usize,
    pub tidak_hadir: usize,
}

impl RosterSummary {
    pub fn from_entries(entries: &[RosterEntry]) -> Self {
        entries.iter().fold(Self::default(), |mut acc, e| {
            match e.status {
                DerivedStatus::Hadir => acc.hadir += 1,
                DerivedStatus::SedangPiket => acc.sedang_piket += 1,
                DerivedStatus::BelumHadir => acc.belum_hadir += 1,
                DerivedStatus::TidakHadir => acc.tidak_hadir += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.hadir + self.sedang_piket + self.belum_hadir + self.tidak_hadir
    }

    pub fn count(&self, status: DerivedStatus) -> usize {
        match status {
            DerivedStatus::Hadir => self.hadir,
            DerivedStatus::SedangPiket => self.sedang_piket,
            DerivedStatus::BelumHadir => self.belum_hadir,
            DerivedStatus::TidakHadir => self.tidak_hadir,
        }
    }
}
