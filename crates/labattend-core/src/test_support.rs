//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::{ApiError, ApiResponse, DataSource};
use crate::models::{AttendancePayload, AttendanceRecord, AttendanceStats, Member, MemberPayload};

/// Scripted data source: pops queued responses and counts calls.
///
/// Reads with nothing queued fail with "no scripted response".
#[derive(Default)]
pub(crate) struct MockSource {
    pub members: Mutex<VecDeque<ApiResponse<Vec<Member>>>>,
    pub attendance: Mutex<VecDeque<ApiResponse<Vec<AttendanceRecord>>>>,
    pub member_calls: AtomicUsize,
    pub attendance_calls: AtomicUsize,
    pub stats_calls: AtomicUsize,
    pub fail_mutations: bool,
    /// Delay member fetches so overlapping reads can be observed
    pub member_delay: Option<Duration>,
}

impl MockSource {
    pub fn push_members(&self, response: ApiResponse<Vec<Member>>) {
        self.members.lock().unwrap().push_back(response);
    }

    pub fn push_attendance(&self, response: ApiResponse<Vec<AttendanceRecord>>) {
        self.attendance.lock().unwrap().push_back(response);
    }

    pub fn member_calls(&self) -> usize {
        self.member_calls.load(Ordering::SeqCst)
    }

    pub fn attendance_calls(&self) -> usize {
        self.attendance_calls.load(Ordering::SeqCst)
    }

    pub fn stats_calls(&self) -> usize {
        self.stats_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for MockSource {
    async fn list_members(&self) -> ApiResponse<Vec<Member>> {
        self.member_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.member_delay {
            tokio::time::sleep(delay).await;
        }
        self.members
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ApiResponse::failure("no scripted response"))
    }

    async fn list_attendance(&self) -> ApiResponse<Vec<AttendanceRecord>> {
        self.attendance_calls.fetch_add(1, Ordering::SeqCst);
        self.attendance
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ApiResponse::failure("no scripted response"))
    }

    async fn attendance_stats(&self) -> ApiResponse<AttendanceStats> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        ApiResponse::ok(AttendanceStats {
            total_members: 2,
            ..Default::default()
        })
    }

    async fn create_member(&self, payload: &MemberPayload) -> Result<Member, ApiError> {
        if self.fail_mutations {
            return Err(ApiError::Server {
                status: 500,
                message: "db down".to_string(),
            });
        }
        Ok(member("new", &payload.nama))
    }

    async fn update_member(&self, id: &str, payload: &MemberPayload) -> Result<Member, ApiError> {
        Ok(member(id, &payload.nama))
    }

    async fn delete_member(&self, _id: &str) -> Result<(), ApiError> {
        if self.fail_mutations {
            return Err(ApiError::NotFound("member".to_string()));
        }
        Ok(())
    }

    async fn create_attendance(&self, payload: &AttendancePayload) -> Result<AttendanceRecord, ApiError> {
        Ok(record("a-new", &payload.member_id, &payload.tanggal))
    }

    async fn update_attendance(
        &self,
        id: &str,
        payload: &AttendancePayload,
    ) -> Result<AttendanceRecord, ApiError> {
        Ok(record(id, &payload.member_id, &payload.tanggal))
    }

    async fn delete_attendance(&self, _id: &str) -> Result<(), ApiError> {
        Ok(())
    }
}

/// Member on duty Mondays.
pub(crate) fn member(id: &str, nama: &str) -> Member {
    Member {
        id: id.to_string(),
        nama: nama.to_string(),
        nim: None,
        id_rfid: None,
        hari_piket: vec!["Senin".to_string()],
        email: None,
        jurusan: None,
        angkatan: None,
        status: None,
    }
}

/// Complete 08:00-10:00 record.
pub(crate) fn record(id: &str, member_id: &str, tanggal: &str) -> AttendanceRecord {
    AttendanceRecord {
        id: id.to_string(),
        member_id: Some(member_id.to_string()),
        nim: None,
        id_rfid: None,
        nama: None,
        tanggal: tanggal.to_string(),
        jam_datang: Some("08:00".to_string()),
        jam_pulang: Some("10:00".to_string()),
        status: None,
    }
}
