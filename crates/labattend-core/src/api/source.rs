use async_trait::async_trait;

use crate::models::{AttendancePayload, AttendanceRecord, AttendanceStats, Member, MemberPayload};

use super::{ApiClient, ApiError, ApiResponse};

/// The slice of the backend the cache manager reads from and writes through.
///
/// Reads never fail: they report failure inside the envelope. Writes return
/// `Err` so the cache can leave its snapshot untouched.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn list_members(&self) -> ApiResponse<Vec<Member>>;

    async fn list_attendance(&self) -> ApiResponse<Vec<AttendanceRecord>>;

    async fn attendance_stats(&self) -> ApiResponse<AttendanceStats>;

    async fn create_member(&self, payload: &MemberPayload) -> Result<Member, ApiError>;

    async fn update_member(&self, id: &str, payload: &MemberPayload) -> Result<Member, ApiError>;

    async fn delete_member(&self, id: &str) -> Result<(), ApiError>;

    async fn create_attendance(&self, payload: &AttendancePayload) -> Result<AttendanceRecord, ApiError>;

    async fn update_attendance(
        &self,
        id: &str,
        payload: &AttendancePayload,
    ) -> Result<AttendanceRecord, ApiError>;

    async fn delete_attendance(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl DataSource for ApiClient {
    async fn list_members(&self) -> ApiResponse<Vec<Member>> {
        self.fetch_members().await
    }

    async fn list_attendance(&self) -> ApiResponse<Vec<AttendanceRecord>> {
        self.fetch_attendance().await
    }

    async fn attendance_stats(&self) -> ApiResponse<AttendanceStats> {
        self.fetch_attendance_stats().await
    }

    async fn create_member(&self, payload: &MemberPayload) -> Result<Member, ApiError> {
        ApiClient::create_member(self, payload).await
    }

    async fn update_member(&self, id: &str, payload: &MemberPayload) -> Result<Member, ApiError> {
        ApiClient::update_member(self, id, payload).await
    }

    async fn delete_member(&self, id: &str) -> Result<(), ApiError> {
        ApiClient::delete_member(self, id).await
    }

    async fn create_attendance(&self, payload: &AttendancePayload) -> Result<AttendanceRecord, ApiError> {
        ApiClient::create_attendance(self, payload).await
    }

    async fn update_attendance(
        &self,
        id: &str,
        payload: &AttendancePayload,
    ) -> Result<AttendanceRecord, ApiError> {
        ApiClient::update_attendance(self, id, payload).await
    }

    async fn delete_attendance(&self, id: &str) -> Result<(), ApiError> {
        ApiClient::delete_attendance(self, id).await
    }
}
