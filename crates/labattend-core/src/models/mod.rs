//! Data models for attendance dashboard entities.
//!
//! - `Member`: roster entry with duty days and RFID card id
//! - `AttendanceRecord`: one day's check-in/check-out pair
//! - `RfidScan`, `ScanResult`, `DeviceStatus`: reader events and health
//! - `AttendanceStats`, `DashboardData`, `DashboardSummary`: aggregates
//! - `AuthUser` and the auth request/response bodies
//!
//! The backend is not consistent about JSON types, so most fields go through
//! the lenient deserializers in `de`.

pub mod attendance;
pub mod auth;
pub mod de;
pub mod member;
pub mod rfid;
pub mod stats;

pub use attendance::{AttendancePayload, AttendanceRecord};
pub use auth::{AuthUser, ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest};
pub use member::{parse_weekday, weekday_name, Member, MemberPayload};
pub use rfid::{DeviceStatus, RfidScan, ScanRequest, ScanResult};
pub use stats::{AttendanceStats, DashboardData, DashboardSummary};

/// Entities the cache can patch in place after a mutation.
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for Member {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for AttendanceRecord {
    fn id(&self) -> &str {
        &self.id
    }
}
