//! API client for the attendance backend REST API.
//!
//! Every request goes through `send`, which attaches the bearer token,
//! enforces the client timeout and retries idempotent reads on 5xx. Read
//! operations return the canonical `ApiResponse` envelope; mutations return
//! `Result` so a failed write stops the caller.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{
    AttendancePayload, AttendanceRecord, AttendanceStats, AuthUser, ChangePasswordRequest,
    DashboardData, DashboardSummary, DeviceStatus, LoginRequest, LoginResponse, Member,
    MemberPayload, RegisterRequest, RfidScan, ScanRequest, ScanResult,
};

use super::envelope::{self, ApiResponse};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Maximum number of retries for idempotent reads that hit a 5xx.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay between retries; attempt `n` waits `n` times this.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Path of the server-push attendance stream, relative to the API base.
pub const REALTIME_PATH: &str = "/realtime/attendance";

const MEMBER_KEYS: &[&str] = &["members", "member"];
const ATTENDANCE_KEYS: &[&str] = &["attendance", "attendances", "records"];
const SCAN_KEYS: &[&str] = &["scans", "rfidScans"];

/// API client for the attendance backend.
/// Clone is cheap: the connection pool and the token store are shared, so a
/// login through any clone authenticates all of them.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    max_retries: u32,
    retry_delay: Duration,
}

impl ApiClient {
    /// Create a client with default timeout and retry settings
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::build(
            base_url,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            DEFAULT_MAX_RETRIES,
            Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        )
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Self::build(
            &config.api_base_url,
            Duration::from_secs(config.request_timeout_secs),
            config.max_retries,
            Duration::from_millis(config.retry_delay_ms),
        )
    }

    fn build(
        base_url: &str,
        timeout: Duration,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
            max_retries,
            retry_delay,
        })
    }

    /// Override the retry policy (mainly for tests and slow links).
    pub fn with_retry(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&self, token: impl Into<String>) {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.into());
        }
    }

    pub fn clear_token(&self) {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn realtime_url(&self) -> String {
        self.url(REALTIME_PATH)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and return the decoded JSON body.
    ///
    /// GET requests are retried on server errors with a linearly growing
    /// delay; any other status or a transport failure returns immediately.
    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, ApiError> {
        let url = self.url(path);
        let max_attempts = if method == Method::GET {
            self.max_retries + 1
        } else {
            1
        };
        let mut attempt = 0;

        loop {
            attempt += 1;

            let mut request = self.client.request(method.clone(), &url);
            if let Some(token) = self.token() {
                request = request.bearer_auth(token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            if status.is_success() {
                let text = response.text().await?;
                debug!(method = %method, url = %url, status = status.as_u16(), "Request succeeded");
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                let value: Value = serde_json::from_str(&text).map_err(|e| {
                    ApiError::InvalidResponse(format!("{} {}: {}", method, path, e))
                })?;
                if let Some(message) = envelope::declared_failure(&value) {
                    return Err(ApiError::Refused(message));
                }
                return Ok(value);
            }

            let text = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, &text);

            if err.is_retryable() && attempt < max_attempts {
                let delay = self.retry_delay * attempt;
                warn!(
                    url = %url,
                    status = status.as_u16(),
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(err);
        }
    }

    async fn get_value(&self, path: &str) -> Result<Value, ApiError> {
        self.send(Method::GET, path, None).await
    }

    async fn send_body<B: Serialize>(&self, method: Method, path: &str, body: &B) -> Result<Value, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to encode request body: {}", e)))?;
        self.send(method, path, Some(&body)).await
    }

    /// GET a list endpoint into the canonical envelope.
    async fn read_list<T: DeserializeOwned>(&self, path: &str, keys: &[&str]) -> ApiResponse<Vec<T>> {
        match self.get_value(path).await {
            Ok(value) => {
                ApiResponse::ok(envelope::extract_list(&value, keys)).with_message(envelope::message(&value))
            }
            Err(e) => ApiResponse::from_result(path, Err(e)),
        }
    }

    /// GET a single-object endpoint into the canonical envelope.
    async fn read_one<T: DeserializeOwned>(&self, path: &str, keys: &[&str]) -> ApiResponse<Option<T>> {
        match self.get_value(path).await {
            Ok(value) => {
                ApiResponse::ok(envelope::extract_one(&value, keys)).with_message(envelope::message(&value))
            }
            Err(e) => ApiResponse::from_result(path, Err(e)),
        }
    }

    /// Like `read_one`, for payloads with a meaningful default.
    async fn read_or_default<T: DeserializeOwned + Default>(&self, path: &str, keys: &[&str]) -> ApiResponse<T> {
        let response = self.read_one::<T>(path, keys).await;
        ApiResponse {
            success: response.success,
            data: response.data.unwrap_or_default(),
            message: response.message,
        }
    }

    fn require<T: DeserializeOwned>(value: &Value, keys: &[&str], what: &str) -> Result<T, ApiError> {
        envelope::extract_one(value, keys)
            .ok_or_else(|| ApiError::InvalidResponse(format!("Response did not contain a {}", what)))
    }

    // ===== Members =====

    pub async fn fetch_members(&self) -> ApiResponse<Vec<Member>> {
        self.read_list("/members", MEMBER_KEYS).await
    }

    pub async fn fetch_member(&self, id: &str) -> ApiResponse<Option<Member>> {
        self.read_one(&format!("/members/{}", id), &["member"]).await
    }

    pub async fn create_member(&self, payload: &MemberPayload) -> Result<Member, ApiError> {
        let value = self.send_body(Method::POST, "/members", payload).await?;
        Self::require(&value, &["member"], "member")
    }

    pub async fn update_member(&self, id: &str, payload: &MemberPayload) -> Result<Member, ApiError> {
        let value = self
            .send_body(Method::PUT, &format!("/members/{}", id), payload)
            .await?;
        Self::require(&value, &["member"], "member")
    }

    pub async fn delete_member(&self, id: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, &format!("/members/{}", id), None).await?;
        Ok(())
    }

    // ===== Attendance =====

    pub async fn fetch_attendance(&self) -> ApiResponse<Vec<AttendanceRecord>> {
        self.read_list("/attendance", ATTENDANCE_KEYS).await
    }

    pub async fn fetch_attendance_by_id(&self, id: &str) -> ApiResponse<Option<AttendanceRecord>> {
        self.read_one(&format!("/attendance/{}", id), &["attendance", "record"]).await
    }

    pub async fn fetch_member_attendance(&self, member_id: &str) -> ApiResponse<Vec<AttendanceRecord>> {
        self.read_list(&format!("/attendance/member/{}", member_id), ATTENDANCE_KEYS)
            .await
    }

    pub async fn fetch_today_attendance(&self) -> ApiResponse<Vec<AttendanceRecord>> {
        self.read_list("/attendance/today", ATTENDANCE_KEYS).await
    }

    pub async fn fetch_attendance_stats(&self) -> ApiResponse<AttendanceStats> {
        self.read_or_default("/attendance/stats", &["stats"]).await
    }

    pub async fn create_attendance(&self, payload: &AttendancePayload) -> Result<AttendanceRecord, ApiError> {
        let value = self.send_body(Method::POST, "/attendance", payload).await?;
        Self::require(&value, &["attendance", "record"], "attendance record")
    }

    pub async fn update_attendance(
        &self,
        id: &str,
        payload: &AttendancePayload,
    ) -> Result<AttendanceRecord, ApiError> {
        let value = self
            .send_body(Method::PUT, &format!("/attendance/{}", id), payload)
            .await?;
        Self::require(&value, &["attendance", "record"], "attendance record")
    }

    pub async fn delete_attendance(&self, id: &str) -> Result<(), ApiError> {
        self.send(Method::DELETE, &format!("/attendance/{}", id), None)
            .await?;
        Ok(())
    }

    // ===== RFID =====

    /// Record a card tap; the backend decides whether it is a check-in or out.
    pub async fn record_scan(&self, request: &ScanRequest) -> Result<ScanResult, ApiError> {
        let value = self.send_body(Method::POST, "/rfid/scan", request).await?;
        let mut result: ScanResult = envelope::extract_one(&value, &["result"]).unwrap_or_default();
        if result.message.is_none() {
            result.message = envelope::message(&value);
        }
        Ok(result)
    }

    pub async fn fetch_latest_scans(&self) -> ApiResponse<Vec<RfidScan>> {
        self.read_list("/rfid/scans/latest", SCAN_KEYS).await
    }

    pub async fn fetch_unknown_scans(&self) -> ApiResponse<Vec<RfidScan>> {
        self.read_list("/rfid/scans/unknown", SCAN_KEYS).await
    }

    pub async fn fetch_device_status(&self, device_id: &str) -> ApiResponse<DeviceStatus> {
        self.read_or_default(&format!("/rfid/device/{}/status", device_id), &["device"])
            .await
    }

    pub async fn send_device_heartbeat(&self, device_id: &str) -> Result<(), ApiError> {
        self.send(
            Method::POST,
            &format!("/rfid/device/{}/heartbeat", device_id),
            None,
        )
        .await?;
        Ok(())
    }

    // ===== Auth =====

    /// Authenticate and store the returned token on this client.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let value = self
            .send_body(Method::POST, "/auth/login", &LoginRequest { username, password })
            .await?;
        let response: LoginResponse = Self::require(&value, &[], "login token")?;
        self.set_token(response.token.clone());
        Ok(response)
    }

    /// Invalidate the session server-side. The local token is dropped even
    /// when the server call fails.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let result = self.send(Method::POST, "/auth/logout", None).await;
        self.clear_token();
        result.map(|_| ())
    }

    pub async fn verify(&self) -> ApiResponse<Option<AuthUser>> {
        self.read_one("/auth/verify", &["user"]).await
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthUser, ApiError> {
        let value = self.send_body(Method::POST, "/auth/register", request).await?;
        Self::require(&value, &["user"], "user")
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), ApiError> {
        self.send_body(Method::POST, "/auth/change-password", request)
            .await?;
        Ok(())
    }

    // ===== Dashboard =====

    pub async fn fetch_dashboard(&self) -> ApiResponse<DashboardData> {
        self.read_or_default("/dashboard", &["dashboard"]).await
    }

    pub async fn fetch_dashboard_summary(&self) -> ApiResponse<DashboardSummary> {
        self.read_or_default("/dashboard/summary", &["summary"]).await
    }
}
