mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use labattend_core::models::MemberPayload;
use labattend_core::{ApiClient, ApiError, Config};

#[derive(Default)]
struct Hits {
    count: AtomicUsize,
}

impl Hits {
    fn next(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn get(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

fn client(base: &str, retries: u32) -> ApiClient {
    ApiClient::new(base)
        .unwrap()
        .with_retry(retries, Duration::from_millis(10))
}

#[tokio::test]
async fn get_is_retried_on_server_error() {
    let hits = Arc::new(Hits::default());
    let router = Router::new()
        .route(
            "/api/v1/members",
            get(|State(hits): State<Arc<Hits>>| async move {
                if hits.next() < 3 {
                    (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"message": "db busy"})))
                } else {
                    (
                        StatusCode::OK,
                        Json(json!({"success": true, "data": [{"id": 1, "nama": "Budi"}]})),
                    )
                }
            }),
        )
        .with_state(hits.clone());
    let base = common::serve(router).await;

    let response = client(&base, 3).fetch_members().await;

    assert!(response.success);
    assert_eq!(response.data.len(), 1);
    assert_eq!(response.data[0].nama, "Budi");
    assert_eq!(hits.get(), 3);
}

#[tokio::test]
async fn get_gives_up_after_max_retries() {
    let hits = Arc::new(Hits::default());
    let router = Router::new()
        .route(
            "/api/v1/attendance",
            get(|State(hits): State<Arc<Hits>>| async move {
                hits.next();
                (StatusCode::SERVICE_UNAVAILABLE, "maintenance")
            }),
        )
        .with_state(hits.clone());
    let base = common::serve(router).await;

    let response = client(&base, 2).fetch_attendance().await;

    assert!(!response.success);
    assert!(response.data.is_empty());
    assert_eq!(response.message.as_deref(), Some("Server error (503): maintenance"));
    assert_eq!(hits.get(), 3);
}

#[tokio::test]
async fn client_errors_and_writes_are_not_retried() {
    let hits = Arc::new(Hits::default());
    let router = Router::new()
        .route(
            "/api/v1/members/{id}",
            get(|State(hits): State<Arc<Hits>>| async move {
                hits.next();
                (StatusCode::NOT_FOUND, Json(json!({"message": "Member tidak ditemukan"})))
            }),
        )
        .route(
            "/api/v1/members",
            post(|State(hits): State<Arc<Hits>>| async move {
                hits.next();
                (StatusCode::INTERNAL_SERVER_ERROR, "boom")
            }),
        )
        .with_state(hits.clone());
    let base = common::serve(router).await;
    let api = client(&base, 3);

    let missing = api.fetch_member("42").await;
    assert!(!missing.success);
    assert!(missing.data.is_none());
    assert_eq!(hits.get(), 1);

    let err = api.create_member(&MemberPayload::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::Server { status: 500, .. }));
    assert_eq!(hits.get(), 2);
}

#[tokio::test]
async fn slow_response_times_out() {
    let hits = Arc::new(Hits::default());
    let router = Router::new()
        .route(
            "/api/v1/members",
            get(|State(hits): State<Arc<Hits>>| async move {
                hits.next();
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!([]))
            })
            .post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                Json(json!({}))
            }),
        )
        .with_state(hits.clone());
    let base = common::serve(router).await;
    let config = Config {
        api_base_url: base,
        request_timeout_secs: 1,
        ..Default::default()
    };
    let api = ApiClient::from_config(&config).unwrap();

    let response = api.fetch_members().await;
    assert!(!response.success);
    assert_eq!(response.message.as_deref(), Some("Request timed out"));
    assert_eq!(hits.get(), 1);

    let err = api.create_member(&MemberPayload::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout));
    assert!(err.is_network());
}

#[tokio::test]
async fn envelope_shapes_are_normalised() {
    let router = Router::new()
        .route(
            "/api/v1/members",
            get(|| async {
                Json(json!({"success": true, "data": {"members": [
                    {"_id": "a1", "nama": "Citra", "hariPiket": "Senin, Rabu"},
                    {"nama": "no id"},
                    {"id": 7, "nama": "Dodi", "hariPiket": ["Jumat"]}
                ]}}))
            }),
        )
        .route(
            "/api/v1/attendance",
            get(|| async {
                Json(json!([
                    {"id": 1, "memberId": {"_id": "a1", "nama": "Citra"}, "tanggal": "2024-05-06T00:00:00.000Z", "jamDatang": "08:00", "jamPulang": "-"}
                ]))
            }),
        )
        .route(
            "/api/v1/attendance/stats",
            get(|| async {
                Json(json!({"success": true, "data": {"totalMembers": 12, "hadirHariIni": 5, "attendanceRate": 41.7}}))
            }),
        )
        .route(
            "/api/v1/dashboard/summary",
            get(|| async { Json(json!({"success": false, "message": "Akses ditolak"})) }),
        );
    let base = common::serve(router).await;
    let api = client(&base, 0);

    let members = api.fetch_members().await;
    assert!(members.success);
    assert_eq!(members.data.len(), 2);
    assert_eq!(members.data[0].hari_piket, vec!["Senin", "Rabu"]);
    assert_eq!(members.data[1].id, "7");

    let attendance = api.fetch_attendance().await;
    assert_eq!(attendance.data[0].member_id.as_deref(), Some("a1"));
    assert_eq!(attendance.data[0].date(), chrono::NaiveDate::from_ymd_opt(2024, 5, 6));

    let stats = api.fetch_attendance_stats().await;
    assert_eq!(stats.data.total_members, 12);
    assert_eq!(stats.data.hadir_hari_ini, 5);

    let summary = api.fetch_dashboard_summary().await;
    assert!(!summary.success);
    assert_eq!(summary.message.as_deref(), Some("Request refused: Akses ditolak"));
    assert_eq!(summary.data.total_members, 0);
}

#[tokio::test]
async fn validation_errors_carry_fields() {
    let router = Router::new().route(
        "/api/v1/members",
        post(|| async {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({
                    "message": "Data tidak valid",
                    "errors": [{"path": "nim", "msg": "NIM wajib diisi"}]
                })),
            )
        }),
    );
    let base = common::serve(router).await;

    let err = client(&base, 0)
        .create_member(&MemberPayload::default())
        .await
        .unwrap_err();
    match err {
        ApiError::Validation { message, fields } => {
            assert_eq!(message, "Data tidak valid");
            assert_eq!(fields["nim"], vec!["NIM wajib diisi"]);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn login_token_is_sent_as_bearer_and_cleared_on_logout() {
    let seen: Arc<Mutex<Vec<Option<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route(
            "/api/v1/auth/login",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["username"], "admin");
                Json(json!({"success": true, "data": {
                    "token": "tok-123",
                    "user": {"id": 1, "username": "admin", "role": "admin"}
                }}))
            }),
        )
        .route(
            "/api/v1/auth/logout",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        )
        .route(
            "/api/v1/members",
            get(|State(seen): State<Arc<Mutex<Vec<Option<String>>>>>, headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                seen.lock().unwrap().push(auth);
                Json(json!([]))
            }),
        )
        .with_state(seen.clone());
    let base = common::serve(router).await;
    let api = client(&base, 0);
    let shared = api.clone();

    api.fetch_members().await;
    let login = api.login("admin", "rahasia").await.unwrap();
    assert_eq!(login.token, "tok-123");
    assert_eq!(login.user.unwrap().username, "admin");
    shared.fetch_members().await;

    assert!(api.logout().await.is_err());
    assert_eq!(shared.token(), None);
    api.fetch_members().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![None, Some("Bearer tok-123".to_string()), None]
    );
}
