mod common;

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use tokio::sync::mpsc;

use labattend_core::config::RealtimeConfig;
use labattend_core::realtime::event::ALL_EVENTS;
use labattend_core::{ApiClient, CacheManager, ConnectionStatus, RealtimeChannel, RealtimeEvent};

fn frames() -> impl Stream<Item = Result<Event, Infallible>> {
    stream::iter(vec![
        Ok::<_, Infallible>(Event::default().comment("hello")),
        Ok(Event::default()
            .data(r#"{"type":"attendance_scan","data":{"idRfid":"04A1B2"},"timestamp":"2024-05-06T08:01:00Z"}"#)),
        Ok(Event::default().event("member_update").data(r#"{"id":7}"#)),
    ])
    .chain(stream::pending())
}

fn fast_reconnect(max_attempts: u32) -> RealtimeConfig {
    RealtimeConfig {
        max_reconnect_attempts: max_attempts,
        reconnect_base_delay_ms: 20,
    }
}

#[tokio::test]
async fn events_are_decoded_and_dispatched() {
    let headers_seen: Arc<Mutex<Option<HeaderMap>>> = Arc::new(Mutex::new(None));
    let router = Router::new()
        .route(
            "/api/v1/realtime/attendance",
            get(|State(seen): State<Arc<Mutex<Option<HeaderMap>>>>, headers: HeaderMap| async move {
                *seen.lock().unwrap() = Some(headers);
                Sse::new(frames())
            }),
        )
        .with_state(headers_seen.clone());
    let base = common::serve(router).await;

    let api = ApiClient::new(&base).unwrap();
    api.set_token("tok-123");
    let channel = RealtimeChannel::sse(api, &fast_reconnect(3)).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel::<RealtimeEvent>();
    let _all = channel.subscribe(ALL_EVENTS, move |event: &RealtimeEvent| {
        let _ = tx.send(event.clone());
    });
    channel.connect();

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(first.event_type, "attendance_scan");
    assert_eq!(first.data["idRfid"], "04A1B2");
    assert_eq!(first.timestamp.as_deref(), Some("2024-05-06T08:01:00Z"));
    assert_eq!(second.event_type, "member_update");
    assert_eq!(second.data["id"], 7);
    assert_eq!(channel.status(), ConnectionStatus::Connected);

    let headers = headers_seen.lock().unwrap().clone().unwrap();
    assert_eq!(headers["authorization"], "Bearer tok-123");
    assert_eq!(headers["accept"], "text/event-stream");

    channel.disconnect();
    assert_eq!(channel.status(), ConnectionStatus::Disconnected);
    assert_eq!(channel.subscriber_count(), 0);
}

#[tokio::test]
async fn rejected_stream_exhausts_reconnects() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route(
            "/api/v1/realtime/attendance",
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::UNAUTHORIZED
            }),
        )
        .with_state(hits.clone());
    let base = common::serve(router).await;

    let channel = RealtimeChannel::sse(ApiClient::new(&base).unwrap(), &fast_reconnect(3)).unwrap();
    channel.connect();

    let gave_up = common::eventually(|| {
        hits.load(Ordering::SeqCst) == 3 && channel.status() == ConnectionStatus::Disconnected
    })
    .await;
    assert!(gave_up);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[derive(Default)]
struct Backend {
    members: AtomicUsize,
    attendance: AtomicUsize,
    stats: AtomicUsize,
}

async fn scan_stream() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(
        stream::iter(vec![Ok::<_, Infallible>(
            Event::default().data(r#"{"type":"attendance_scan","data":{}}"#),
        )])
        .chain(stream::pending()),
    )
}

#[tokio::test]
async fn scan_event_refreshes_attendance_and_stats_only() {
    let backend = Arc::new(Backend::default());
    let router = Router::new()
        .route(
            "/api/v1/members",
            get(|State(b): State<Arc<Backend>>| async move {
                b.members.fetch_add(1, Ordering::SeqCst);
                Json(json!({"data": [{"id": 1, "nama": "Budi", "hariPiket": ["Senin"]}]}))
            }),
        )
        .route(
            "/api/v1/attendance",
            get(|State(b): State<Arc<Backend>>| async move {
                b.attendance.fetch_add(1, Ordering::SeqCst);
                Json(json!({"data": []}))
            }),
        )
        .route(
            "/api/v1/attendance/stats",
            get(|State(b): State<Arc<Backend>>| async move {
                b.stats.fetch_add(1, Ordering::SeqCst);
                Json(json!({"data": {"totalMembers": 1}}))
            }),
        )
        .route("/api/v1/realtime/attendance", get(scan_stream))
        .with_state(backend.clone());
    let base = common::serve(router).await;

    let api = ApiClient::new(&base).unwrap();
    let cache = CacheManager::new(Arc::new(api.clone()));
    cache.members(false).await;
    cache.attendance(false).await;
    cache.attendance_stats(false).await;

    let channel = RealtimeChannel::sse(api, &fast_reconnect(5)).unwrap();
    let _bridge = channel.bind_cache(cache.clone());
    channel.connect();

    let refreshed = common::eventually(|| {
        backend.attendance.load(Ordering::SeqCst) == 2 && backend.stats.load(Ordering::SeqCst) == 2
    })
    .await;
    assert!(refreshed);
    assert_eq!(backend.members.load(Ordering::SeqCst), 1);
    assert_eq!(cache.cached_members().len(), 1);

    channel.disconnect();
}
