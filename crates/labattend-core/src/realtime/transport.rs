use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::ACCEPT;
use reqwest::Client;
use tracing::{debug, warn};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::api::ApiClient;

use super::error::RealtimeError;
use super::event::RealtimeEvent;
use super::sse::SseDecoder;

/// Decoded events from one open connection. The stream ends when the
/// server closes the connection; an `Err` item means the transport broke.
pub type EventStream = BoxStream<'static, Result<RealtimeEvent, RealtimeError>>;

/// Opens event-stream connections for `RealtimeChannel`.
#[async_trait]
pub trait EventTransport: Send + Sync {
    async fn open(&self) -> Result<EventStream, RealtimeError>;
}

/// Server-sent events over HTTP.
///
/// Uses its own HTTP client: the API client's total request timeout would
/// cut a long-lived stream, so only the connect phase is bounded here.
pub struct SseTransport {
    http: Client,
    api: ApiClient,
}

impl SseTransport {
    /// The bearer token is read from `api` on every (re)connect.
    pub fn new(api: ApiClient) -> Result<Self, RealtimeError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { http, api })
    }
}

#[async_trait]
impl EventTransport for SseTransport {
    async fn open(&self) -> Result<EventStream, RealtimeError> {
        let url = self.api.realtime_url();
        let mut request = self.http.get(&url).header(ACCEPT, "text/event-stream");
        if let Some(token) = self.api.token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RealtimeError::Status(status.as_u16()));
        }
        debug!(url = %url, "Event stream opened");

        let mut decoder = SseDecoder::new();
        let events = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder
                    .feed(&bytes)
                    .into_iter()
                    .filter_map(|frame| {
                        let data = frame.data.clone();
                        let event = frame.into_event();
                        if event.is_none() {
                            warn!(data = %data, "Skipping unrecognised event frame");
                        }
                        event
                    })
                    .map(Ok)
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(RealtimeError::from(e))],
            })
            .flat_map(stream::iter)
            .boxed();

        Ok(events)
    }
}
