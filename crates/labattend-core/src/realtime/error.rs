use thiserror::Error;

#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Event stream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Event stream rejected with status {0}")]
    Status(u16),

    #[error("Event stream closed")]
    Closed,
}
