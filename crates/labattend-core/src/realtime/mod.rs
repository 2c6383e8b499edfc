//! Server-push update channel.
//!
//! The backend streams attendance events at `/realtime/attendance`. The
//! channel keeps that stream open, reconnects with exponential backoff and
//! fans events out to subscribers by type. `bind_cache` turns known events
//! into targeted cache refreshes.

pub mod channel;
pub mod error;
pub mod event;
pub mod sse;
pub mod transport;

pub use channel::{ConnectionStatus, RealtimeChannel, ReconnectPolicy};
pub use error::RealtimeError;
pub use event::RealtimeEvent;
pub use transport::{EventStream, EventTransport, SseTransport};
