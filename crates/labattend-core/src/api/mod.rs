//! REST data access layer for the attendance backend.
//!
//! `ApiClient` issues one logical operation per resource and normalises the
//! backend's varying response shapes into `ApiResponse`. Requests carry a
//! bearer token once a session is established.

pub mod client;
pub mod envelope;
pub mod error;
pub mod source;

pub use client::ApiClient;
pub use envelope::ApiResponse;
pub use error::ApiError;
pub use source::DataSource;
