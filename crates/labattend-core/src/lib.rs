//! Core library for the lab attendance dashboard.
//!
//! This crate holds everything a dashboard front end needs below its
//! presentation layer:
//!
//! - `api`: typed REST client with timeout, retry and envelope normalisation
//! - `models`: members, attendance records, RFID scans, statistics
//! - `status`: the single attendance-status deriver
//! - `roster`: ordered record-to-member matching and daily roster assembly
//! - `cache`: the in-memory store with TTL, in-flight dedup and subscribers
//! - `realtime`: the server-push event channel with reconnect backoff
//! - `poller`: long-interval fallback refresh
//! - `auth`: session persistence
//! - `config`: configuration loading

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod listeners;
pub mod models;
pub mod poller;
pub mod realtime;
pub mod roster;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiClient, ApiError, ApiResponse, DataSource};
pub use cache::{CacheManager, ResourceKey};
pub use config::Config;
pub use realtime::{ConnectionStatus, RealtimeChannel, RealtimeEvent};
pub use status::{derive_status, duration_minutes, is_valid_duration, DerivedStatus, StatusPolicy};
