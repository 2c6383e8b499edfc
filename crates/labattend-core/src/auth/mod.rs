//! Session persistence for the admin login.
//!
//! The bearer token returned by `/auth/login` is saved next to the cache
//! directory and reused until it is 24 hours old.

pub mod session;

pub use session::{Session, SessionData};
