//! Domain layer for Ledgerbridge
//!
//! Models, error taxonomy and port traits. Nothing in here performs I/O.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{AuthError, FetchError, FetchErrorKind, TransportError};
