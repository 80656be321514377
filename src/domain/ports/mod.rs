//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the seams infrastructure adapters implement:
//! - Authenticator: login/refresh/logout against the remote API
//! - HttpTransport: single outbound HTTP attempts
//! - Clock: current time, swappable for deterministic expiry tests

pub mod authenticator;
pub mod clock;
pub mod transport;

pub use authenticator::Authenticator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use transport::{AuthHeader, HttpTransport, TransportRequest, TransportResponse};
