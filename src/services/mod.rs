//! Core services: session lifecycle, response cache and request pipeline.

pub mod request_orchestrator;
pub mod session_manager;
pub mod tiered_cache;

pub use request_orchestrator::RequestOrchestrator;
pub use session_manager::{SessionManager, SessionPolicy, SessionStatus};
pub use tiered_cache::TieredCache;
