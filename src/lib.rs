//! Ledgerbridge - session-managing, cache-backed client for accounting APIs
//!
//! Ledgerbridge keeps a single authenticated session alive against a remote
//! accounting API, serves reads from a tiered in-memory cache and retries
//! transient failures with bounded exponential backoff.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, error taxonomy and port traits
//! - **Service Layer** (`services`): session manager, tiered cache, request orchestrator
//! - **Infrastructure Layer** (`infrastructure`): reqwest adapters, config, logging, credentials
//! - **Application Layer** (`application`): the wired-up `Gateway`
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use ledgerbridge::{CacheCategory, ConfigLoader, Gateway, RequestDescriptor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = Gateway::from_env(ConfigLoader::load()?)?;
//!     let contacts = gateway
//!         .fetch(RequestDescriptor::get(CacheCategory::MasterData, "/contacts").build())
//!         .await?;
//!     println!("{contacts}");
//!     gateway.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::Gateway;
pub use domain::errors::{AuthError, FetchError, FetchErrorKind, TransportError};
pub use domain::models::{
    CacheCategory, CacheKey, CacheStatistics, Config, ConnectivityReport, CredentialKind,
    Credentials, RequestDescriptor,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{RequestOrchestrator, SessionManager, TieredCache};
