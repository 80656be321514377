//! Infrastructure layer module
//!
//! This module contains all infrastructure adapters and external integrations:
//! - reqwest transport and authenticator for the accounting API
//! - Configuration management
//! - Logging infrastructure
//! - Credentials resolution
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod credentials;
pub mod http;
pub mod logging;
