pub mod cache;
pub mod config;
pub mod connectivity;
pub mod request;
pub mod session;

pub use cache::{CacheCategory, CacheEntry, CacheStatistics, CategoryTtls, EntryInfo};
pub use config::{
    ApiConfig, CacheConfig, Config, RateLimitConfig, RetryConfig, SessionConfig,
};
pub use connectivity::ConnectivityReport;
pub use request::{
    CacheKey, HttpMethod, QueryParams, RequestDescriptor, RequestDescriptorBuilder,
};
pub use session::{CredentialKind, Credentials, IssuedToken, Session};
