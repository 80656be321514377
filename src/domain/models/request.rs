//! Outbound request descriptors and cache key derivation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::cache::CacheCategory;

/// HTTP methods the orchestrator issues for reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET with query-string filters
    Get,
    /// HEAD, for existence checks; a success caches as `null`
    Head,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Head => f.write_str("HEAD"),
        }
    }
}

/// Query parameters, unique keys kept in sorted order
pub type QueryParams = BTreeMap<String, String>;

/// Logical identity of a cached response
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for a category, method, path and parameter set
    ///
    /// Format: `<category>:<path>` for GET, `<category>.<METHOD>:<path>`
    /// otherwise, followed by `?k=v&k2=v2` when parameters are present.
    /// Parameters are emitted in key order, so two parameter maps with the
    /// same contents always produce the same key, and the category prefix
    /// keeps identical requests in different tiers apart. Category names
    /// never contain `.`, so the method segment cannot be forged by a path.
    pub fn derive(
        category: CacheCategory,
        method: HttpMethod,
        path: &str,
        params: &QueryParams,
    ) -> Self {
        let mut key = match method {
            HttpMethod::Get => format!("{}:{}", category.as_str(), path),
            other => format!("{}.{}:{}", category.as_str(), other, path),
        };
        if !params.is_empty() {
            let query = params
                .iter()
                .map(|(k, v)| format!("{}={}", escape(k), escape(v)))
                .collect::<Vec<_>>()
                .join("&");
            key.push('?');
            key.push_str(&query);
        }
        Self(key)
    }

    /// Key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// `&`, `=` and `%` are the only separators in the key format.
fn escape(raw: &str) -> String {
    raw.replace('%', "%25").replace('&', "%26").replace('=', "%3D")
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single logical read against the remote API
///
/// Built by the caller after resolving the endpoint table; consumed once by
/// the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    category: CacheCategory,
    cache_key: CacheKey,
    method: HttpMethod,
    path: String,
    query_params: QueryParams,
    force_refresh: bool,
}

impl RequestDescriptor {
    /// Start building a GET descriptor for `path`
    pub fn get(category: CacheCategory, path: impl Into<String>) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder {
            category,
            method: HttpMethod::Get,
            path: path.into(),
            query_params: QueryParams::new(),
            force_refresh: false,
            cache_key: None,
        }
    }

    /// Start building a descriptor with an explicit method
    pub fn builder(
        category: CacheCategory,
        method: HttpMethod,
        path: impl Into<String>,
    ) -> RequestDescriptorBuilder {
        RequestDescriptorBuilder {
            method,
            ..Self::get(category, path)
        }
    }

    /// TTL tier of the response
    pub const fn category(&self) -> CacheCategory {
        self.category
    }

    /// Cache key the response is stored under
    pub const fn cache_key(&self) -> &CacheKey {
        &self.cache_key
    }

    /// HTTP method
    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    /// Path relative to the API base URL
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query-string parameters
    pub const fn query_params(&self) -> &QueryParams {
        &self.query_params
    }

    /// Whether the cache read is bypassed
    pub const fn force_refresh(&self) -> bool {
        self.force_refresh
    }
}

/// Builder for [`RequestDescriptor`]
#[derive(Debug, Clone)]
pub struct RequestDescriptorBuilder {
    category: CacheCategory,
    method: HttpMethod,
    path: String,
    query_params: QueryParams,
    force_refresh: bool,
    cache_key: Option<CacheKey>,
}

impl RequestDescriptorBuilder {
    /// Add a query parameter; a repeated key replaces the earlier value
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query_params.insert(key.into(), value.to_string());
        self
    }

    /// Add several query parameters
    #[must_use]
    pub fn params<K, V, I>(mut self, params: I) -> Self
    where
        K: Into<String>,
        V: ToString,
        I: IntoIterator<Item = (K, V)>,
    {
        for (key, value) in params {
            self.query_params.insert(key.into(), value.to_string());
        }
        self
    }

    /// Bypass the cache read (the response is still cached)
    #[must_use]
    pub const fn force_refresh(mut self, force: bool) -> Self {
        self.force_refresh = force;
        self
    }

    /// Override the derived cache key
    ///
    /// The caller then guarantees uniqueness within the category.
    #[must_use]
    pub fn cache_key(mut self, key: impl Into<CacheKey>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> RequestDescriptor {
        let cache_key = self
            .cache_key
            .unwrap_or_else(|| {
                CacheKey::derive(self.category, self.method, &self.path, &self.query_params)
            });

        RequestDescriptor {
            category: self.category,
            cache_key,
            method: self.method,
            path: self.path,
            query_params: self.query_params,
            force_refresh: self.force_refresh,
        }
    }
}
