mod error;
mod http;
pub(crate) mod sparql;

use std::time::Duration;

use async_trait::async_trait;
pub use error::StoreError;
pub use http::HttpSparqlBackend;
use serde::{Deserialize, Serialize};

/// Trait for SPARQL store backends
///
/// Implementations provide the low-level SPARQL protocol against a concrete
/// store (Fuseki, Blazegraph, GraphDB, etc.)
#[async_trait]
pub trait SparqlBackend: Send + Sync {
    /// Backend name for logging/debugging
    fn name(&self) -> &'static str;

    /// Health check - verify the store is reachable
    async fn health_check(&self) -> Result<bool, StoreError>;

    /// Execute a SPARQL UPDATE (INSERT DATA, CLEAR GRAPH, ...)
    ///
    /// Returns nothing on success
    async fn update(&self, query: &str, timeout: Duration) -> Result<(), StoreError>;

    /// Execute a SPARQL SELECT
    ///
    /// Returns SPARQL results JSON as a string
    async fn select(&self, query: &str, timeout: Duration) -> Result<String, StoreError>;
}

/// Connection settings for the backing SPARQL store
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct StoreConfig {
    /// SPARQL query endpoint URL
    pub query_url: String,

    /// SPARQL update endpoint URL
    pub update_url: String,

    /// Optional username for basic authentication
    pub username: Option<String>,

    /// Optional password for basic authentication
    pub password: Option<String>,

    /// Maximum number of connection retries on startup
    pub connect_max_retries: u32,

    /// Delay between connection retry attempts in milliseconds
    pub connect_retry_frequency_ms: u64,

    /// Timeout configuration for different operation types
    pub timeouts: TimeoutConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            query_url: "http://localhost:3030/ds/query".to_string(),
            update_url: "http://localhost:3030/ds/update".to_string(),
            username: None,
            password: None,
            connect_max_retries: 3,
            connect_retry_frequency_ms: 1000,
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Get connect retry frequency as Duration
    pub fn connect_retry_frequency(&self) -> Duration {
        Duration::from_millis(self.connect_retry_frequency_ms)
    }
}

/// Timeout configuration for different SPARQL operations
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct TimeoutConfig {
    /// Timeout for SELECT queries in milliseconds
    pub query_ms: u64,

    /// Timeout for INSERT/UPDATE operations in milliseconds
    pub insert_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            query_ms: 60_000,
            insert_ms: 300_000,
        }
    }
}

impl TimeoutConfig {
    /// Get query timeout as Duration
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_ms)
    }

    /// Get insert timeout as Duration
    pub fn insert_timeout(&self) -> Duration {
        Duration::from_millis(self.insert_ms)
    }
}
