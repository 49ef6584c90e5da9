use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{SparqlBackend, StoreConfig, StoreError};

/// Generic SPARQL 1.1 Protocol backend over HTTP
pub struct HttpSparqlBackend {
    client: Client,
    config: StoreConfig,
}

impl HttpSparqlBackend {
    /// Create a new HTTP backend
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            // Connection pooling: keep up to 10 idle connections per host
            .pool_max_idle_per_host(10)
            // Close idle connections after 30 seconds
            .pool_idle_timeout(Duration::from_secs(30))
            // TCP keepalive to detect dead connections
            .tcp_keepalive(Duration::from_secs(60))
            // Timeout for establishing new connections
            .connect_timeout(Duration::from_secs(10))
            // Default request timeout (overridden per-request)
            .timeout(Duration::from_millis(config.timeouts.query_ms))
            .build()?;

        Ok(Self { client, config })
    }

    /// Build request with optional authentication
    fn auth_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => builder.basic_auth(user, Some(pass)),
            _ => builder,
        }
    }
}

#[async_trait]
impl SparqlBackend for HttpSparqlBackend {
    fn name(&self) -> &'static str {
        "sparql-http"
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        let response = self
            .auth_headers(self.client.post(&self.config.query_url))
            .header("Content-Type", "application/sparql-query")
            .header("Accept", "application/sparql-results+json")
            .timeout(Duration::from_secs(10))
            .body("ASK {}")
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    async fn update(&self, query: &str, timeout: Duration) -> Result<(), StoreError> {
        let response = self
            .auth_headers(self.client.post(&self.config.update_url))
            .header("Content-Type", "application/sparql-update")
            .timeout(timeout + Duration::from_secs(5))
            .body(query.to_string())
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(StoreError::Backend { status, message })
        }
    }

    async fn select(&self, query: &str, timeout: Duration) -> Result<String, StoreError> {
        let response = self
            .auth_headers(self.client.post(&self.config.query_url))
            .header("Content-Type", "application/sparql-query")
            .header("Accept", "application/sparql-results+json")
            .timeout(timeout + Duration::from_secs(5))
            .body(query.to_string())
            .send()
            .await?;

        if response.status().is_success() {
            let body = response.text().await?;
            Ok(body)
        } else {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            Err(StoreError::Backend { status, message })
        }
    }
}
