//! HTTP transport seam for the OData provider
//!
//! Requests go through the [`Transport`] trait so the provider logic can be
//! exercised against an in-memory transport in tests.

use crate::config::HttpConfig;
use crate::error::{Result, SearchError};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Transport used by the OData provider
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one GET request relative to the service root and decode the
    /// JSON body
    async fn get_json(&self, path_and_query: &str) -> Result<Value>;

    /// Refresh the security session after an authorization expiry
    async fn refresh_session(&self) -> Result<()>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SearchError::Configuration(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}/{}", self.base_url, path_and_query.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, path_and_query: &str) -> Result<Value> {
        let request_id = Uuid::new_v4();
        let url = self.url(path_and_query);

        debug!(request_id = %request_id, url = %url, "Dispatching backend request");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            warn!(request_id = %request_id, status = status.as_u16(), "Security session rejected");
            return Err(SearchError::AuthExpired(format!(
                "backend returned {}",
                status.as_u16()
            )));
        }

        if !status.is_success() {
            return Err(SearchError::Network(format!(
                "backend returned {} for {}",
                status.as_u16(),
                url
            )));
        }

        let body = response.json::<Value>().await?;
        debug!(request_id = %request_id, "Backend request completed");
        Ok(body)
    }

    async fn refresh_session(&self) -> Result<()> {
        let url = self.url("Session?action=refresh");
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SearchError::AuthExpired(format!(
                "session refresh failed with {}",
                response.status().as_u16()
            )));
        }

        debug!("Security session refreshed");
        Ok(())
    }
}
