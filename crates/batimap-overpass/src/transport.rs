use async_trait::async_trait;
use std::time::Duration;

use crate::error::QueryError;

/// Sends one Overpass QL request to one endpoint and returns the raw body
#[async_trait]
pub trait QueryTransport: Send + Sync {
    async fn execute(&self, endpoint: &str, query: &str) -> Result<String, QueryError>;
}

/// reqwest based transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// `timeout` bounds a whole request, Overpass queries on large cities take minutes
    pub fn new(timeout: Duration) -> Result<Self, QueryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("batimap/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| QueryError::Transport {
                endpoint: String::new(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    async fn execute(&self, endpoint: &str, query: &str) -> Result<String, QueryError> {
        let response = self
            .client
            .post(endpoint)
            .form(&[("data", query)])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QueryError::ServerLoad {
                        endpoint: endpoint.to_string(),
                        status: 504,
                    }
                } else {
                    QueryError::Transport {
                        endpoint: endpoint.to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::from_status(endpoint, status.as_u16(), body));
        }

        response.text().await.map_err(|e| QueryError::Transport {
            endpoint: endpoint.to_string(),
            reason: format!("Failed to read response body: {}", e),
        })
    }
}
