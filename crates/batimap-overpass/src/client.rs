use async_trait::async_trait;
use batimap_core::config::Settings;
use batimap_core::error::{BatimapError, Result};
use batimap_core::models::BuildingRecord;
use batimap_core::ports::BuildingQuery;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::QueryError;
use crate::query::{city_buildings_query, OverpassResponse};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::transport::{HttpTransport, QueryTransport};

/// Overpass client spreading queries over several public instances
pub struct GeoQueryClient<T = HttpTransport> {
    endpoints: Vec<String>,
    counter: AtomicUsize,
    transport: T,
    policy: RetryPolicy,
}

impl GeoQueryClient<HttpTransport> {
    /// HTTP client built from the effective configuration
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let transport = HttpTransport::new(Duration::from_secs(settings.overpass_timeout_secs))?;
        let policy = RetryPolicy::new(settings.max_retries, Duration::from_secs(settings.backoff_step_secs));
        Self::new(settings.overpass_endpoints.clone(), transport, policy)
    }
}

impl<T: QueryTransport> GeoQueryClient<T> {
    pub fn new(endpoints: Vec<String>, transport: T, policy: RetryPolicy) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(BatimapError::ConfigMissing {
                key: "overpass_endpoints".to_string(),
            });
        }
        Ok(Self {
            endpoints,
            counter: AtomicUsize::new(0),
            transport,
            policy,
        })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Round-robin pick, one per logical query
    fn next_endpoint(&self) -> &str {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        &self.endpoints[n % self.endpoints.len()]
    }

    /// Run a query, retrying transient failures on the same endpoint
    pub async fn query_with_retries(&self, query: &str) -> std::result::Result<OverpassResponse, QueryError> {
        let endpoint = self.next_endpoint();
        tracing::debug!(endpoint, query, "Executing Overpass query");

        run_with_retry(&self.policy, |_attempt| async move {
            let body = self.transport.execute(endpoint, query).await?;
            let response: OverpassResponse = serde_json::from_str(&body).map_err(|e| QueryError::Decode {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;
            match &response.remark {
                Some(remark) if remark.contains("runtime error") => Err(QueryError::Aborted {
                    endpoint: endpoint.to_string(),
                    remark: remark.clone(),
                }),
                _ => Ok(response),
            }
        })
        .await
    }
}

#[async_trait]
impl<T: QueryTransport> BuildingQuery for GeoQueryClient<T> {
    async fn city_buildings(&self, insee: &str, ignored_buildings: &[String]) -> Result<Vec<BuildingRecord>> {
        let query = city_buildings_query(insee, ignored_buildings);
        let response = self.query_with_retries(&query).await.map_err(|e| {
            tracing::error!(insee, error = %e, "Overpass query failed");
            BatimapError::from(e)
        })?;
        Ok(response.elements)
    }
}
