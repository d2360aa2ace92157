use batimap_core::BatimapError;
use thiserror::Error;

/// Failure of a single Overpass request
#[derive(Debug, Error)]
pub enum QueryError {
    /// Too many requests from this client (HTTP 429)
    #[error("Rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    /// Server overloaded or timed out (HTTP 503/504)
    #[error("Server {endpoint} is overloaded (HTTP {status})")]
    ServerLoad { endpoint: String, status: u16 },

    /// Query aborted server side, reported in the `remark` of a 200 response
    #[error("Query aborted by {endpoint}: {remark}")]
    Aborted { endpoint: String, remark: String },

    #[error("HTTP {status} from {endpoint}: {body}")]
    Http { endpoint: String, status: u16, body: String },

    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

impl QueryError {
    /// Rate limiting and overload are worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            QueryError::RateLimited { .. } | QueryError::ServerLoad { .. } | QueryError::Aborted { .. }
        )
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(endpoint: &str, status: u16, body: String) -> Self {
        let endpoint = endpoint.to_string();
        match status {
            429 => QueryError::RateLimited { endpoint },
            503 | 504 => QueryError::ServerLoad { endpoint, status },
            _ => QueryError::Http { endpoint, status, body },
        }
    }
}

impl From<QueryError> for BatimapError {
    fn from(e: QueryError) -> Self {
        BatimapError::Query {
            transient: e.is_transient(),
            reason: e.to_string(),
        }
    }
}
