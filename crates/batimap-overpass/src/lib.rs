//! Batimap Overpass - Spatial query client and cadastre generator adapter
//!
//! Queries the public Overpass instances in turn, retrying rate-limited and
//! overloaded responses with a fixed backoff schedule.

pub mod client;
pub mod error;
pub mod generator;
pub mod query;
pub mod retry;
pub mod transport;

pub use client::GeoQueryClient;
pub use error::QueryError;
pub use generator::HttpCadastreGenerator;
pub use retry::RetryPolicy;
pub use transport::{HttpTransport, QueryTransport};
