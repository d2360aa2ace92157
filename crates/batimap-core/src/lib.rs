//! Batimap Core - Domain models, status classification and configuration
//!
//! This crate contains the core domain logic and the port definitions for the
//! external services (Overpass, cadastre listing, open data, tile cache).

pub mod classify;
pub mod config;
pub mod error;
pub mod models;
pub mod ports;

pub use classify::{classify, ClassifierInput, Classification};
pub use error::{BatimapError, Result};
