//! Batimap Engine - Status refresh orchestration and work selection
//!
//! This crate sequences the batch refresh of city statuses, runs the single
//! city jobs, hosts the in-process job runtime and picks the next city a
//! volunteer should work on.

pub mod city_jobs;
pub mod generation;
pub mod jobs;
pub mod maintenance;
pub mod pipeline;
pub mod progress;
pub mod refresher;
pub mod selector;
pub mod service;

pub use city_jobs::CityJobs;
pub use jobs::JobRunner;
pub use pipeline::{InitdbPipeline, InitdbReport, Invalidation};
pub use progress::{LogProgress, NoopProgress, ProgressReporter};
pub use refresher::StatusRefresher;
pub use selector::{ObsoleteQuery, WorkSelector};
pub use service::{Batimap, Collaborators};
