//! In-process job runtime
//!
//! Jobs are submitted fire-and-forget and polled by id. A bounded pool of
//! workers runs them; extra jobs stay `PENDING` until a worker frees up.

use batimap_core::error::{BatimapError, Result};
use batimap_core::models::{JobId, JobKey, JobState, JobStatus};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::sync::{Notify, Semaphore};

use crate::progress::{normalize, ProgressReporter};

type JobTable = Arc<RwLock<HashMap<JobId, JobStatus>>>;

/// Publishes progress into the job table, never moving backwards
pub struct JobProgress {
    jobs: JobTable,
    id: JobId,
}

impl ProgressReporter for JobProgress {
    fn report(&self, percent: f64) {
        let percent = normalize(percent);
        let mut jobs = self.jobs.write().unwrap();
        if let Some(job) = jobs.get_mut(&self.id) {
            if job.state == JobState::Progress && percent > job.progress {
                job.progress = percent;
            }
        }
    }
}

#[derive(Clone)]
pub struct JobRunner {
    jobs: JobTable,
    workers: Arc<Semaphore>,
    finished: Arc<Notify>,
}

impl JobRunner {
    pub fn new(workers: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            workers: Arc::new(Semaphore::new(workers.max(1))),
            finished: Arc::new(Notify::new()),
        }
    }

    /// Queue a job, always creating a new one
    pub fn submit<F, Fut>(&self, key: JobKey, work: F) -> JobId
    where
        F: FnOnce(Arc<dyn ProgressReporter>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        let id = JobId::new();
        self.jobs.write().unwrap().insert(id, JobStatus::pending(id, key));
        self.spawn(id, work);
        id
    }

    /// Reuse the active job with the same key, or queue a new one
    ///
    /// Lookup and insertion happen under one lock, so concurrent callers with
    /// equal keys always share a job.
    pub fn submit_once<F, Fut>(&self, key: JobKey, work: F) -> JobId
    where
        F: FnOnce(Arc<dyn ProgressReporter>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        let id = {
            let mut jobs = self.jobs.write().unwrap();
            if let Some(existing) = Self::active_with_key(&jobs, &key) {
                tracing::info!(job = %existing, name = key.kind.name(), args = ?key.args, "Found a job with same context");
                return existing;
            }
            let id = JobId::new();
            jobs.insert(id, JobStatus::pending(id, key));
            id
        };
        self.spawn(id, work);
        id
    }

    fn spawn<F, Fut>(&self, id: JobId, work: F)
    where
        F: FnOnce(Arc<dyn ProgressReporter>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        let jobs = self.jobs.clone();
        let workers = self.workers.clone();
        let finished = self.finished.clone();

        tokio::spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };
            Self::transition(&jobs, id, |job| {
                job.state = JobState::Progress;
                job.started_at = Some(Utc::now());
            });

            let reporter: Arc<dyn ProgressReporter> = Arc::new(JobProgress { jobs: jobs.clone(), id });
            let outcome = work(reporter).await;

            Self::transition(&jobs, id, |job| {
                job.finished_at = Some(Utc::now());
                match outcome {
                    Ok(result) => {
                        job.state = JobState::Success;
                        job.progress = 100.0;
                        job.result = Some(result);
                    }
                    Err(e) => {
                        tracing::error!(job = %id, name = job.key.kind.name(), error = %e, "Job failed");
                        job.state = JobState::Failure;
                        job.result = Some(serde_json::json!({ "error": e.to_string() }));
                    }
                }
            });
            finished.notify_waiters();
        });
    }

    fn transition(jobs: &JobTable, id: JobId, update: impl FnOnce(&mut JobStatus)) {
        if let Some(job) = jobs.write().unwrap().get_mut(&id) {
            update(job);
        }
    }

    fn active_with_key(jobs: &HashMap<JobId, JobStatus>, key: &JobKey) -> Option<JobId> {
        jobs.values()
            .filter(|job| job.state.is_active() && &job.key == key)
            .min_by_key(|job| job.submitted_at)
            .map(|job| job.id)
    }

    pub fn status(&self, id: JobId) -> Result<JobStatus> {
        self.jobs
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| BatimapError::JobNotFound { id: id.to_string() })
    }

    /// Active or queued job with the same kind and arguments
    pub fn find_active(&self, key: &JobKey) -> Option<JobId> {
        Self::active_with_key(&self.jobs.read().unwrap(), key)
    }

    /// Running jobs first, then queued ones, oldest first
    pub fn list_jobs(&self) -> Vec<JobStatus> {
        let mut active: Vec<JobStatus> = self
            .jobs
            .read()
            .unwrap()
            .values()
            .filter(|job| job.state.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|job| (!job.is_running(), job.submitted_at));
        active
    }

    /// Wait until the job leaves the active states
    pub async fn wait(&self, id: JobId) -> Result<JobStatus> {
        loop {
            let notified = self.finished.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let status = self.status(id)?;
            if !status.state.is_active() {
                return Ok(status);
            }
            notified.await;
        }
    }
}
