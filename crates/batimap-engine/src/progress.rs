//! Progress reporting
//!
//! Orchestration code reports a 0 to 100 figure through [`ProgressReporter`];
//! whether it ends up in the job runtime or in the logs is the caller's choice.

/// Clamp to [0, 100] and truncate to two decimals
pub fn normalize(percent: f64) -> f64 {
    if percent.is_nan() {
        return 0.0;
    }
    (percent.clamp(0.0, 100.0) * 100.0).floor() / 100.0
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, percent: f64);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _percent: f64) {}
}

/// Reporter for synchronous invocations: there is no job to publish to
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, percent: f64) {
        tracing::warn!(progress = normalize(percent), "Not running inside a job, progress is not published");
    }
}

/// One of `stages` equal slices of the overall progress
pub struct StageProgress<'a> {
    reporter: &'a dyn ProgressReporter,
    index: usize,
    stages: usize,
}

impl<'a> StageProgress<'a> {
    pub fn new(reporter: &'a dyn ProgressReporter, index: usize, stages: usize) -> Self {
        Self {
            reporter,
            index,
            stages: stages.max(1),
        }
    }

    /// `done` out of `total` units of this stage are complete
    pub fn advance(&self, done: usize, total: usize) {
        let slice = 100.0 / self.stages as f64;
        let fraction = if total == 0 { 1.0 } else { done as f64 / total as f64 };
        self.reporter.report(self.index as f64 * slice + fraction * slice);
    }
}

/// Maps a nested 0..100 progress onto `[offset, offset + span]`
pub struct ScaledProgress<'a> {
    reporter: &'a dyn ProgressReporter,
    offset: f64,
    span: f64,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(reporter: &'a dyn ProgressReporter, offset: f64, span: f64) -> Self {
        Self { reporter, offset, span }
    }
}

impl ProgressReporter for ScaledProgress<'_> {
    fn report(&self, percent: f64) {
        self.reporter.report(self.offset + percent.clamp(0.0, 100.0) / 100.0 * self.span);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<f64>>);

    impl ProgressReporter for Collect {
        fn report(&self, percent: f64) {
            self.0.lock().unwrap().push(percent);
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(-3.0), 0.0);
        assert_eq!(normalize(150.0), 100.0);
        assert_eq!(normalize(33.339), 33.33);
        assert_eq!(normalize(66.666_666), 66.66);
        assert_eq!(normalize(f64::NAN), 0.0);
    }

    #[test]
    fn test_stage_slices() {
        let collect = Collect::default();
        StageProgress::new(&collect, 0, 5).advance(1, 2);
        StageProgress::new(&collect, 2, 5).advance(3, 3);
        StageProgress::new(&collect, 4, 5).advance(0, 0);
        assert_eq!(*collect.0.lock().unwrap(), vec![10.0, 60.0, 100.0]);
    }

    #[test]
    fn test_scaled_progress() {
        let collect = Collect::default();
        let scaled = ScaledProgress::new(&collect, 1.0, 79.0);
        scaled.report(0.0);
        scaled.report(100.0);
        scaled.report(250.0);
        assert_eq!(*collect.0.lock().unwrap(), vec![1.0, 80.0, 80.0]);
    }
}
