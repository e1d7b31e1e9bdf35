//! Progress tracking and callbacks for fusion runs.
//!
//! The engine processes masked voxels in batches and reports once per batch.
//! Callbacks are invoked from the calling thread only, never from inside a
//! parallel batch.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Progress after one batch of voxels.
#[derive(Debug, Clone, PartialEq)]
pub struct FusionProgress {
    /// Masked voxels processed so far.
    pub processed: usize,
    /// Masked voxels in total.
    pub total: usize,
    /// Time elapsed since start.
    pub elapsed: Duration,
    /// Estimated remaining time.
    pub estimated_remaining: Option<Duration>,
    /// Voxels so far whose weights fell back to uniform.
    pub fallback_voxels: usize,
}

impl FusionProgress {
    /// Create new progress information.
    pub fn new(processed: usize, total: usize, elapsed: Duration, fallback_voxels: usize) -> Self {
        Self {
            processed,
            total,
            elapsed,
            estimated_remaining: None,
            fallback_voxels,
        }
    }

    /// Calculate progress percentage.
    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.processed as f64 / self.total as f64) * 100.0
    }

    /// Calculate estimated remaining time.
    pub fn calculate_remaining(&mut self) {
        if self.processed > 0 {
            let per_voxel = self.elapsed.as_secs_f64() / self.processed as f64;
            let remaining = self.total.saturating_sub(self.processed);
            self.estimated_remaining = Some(Duration::from_secs_f64(per_voxel * remaining as f64));
        }
    }
}

/// Summary of one fusion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FusionReport {
    /// Masked voxels that were fused.
    pub voxels_processed: usize,
    /// Voxels whose weight system was singular or non-finite.
    pub fallback_voxels: usize,
    /// Voxels where non-negativity dropped at least one atlas.
    pub constrained_voxels: usize,
    /// Wall time of the voxel loop.
    pub elapsed: Duration,
}

/// Progress callback trait for monitoring fusion.
pub trait ProgressCallback: Send + Sync {
    /// Called after each batch.
    fn on_progress(&self, progress: &FusionProgress);

    /// Called before the first batch with the number of masked voxels.
    fn on_start(&self, _total: usize) {}

    /// Called once all voxels are fused.
    fn on_complete(&self, _report: &FusionReport) {}
}

/// Console progress callback that logs to tracing.
#[derive(Debug, Clone)]
pub struct ConsoleProgressCallback {
    /// Minimum percentage advance between two log lines.
    pub log_every_percent: f64,
    last_logged: Arc<Mutex<f64>>,
}

impl Default for ConsoleProgressCallback {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl ConsoleProgressCallback {
    /// Create a new console progress callback.
    pub fn new(log_every_percent: f64) -> Self {
        Self {
            log_every_percent,
            last_logged: Arc::new(Mutex::new(f64::NEG_INFINITY)),
        }
    }
}

impl ProgressCallback for ConsoleProgressCallback {
    fn on_progress(&self, progress: &FusionProgress) {
        let percent = progress.progress_percent();
        let mut last = lock(&self.last_logged);
        if percent - *last < self.log_every_percent && progress.processed < progress.total {
            return;
        }
        *last = percent;

        let remaining = progress
            .estimated_remaining
            .map(|d| format!("{:.2}s", d.as_secs_f64()))
            .unwrap_or_else(|| "N/A".to_string());
        tracing::info!(
            "Fused {}/{} voxels ({:.1}%) | Fallbacks: {} | Elapsed: {:.2}s | ETA: {}",
            progress.processed,
            progress.total,
            percent,
            progress.fallback_voxels,
            progress.elapsed.as_secs_f64(),
            remaining
        );
    }

    fn on_start(&self, total: usize) {
        *lock(&self.last_logged) = f64::NEG_INFINITY;
        tracing::info!("Joint label fusion started over {} voxels", total);
    }

    fn on_complete(&self, report: &FusionReport) {
        tracing::info!(
            "Joint label fusion completed in {:.2}s: {} voxels, {} fallbacks, {} constrained",
            report.elapsed.as_secs_f64(),
            report.voxels_processed,
            report.fallback_voxels,
            report.constrained_voxels
        );
    }
}

/// History callback that records all progress information.
#[derive(Debug, Clone, Default)]
pub struct HistoryCallback {
    history: Arc<Mutex<Vec<FusionProgress>>>,
    report: Arc<Mutex<Option<FusionReport>>>,
}

impl HistoryCallback {
    /// Create a new history callback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded history.
    pub fn get_history(&self) -> Vec<FusionProgress> {
        lock(&self.history).clone()
    }

    /// The final report, once the run has completed.
    pub fn report(&self) -> Option<FusionReport> {
        lock(&self.report).clone()
    }

    /// Clear the history.
    pub fn clear(&self) {
        lock(&self.history).clear();
        *lock(&self.report) = None;
    }
}

impl ProgressCallback for HistoryCallback {
    fn on_progress(&self, progress: &FusionProgress) {
        lock(&self.history).push(progress.clone());
    }

    fn on_complete(&self, report: &FusionReport) {
        *lock(&self.report) = Some(report.clone());
    }
}

/// Fans progress out to the registered callbacks and keeps the clock.
#[derive(Clone, Default)]
pub struct ProgressTracker {
    callbacks: Vec<Arc<dyn ProgressCallback>>,
    start_time: Option<Instant>,
    total: usize,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a callback.
    pub fn add_callback(&mut self, callback: Arc<dyn ProgressCallback>) {
        self.callbacks.push(callback);
    }

    /// Start tracking `total` voxels.
    pub fn start(&mut self, total: usize) {
        self.start_time = Some(Instant::now());
        self.total = total;
        for callback in &self.callbacks {
            callback.on_start(total);
        }
    }

    /// Time since [`ProgressTracker::start`].
    pub fn elapsed(&self) -> Duration {
        self.start_time.map(|t| t.elapsed()).unwrap_or(Duration::ZERO)
    }

    /// Update progress.
    pub fn update(&self, processed: usize, fallback_voxels: usize) {
        if self.callbacks.is_empty() {
            return;
        }
        let mut progress = FusionProgress::new(processed, self.total, self.elapsed(), fallback_voxels);
        progress.calculate_remaining();
        for callback in &self.callbacks {
            callback.on_progress(&progress);
        }
    }

    /// Complete tracking.
    pub fn complete(&self, report: &FusionReport) {
        for callback in &self.callbacks {
            callback.on_complete(report);
        }
    }
}

// Recovers the guard from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
