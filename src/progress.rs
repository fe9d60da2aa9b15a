//! Progress reporting.
//!
//! Reversing a long clip decodes and re-encodes every frame, so the pipeline
//! reports what it is doing through a [`ProgressCallback`]. Callbacks only
//! observe; there is no cancellation.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use rewind::{PipelineOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {} {pct:.1}%", info.operation, info.input.display());
//!         }
//!     }
//! }
//!
//! let options = PipelineOptions::new().with_progress(Arc::new(PrintProgress));
//! ```

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

/// The kind of work currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Decoding the input into memory.
    Decoding,
    /// Encoding the reversed video.
    Encoding,
    /// Writing reversed frames as images.
    FrameExtraction,
    /// Decoding and encoding the combined video.
    Combining,
}

/// A snapshot of progress for one input.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// Input file being processed.
    pub input: PathBuf,
    /// Frames processed so far in this operation.
    pub current: u64,
    /// Total frames expected, if known.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time since the operation started.
    pub elapsed: Duration,
}

/// Receives progress updates.
///
/// Must be [`Send`] and [`Sync`]: with the `rayon` feature, inputs are
/// processed on worker threads that share one callback.
pub trait ProgressCallback: Send + Sync {
    /// Called every few frames and once when an operation finishes.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all progress notifications. Default when nothing is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Tracks timing for one operation and emits callbacks every `batch_size`
/// items.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    input: PathBuf,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        input: impl Into<PathBuf>,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            input: input.into(),
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// A tracker that reports to nobody.
    pub(crate) fn silent(operation: OperationType, input: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(NoOpProgress), operation, input, None, u64::MAX)
    }

    /// Record one completed item.
    pub(crate) fn advance(&mut self) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report();
            self.items_since_last_report = 0;
        }
    }

    /// Unconditionally emit a final report.
    pub(crate) fn finish(&mut self) {
        self.report();
    }

    fn report(&self) {
        let percentage = self
            .total
            .filter(|&total| total > 0)
            .map(|total| ((self.current as f32 / total as f32) * 100.0).min(100.0));

        let info = ProgressInfo {
            operation: self.operation,
            input: self.input.clone(),
            current: self.current,
            total: self.total,
            percentage,
            elapsed: self.start_time.elapsed(),
        };

        self.callback.on_progress(&info);
    }
}
