//! Progress reporting, cancellation and job deadlines.
//!
//! This module provides [`ProgressCallback`] for monitoring extraction
//! progress, [`CancellationToken`] for cooperative cancellation, and
//! [`JobControl`] which combines a token with an optional deadline so that
//! running ffmpeg processes can be stopped mid-job.
//!
//! # Ordering
//!
//! `current` in [`ProgressInfo`] never decreases. With a single worker the
//! callback fires in frame-index order; with several workers it fires in
//! completion order, so [`ProgressInfo::current_frame`] may jump around.
//!
//! # Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use bifgen::{BifError, BifGenerator, ExtractOptions, ProgressCallback, ProgressInfo};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("[{:?}] {pct:.1}% complete", info.operation);
//!         }
//!     }
//! }
//!
//! let options = ExtractOptions::new().with_progress(Arc::new(PrintProgress));
//! BifGenerator::new("input.mp4", Duration::from_secs(10))
//!     .with_options(options)
//!     .save("input.bif")?;
//! # Ok::<(), BifError>(())
//! ```

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::{Duration, Instant};

use crate::error::BifError;

/// The kind of operation currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Extracting frames with one ffmpeg process per timestamp.
    FrameExtraction,
    /// Splitting the continuous MJPEG stream of a single ffmpeg process.
    StreamDemux,
}

/// A snapshot of extraction progress.
///
/// Delivered to [`ProgressCallback::on_progress`] at a cadence controlled
/// by [`ExtractOptions::with_batch_size`](crate::ExtractOptions::with_batch_size).
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// How many frames have been attempted so far, successful or not.
    pub current: u64,
    /// Total frames expected, if known ahead of time.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Wall-clock time elapsed since the operation started.
    pub elapsed: Duration,
    /// Estimated time remaining, based on current throughput.
    pub estimated_remaining: Option<Duration>,
    /// Index of the frame that just finished.
    pub current_frame: Option<u64>,
    /// Timestamp of the frame that just finished.
    pub current_timestamp: Option<Duration>,
}

/// Trait for receiving progress updates during extraction.
///
/// Implementations must be [`Send`] and [`Sync`]: in parallel mode the
/// callback is shared with worker threads, so any mutable state it keeps has
/// to be synchronized by the implementation itself.
///
/// Progress callbacks are **infallible**: they observe but cannot halt
/// the operation. Use [`CancellationToken`] for cooperative cancellation.
pub trait ProgressCallback: Send + Sync {
    /// Called after every frame attempt (or every batch of attempts).
    fn on_progress(&self, info: &ProgressInfo);
}

/// A no-op implementation that discards all progress notifications.
///
/// This is the default when no callback is configured.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone this token and share it between threads; call [`cancel`](CancellationToken::cancel)
/// from any thread to request cancellation. Running ffmpeg processes of the
/// job are killed and the job returns [`BifError::Cancelled`].
///
/// # Example
///
/// ```
/// use bifgen::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// // From another thread (or a signal handler, etc.):
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation.
    ///
    /// All clones of this token will observe the cancellation.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Stop conditions for one job: an optional cancellation token and an
/// optional deadline.
///
/// A `JobControl` is cheap to clone and is handed to every process the job
/// spawns; the supervising thread of each process polls it and kills the
/// process once it fires.
#[derive(Debug, Clone, Default)]
pub struct JobControl {
    cancellation: Option<CancellationToken>,
    deadline: Option<(Instant, Duration)>,
}

impl JobControl {
    /// A control that never fires.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Build a control from an optional token and an optional timeout
    /// measured from now.
    pub fn new(cancellation: Option<CancellationToken>, timeout: Option<Duration>) -> Self {
        Self {
            cancellation,
            deadline: timeout.map(|limit| (Instant::now() + limit, limit)),
        }
    }

    /// Returns the error the job should stop with, if any.
    ///
    /// Cancellation takes precedence over the deadline.
    pub fn check(&self) -> Result<(), BifError> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
        {
            return Err(BifError::Cancelled);
        }
        match self.deadline {
            Some((deadline, limit)) if Instant::now() >= deadline => Err(BifError::Timeout(limit)),
            _ => Ok(()),
        }
    }

    /// Returns `true` once the job should stop.
    pub fn should_stop(&self) -> bool {
        self.check().is_err()
    }
}

/// Internal helper that tracks progress timing and emits callbacks.
pub(crate) struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    operation: OperationType,
    total: Option<u64>,
    current: u64,
    batch_size: u64,
    start_time: Instant,
    items_since_last_report: u64,
}

impl ProgressTracker {
    /// Create a new tracker.
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        operation: OperationType,
        total: Option<u64>,
        batch_size: u64,
    ) -> Self {
        Self {
            callback,
            operation,
            total,
            current: 0,
            batch_size: batch_size.max(1),
            start_time: Instant::now(),
            items_since_last_report: 0,
        }
    }

    /// Record one attempted frame and fire the callback if the batch
    /// threshold is reached.
    pub(crate) fn advance(&mut self, frame_index: Option<u64>, timestamp: Option<Duration>) {
        self.current += 1;
        self.items_since_last_report += 1;

        if self.items_since_last_report >= self.batch_size {
            self.report(frame_index, timestamp);
            self.items_since_last_report = 0;
        }
    }

    /// Emit the trailing report if the last batch was not reported yet.
    pub(crate) fn finish(&mut self) {
        if self.items_since_last_report > 0 {
            self.report(None, None);
            self.items_since_last_report = 0;
        }
    }

    fn report(&self, frame_index: Option<u64>, timestamp: Option<Duration>) {
        let elapsed = self.start_time.elapsed();

        // The stream demuxer may emit one frame more than the probe predicted.
        let total = self.total.map(|total| total.max(self.current));

        let percentage = total
            .filter(|&t| t > 0)
            .map(|t| (self.current as f32 / t as f32) * 100.0);

        let estimated_remaining = if self.current > 0 {
            total.map(|t| {
                let remaining = t.saturating_sub(self.current);
                let per_item = elapsed.div_f64(self.current as f64);
                per_item.mul_f64(remaining as f64)
            })
        } else {
            None
        };

        let info = ProgressInfo {
            operation: self.operation,
            current: self.current,
            total,
            percentage,
            elapsed,
            estimated_remaining,
            current_frame: frame_index,
            current_timestamp: timestamp,
        };

        self.callback.on_progress(&info);
    }
}
