//! Extraction jobs.
//!
//! An [`ExtractionJob`] fixes everything one run needs to know about the
//! video: where it is, how far apart thumbnails are, how many workers to use
//! and how many frames to produce. It is built once, validated up front, and
//! never changes while the run is in progress.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::BifError;
use crate::frame::frame_timestamp;

/// Immutable description of one BIF run.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionJob {
    video: PathBuf,
    interval: Duration,
    workers: usize,
    frame_count: usize,
}

impl ExtractionJob {
    /// Build a job for a video of `duration_seconds`.
    ///
    /// # Errors
    ///
    /// Returns [`BifError::InvalidInterval`] for an interval shorter than one
    /// millisecond, [`BifError::EmptyInput`] when the duration yields no
    /// frames and [`BifError::TooManyFrames`] when it yields more than the
    /// header can count.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use bifgen::ExtractionJob;
    ///
    /// let job = ExtractionJob::new("input.mp4", Duration::from_secs(10), 4, 95.0)?;
    /// assert_eq!(job.frame_count(), 10);
    /// # Ok::<(), bifgen::BifError>(())
    /// ```
    pub fn new(
        video: impl Into<PathBuf>,
        interval: Duration,
        workers: usize,
        duration_seconds: f64,
    ) -> Result<Self, BifError> {
        let frame_count = frame_count(duration_seconds, interval)?;
        Ok(Self {
            video: video.into(),
            interval,
            workers: workers.max(1),
            frame_count,
        })
    }

    /// Build a job with an explicit frame count.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ExtractionJob::new`]; a `frame_count` of zero is
    /// [`BifError::EmptyInput`].
    pub fn with_frame_count(
        video: impl Into<PathBuf>,
        interval: Duration,
        workers: usize,
        frame_count: usize,
    ) -> Result<Self, BifError> {
        validate_interval(interval)?;
        if frame_count == 0 {
            return Err(BifError::EmptyInput);
        }
        if u32::try_from(frame_count).is_err() {
            return Err(BifError::TooManyFrames(frame_count));
        }
        Ok(Self {
            video: video.into(),
            interval,
            workers: workers.max(1),
            frame_count,
        })
    }

    /// The video to extract from.
    pub fn video(&self) -> &Path {
        &self.video
    }

    /// Spacing between thumbnails.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of concurrent workers (at least 1).
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Number of thumbnails the job produces.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Position in the video of frame `index`.
    pub fn timestamp(&self, index: usize) -> Duration {
        frame_timestamp(index, self.interval)
    }

    /// The interval in whole milliseconds, as stored in the BIF header.
    pub fn interval_ms(&self) -> u32 {
        interval_ms(self.interval)
    }
}

/// Number of thumbnails for a video: `floor(duration / interval) + 1`.
///
/// A thumbnail is taken at `0`, `interval`, `2 × interval`, … up to and
/// including the last multiple of `interval` that does not exceed the
/// duration.
///
/// # Errors
///
/// [`BifError::InvalidInterval`] if `interval` is shorter than one
/// millisecond, [`BifError::EmptyInput`] if the result is below one (a
/// negative or non-finite duration), [`BifError::TooManyFrames`] if it does
/// not fit the 32-bit frame count of the header.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// assert_eq!(bifgen::frame_count(95.0, Duration::from_secs(10))?, 10);
/// assert_eq!(bifgen::frame_count(0.0, Duration::from_secs(10))?, 1);
/// # Ok::<(), bifgen::BifError>(())
/// ```
pub fn frame_count(duration_seconds: f64, interval: Duration) -> Result<usize, BifError> {
    validate_interval(interval)?;
    let count = (duration_seconds / interval.as_secs_f64()).floor() + 1.0;
    if !count.is_finite() || count < 1.0 {
        return Err(BifError::EmptyInput);
    }
    if count > f64::from(u32::MAX) {
        return Err(BifError::TooManyFrames(count as usize));
    }
    Ok(count as usize)
}

/// Reject intervals that cannot be represented in the BIF header.
pub(crate) fn validate_interval(interval: Duration) -> Result<(), BifError> {
    if interval.as_millis() == 0 || interval.as_millis() > u128::from(u32::MAX) {
        return Err(BifError::InvalidInterval);
    }
    Ok(())
}

/// Whole milliseconds of `interval`, saturating at `u32::MAX`.
pub(crate) fn interval_ms(interval: Duration) -> u32 {
    u32::try_from(interval.as_millis()).unwrap_or(u32::MAX)
}
