//! Extraction configuration.
//!
//! [`ExtractOptions`] is a builder that threads progress callbacks,
//! cancellation, worker count and tool settings through a BIF run without
//! polluting every function signature. [`ThumbnailProfile`] describes the
//! size and quality of the JPEGs ffmpeg is asked to produce.
//!
//! # Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use bifgen::{
//!     CancellationToken, ExtractOptions, ExtractionMode, ProgressCallback, ProgressInfo,
//!     ThumbnailProfile,
//! };
//!
//! struct LogProgress;
//! impl ProgressCallback for LogProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!("{:?}: {} done", info.operation, info.current);
//!     }
//! }
//!
//! let token = CancellationToken::new();
//! let options = ExtractOptions::new()
//!     .with_progress(Arc::new(LogProgress))
//!     .with_cancellation(token.clone())
//!     .with_workers(8)
//!     .with_mode(ExtractionMode::PerFrame)
//!     .with_profile(ThumbnailProfile::compact())
//!     .with_timeout(Duration::from_secs(100 * 60));
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::ffmpeg::FfmpegLogLevel;
use crate::progress::{CancellationToken, JobControl, NoOpProgress, ProgressCallback};

/// Size and encoder settings of the thumbnails written into the BIF.
///
/// `width` and `height` are passed to ffmpeg's `scale` filter and are also
/// the dimensions recorded in the BIF header. `quality` is ffmpeg's
/// `-qscale:v` value (2 = best, 31 = worst).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailProfile {
    /// Thumbnail width in pixels.
    pub width: u32,
    /// Thumbnail height in pixels.
    pub height: u32,
    /// MJPEG quantizer scale.
    pub quality: u32,
    /// Extra options appended to the `scale` filter
    /// (e.g. `flags=bicubic`).
    pub scale_flags: Option<String>,
}

impl ThumbnailProfile {
    /// 320×180 thumbnails at quantizer 10. This is the default.
    pub fn standard() -> Self {
        Self {
            width: 320,
            height: 180,
            quality: 10,
            scale_flags: None,
        }
    }

    /// 240×160 thumbnails at quantizer 4, bicubic scaling without dithering,
    /// shrunk to keep the source aspect ratio.
    pub fn compact() -> Self {
        Self {
            width: 240,
            height: 160,
            quality: 4,
            scale_flags: Some(
                "force_original_aspect_ratio=decrease:flags=bicubic:sws_dither=none".to_string(),
            ),
        }
    }

    /// Set the thumbnail resolution.
    #[must_use]
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the MJPEG quantizer scale. Clamped to ffmpeg's 2–31 range.
    #[must_use]
    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality.clamp(2, 31);
        self
    }

    /// Set (or clear, with `None`) the extra `scale` filter options.
    #[must_use]
    pub fn with_scale_flags(mut self, flags: Option<String>) -> Self {
        self.scale_flags = flags;
        self
    }
}

impl Default for ThumbnailProfile {
    fn default() -> Self {
        Self::standard()
    }
}

/// How frames are acquired from ffmpeg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// One ffmpeg process per timestamp, optionally run by several workers.
    /// This is the default.
    #[default]
    PerFrame,
    /// A single ffmpeg process emitting a continuous MJPEG stream.
    Stream,
}

/// Configuration for a BIF run.
///
/// All fields have sensible defaults: no progress callback, no cancellation,
/// no deadline, a single worker, per-frame extraction with the standard
/// profile, and `ffmpeg` / `ffprobe` looked up on `PATH`.
#[derive(Clone)]
pub struct ExtractOptions {
    /// Progress callback. Defaults to a no-op.
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Cancellation token. `None` means never cancelled.
    pub(crate) cancellation: Option<CancellationToken>,
    /// Upper bound for the whole job.
    pub(crate) timeout: Option<Duration>,
    /// How often to fire the progress callback (every N frames).
    pub(crate) batch_size: u64,
    /// Number of concurrent per-frame workers.
    pub(crate) workers: usize,
    pub(crate) mode: ExtractionMode,
    pub(crate) profile: ThumbnailProfile,
    pub(crate) ffmpeg_path: PathBuf,
    pub(crate) ffprobe_path: PathBuf,
    pub(crate) ffmpeg_log_level: FfmpegLogLevel,
}

impl Debug for ExtractOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractOptions")
            .field("has_progress", &true)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("timeout", &self.timeout)
            .field("batch_size", &self.batch_size)
            .field("workers", &self.workers)
            .field("mode", &self.mode)
            .field("profile", &self.profile)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("ffprobe_path", &self.ffprobe_path)
            .field("ffmpeg_log_level", &self.ffmpeg_log_level)
            .finish()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractOptions {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self {
            progress: Arc::new(NoOpProgress),
            cancellation: None,
            timeout: None,
            batch_size: 1,
            workers: 1,
            mode: ExtractionMode::PerFrame,
            profile: ThumbnailProfile::standard(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            ffmpeg_log_level: FfmpegLogLevel::Error,
        }
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// When the token is cancelled, running ffmpeg processes are killed and
    /// the run returns [`BifError::Cancelled`](crate::BifError::Cancelled).
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Bound the whole job (probe excluded) by `timeout`.
    ///
    /// On expiry running ffmpeg processes are killed and the run returns
    /// [`BifError::Timeout`](crate::BifError::Timeout).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set how often the progress callback fires.
    ///
    /// A value of 1 means every frame; 10 means every 10th frame.
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Set the number of concurrent per-frame workers. Clamped to a minimum
    /// of 1; ignored in [`ExtractionMode::Stream`].
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Select the frame acquisition strategy.
    #[must_use]
    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the thumbnail profile.
    #[must_use]
    pub fn with_profile(mut self, profile: ThumbnailProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Use a specific `ffmpeg` executable.
    #[must_use]
    pub fn with_ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffmpeg_path = path.into();
        self
    }

    /// Use a specific `ffprobe` executable.
    #[must_use]
    pub fn with_ffprobe_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ffprobe_path = path.into();
        self
    }

    /// Set ffmpeg's own console verbosity.
    #[must_use]
    pub fn with_ffmpeg_log_level(mut self, level: FfmpegLogLevel) -> Self {
        self.ffmpeg_log_level = level;
        self
    }

    /// Number of concurrent per-frame workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Selected frame acquisition strategy.
    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Selected thumbnail profile.
    pub fn profile(&self) -> &ThumbnailProfile {
        &self.profile
    }

    /// Start the job clock: the returned control fires on cancellation or
    /// once the configured timeout has elapsed from now.
    pub(crate) fn job_control(&self) -> JobControl {
        JobControl::new(self.cancellation.clone(), self.timeout)
    }
}
