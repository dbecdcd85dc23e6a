//! Core [`BifGenerator`] implementation.
//!
//! `BifGenerator` is the main entry point for the crate. It runs the whole
//! pipeline for one video: probe the duration, size the job, acquire the
//! frames with the configured [`FrameSource`], and encode them as a BIF.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::bif::{self, BifHeader};
use crate::configuration::ExtractOptions;
use crate::error::BifError;
use crate::extractor::{FfmpegFrameExtractor, FrameExtractor};
use crate::frame::Frame;
use crate::job::{ExtractionJob, validate_interval};
use crate::probe::{DurationProbe, FfprobeDuration};
use crate::source::FrameSource;

/// Builds a BIF for one video.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use bifgen::{BifError, BifGenerator, ExtractOptions, ExtractionMode};
///
/// let options = ExtractOptions::new().with_workers(8);
/// let written = BifGenerator::new("input.mp4", Duration::from_secs(10))
///     .with_options(options)
///     .save("input.bif")?;
/// println!("wrote {written} bytes");
///
/// // One ffmpeg process for the whole video instead.
/// BifGenerator::new("input.mp4", Duration::from_secs(10))
///     .with_options(ExtractOptions::new().with_mode(ExtractionMode::Stream))
///     .save("input-stream.bif")?;
/// # Ok::<(), BifError>(())
/// ```
pub struct BifGenerator {
    video: PathBuf,
    interval: Duration,
    options: ExtractOptions,
    probe: Option<Arc<dyn DurationProbe>>,
    extractor: Option<Arc<dyn FrameExtractor>>,
}

impl Debug for BifGenerator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("BifGenerator")
            .field("video", &self.video)
            .field("interval", &self.interval)
            .field("options", &self.options)
            .field("custom_probe", &self.probe.is_some())
            .field("custom_extractor", &self.extractor.is_some())
            .finish()
    }
}

impl BifGenerator {
    /// Generator for `video` with one thumbnail every `interval`.
    pub fn new<P: AsRef<Path>>(video: P, interval: Duration) -> Self {
        Self {
            video: video.as_ref().to_path_buf(),
            interval,
            options: ExtractOptions::new(),
            probe: None,
            extractor: None,
        }
    }

    /// Replace the extraction options.
    #[must_use]
    pub fn with_options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Use a custom duration probe instead of `ffprobe`.
    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn DurationProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Use a custom per-frame extractor instead of `ffmpeg`.
    ///
    /// Only consulted in [`ExtractionMode::PerFrame`](crate::ExtractionMode::PerFrame).
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn FrameExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// The options in effect.
    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// The header the generated BIF will carry.
    ///
    /// # Errors
    ///
    /// [`BifError::InvalidInterval`] for an interval below one millisecond.
    pub fn header(&self) -> Result<BifHeader, BifError> {
        let profile = self.options.profile();
        BifHeader::new(self.interval, profile.width, profile.height)
    }

    /// Probe the video and size the job.
    ///
    /// The interval is validated before `ffprobe` runs.
    ///
    /// # Errors
    ///
    /// [`BifError::InvalidInterval`], [`BifError::Probe`] or
    /// [`BifError::EmptyInput`].
    pub fn job(&self) -> Result<ExtractionJob, BifError> {
        validate_interval(self.interval)?;

        let duration = match &self.probe {
            Some(probe) => probe.probe(&self.video)?,
            None => FfprobeDuration::with_program(&self.options.ffprobe_path).probe(&self.video)?,
        };

        let job = ExtractionJob::new(&self.video, self.interval, self.options.workers(), duration)?;
        log::info!(
            "Video duration: {:.0}s, extracting {} frames",
            duration,
            job.frame_count()
        );
        Ok(job)
    }

    /// Probe the video and acquire all of its thumbnails, in index order.
    ///
    /// # Errors
    ///
    /// Everything [`job`](BifGenerator::job) returns, plus
    /// [`BifError::NoFramesExtracted`], [`BifError::Demux`],
    /// [`BifError::Cancelled`] and [`BifError::Timeout`].
    pub fn frames(&self) -> Result<Vec<Frame>, BifError> {
        let job = self.job()?;
        self.frames_for(&job)
    }

    /// Acquire the thumbnails of an already sized job.
    ///
    /// The job timeout starts counting here.
    ///
    /// # Errors
    ///
    /// Same as [`frames`](BifGenerator::frames), minus the probe errors.
    pub fn frames_for(&self, job: &ExtractionJob) -> Result<Vec<Frame>, BifError> {
        let control = self.options.job_control();
        let default_extractor;
        let extractor: &dyn FrameExtractor = match &self.extractor {
            Some(extractor) => extractor.as_ref(),
            None => {
                default_extractor = FfmpegFrameExtractor::from_options(&self.options);
                &default_extractor
            }
        };
        FrameSource::for_mode(&self.options, extractor).acquire(job, &self.options, &control)
    }

    /// Run the pipeline and write the BIF to `sink`.
    ///
    /// Nothing is written unless extraction succeeded. Returns the number of
    /// bytes written.
    ///
    /// # Errors
    ///
    /// Same as [`frames`](BifGenerator::frames), plus
    /// [`BifError::IoError`] for a failing sink.
    pub fn write_to<W: Write>(&self, sink: W) -> Result<u64, BifError> {
        let header = self.header()?;
        let frames = self.frames()?;
        bif::encode(&frames, sink, header)
    }

    /// Run the pipeline and write the BIF to the file at `output`.
    ///
    /// The file is created only after extraction succeeded, so a run that
    /// fails with [`BifError::NoFramesExtracted`] leaves no file behind. A
    /// write failure leaves a truncated file.
    ///
    /// # Errors
    ///
    /// Same as [`write_to`](BifGenerator::write_to).
    pub fn save<P: AsRef<Path>>(&self, output: P) -> Result<u64, BifError> {
        let header = self.header()?;
        let frames = self.frames()?;
        bif::write_bif_file(output, &frames, header)
    }
}
