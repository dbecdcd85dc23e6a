//! Single-frame extraction.
//!
//! [`FfmpegFrameExtractor`] starts one ffmpeg process per requested
//! timestamp. Each call is independent, so any number of them can run at the
//! same time; the [`ExtractionScheduler`](crate::ExtractionScheduler) decides
//! how many do.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::configuration::{ExtractOptions, ThumbnailProfile};
use crate::error::BifError;
use crate::ffmpeg::{self, FfmpegLogLevel};
use crate::process::{ProcessExit, SupervisedChild};
use crate::progress::JobControl;

/// Acquires the JPEG thumbnail of a video at one timestamp.
///
/// Implementations are shared between worker threads and must be
/// [`Send`] + [`Sync`].
pub trait FrameExtractor: Send + Sync {
    /// Return the JPEG bytes of `video` at `timestamp`.
    ///
    /// # Errors
    ///
    /// [`BifError::Extraction`] for a failure limited to this frame.
    /// [`BifError::Cancelled`] or [`BifError::Timeout`] when `control` fired;
    /// those abort the whole job.
    fn extract(
        &self,
        video: &Path,
        timestamp: Duration,
        control: &JobControl,
    ) -> Result<Vec<u8>, BifError>;
}

/// Frame extractor that runs `ffmpeg -ss <t> -i <video> -frames:v 1 ...`.
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    program: PathBuf,
    profile: ThumbnailProfile,
    log_level: FfmpegLogLevel,
}

impl FfmpegFrameExtractor {
    /// Extractor using the `ffmpeg` on `PATH` and the given profile.
    pub fn new(profile: ThumbnailProfile) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            profile,
            log_level: FfmpegLogLevel::Error,
        }
    }

    /// Extractor configured from `options` (program, profile, log level).
    pub fn from_options(options: &ExtractOptions) -> Self {
        Self {
            program: options.ffmpeg_path.clone(),
            profile: options.profile.clone(),
            log_level: options.ffmpeg_log_level,
        }
    }

    /// Use a specific `ffmpeg` executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// The thumbnail profile frames are scaled to.
    pub fn profile(&self) -> &ThumbnailProfile {
        &self.profile
    }
}

impl FrameExtractor for FfmpegFrameExtractor {
    fn extract(
        &self,
        video: &Path,
        timestamp: Duration,
        control: &JobControl,
    ) -> Result<Vec<u8>, BifError> {
        let failed = |reason: String| BifError::Extraction { timestamp, reason };

        let mut command = ffmpeg::single_frame_command(
            self.program.as_os_str(),
            video,
            timestamp,
            &self.profile,
            self.log_level,
        );
        let mut child = match SupervisedChild::spawn(&mut command, control) {
            Ok(child) => child,
            Err(BifError::IoError(error)) => {
                return Err(failed(format!("could not start ffmpeg: {error}")));
            }
            Err(error) => return Err(error),
        };

        let read = child.read_to_end();
        if read.is_err() {
            child.abort();
        }
        let exit = child.wait()?;

        let data = read.map_err(|error| failed(format!("could not read ffmpeg output: {error}")))?;
        match exit {
            ProcessExit::Finished(status) if !status.success() => {
                Err(failed(format!("ffmpeg exited with {status}")))
            }
            ProcessExit::Aborted => Err(failed("ffmpeg was stopped".to_string())),
            ProcessExit::Finished(_) if data.is_empty() => {
                Err(failed("ffmpeg produced no data".to_string()))
            }
            ProcessExit::Finished(_) => Ok(data),
        }
    }
}
