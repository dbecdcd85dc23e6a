//! Video duration probing.
//!
//! The number of thumbnails a BIF needs is derived from the playable
//! duration of the video, which is queried once per job with `ffprobe`.
//! [`DurationProbe`] is the seam for that query; [`FfprobeDuration`] is the
//! implementation used by default.

use std::path::{Path, PathBuf};

use crate::error::BifError;
use crate::ffmpeg;

/// Something that can tell how long a video plays, in seconds.
pub trait DurationProbe: Send + Sync {
    /// Return the duration of `video` in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`BifError::Probe`] if the duration cannot be determined.
    fn probe(&self, video: &Path) -> Result<f64, BifError>;
}

/// Duration probe backed by the `ffprobe` executable.
///
/// This is a single blocking call with no timeout of its own.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
///
/// use bifgen::{DurationProbe, FfprobeDuration};
///
/// let seconds = FfprobeDuration::new().probe(Path::new("input.mp4"))?;
/// println!("{seconds:.1}s");
/// # Ok::<(), bifgen::BifError>(())
/// ```
#[derive(Debug, Clone)]
pub struct FfprobeDuration {
    program: PathBuf,
}

impl FfprobeDuration {
    /// Probe with the `ffprobe` found on `PATH`.
    pub fn new() -> Self {
        Self::with_program("ffprobe")
    }

    /// Probe with a specific `ffprobe` executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfprobeDuration {
    fn default() -> Self {
        Self::new()
    }
}

impl DurationProbe for FfprobeDuration {
    fn probe(&self, video: &Path) -> Result<f64, BifError> {
        let probe_error = |reason: String| BifError::Probe {
            path: video.to_path_buf(),
            reason,
        };

        let mut command = ffmpeg::probe_command(self.program.as_os_str(), video);
        log::debug!("Probing duration: {}", crate::process::describe(&command));
        let output = command
            .output()
            .map_err(|error| probe_error(format!("could not run ffprobe: {error}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(probe_error(format!(
                "ffprobe exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_duration(&String::from_utf8_lossy(&output.stdout)).map_err(probe_error)
    }
}

/// Parse the duration printed by `ffprobe`.
///
/// Surrounding whitespace is ignored. Anything that is not a finite,
/// non-negative number (including ffprobe's `N/A`) is rejected with a
/// human-readable reason.
///
/// # Example
///
/// ```
/// assert_eq!(bifgen::parse_duration("95.040000\n"), Ok(95.04));
/// assert!(bifgen::parse_duration("N/A").is_err());
/// ```
pub fn parse_duration(text: &str) -> Result<f64, String> {
    let trimmed = text.trim();
    let seconds: f64 = trimmed
        .parse()
        .map_err(|error| format!("unparseable duration {trimmed:?}: {error}"))?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(format!("invalid duration {trimmed:?}"));
    }
    Ok(seconds)
}
