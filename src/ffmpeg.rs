//! ffmpeg / ffprobe command lines.
//!
//! All decoding, scaling and JPEG encoding is delegated to the ffmpeg
//! command-line tools. This module is the only place that knows their
//! argument syntax: [`FfmpegLogLevel`] maps to the `-loglevel` argument and
//! the `*_command` helpers build the three invocations the pipeline needs
//! (duration probe, single frame, continuous stream).
//!
//! # Example
//!
//! ```no_run
//! use bifgen::{ExtractOptions, FfmpegLogLevel};
//!
//! // Let ffmpeg print warnings as well as errors.
//! let options = ExtractOptions::new().with_ffmpeg_log_level(FfmpegLogLevel::Warning);
//! ```
//!
//! # Note
//!
//! This controls **ffmpeg's own console output**, which the pipeline
//! discards. Rust-side diagnostics go through the
//! [`log`](https://crates.io/crates/log) crate.

use std::ffi::OsStr;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use crate::configuration::ThumbnailProfile;

/// ffmpeg log verbosity level.
///
/// Maps directly to the values accepted by ffmpeg's `-loglevel` option.
/// Setting a level causes ffmpeg to suppress all messages below that
/// severity.
///
/// # Ordering (most verbose → most quiet)
///
/// `Trace` > `Debug` > `Verbose` > `Info` > `Warning` > `Error` > `Fatal` > `Panic` > `Quiet`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FfmpegLogLevel {
    /// Print no output at all.
    Quiet,
    /// Only log when the process is about to abort.
    Panic,
    /// Only log unrecoverable errors.
    Fatal,
    /// Log recoverable errors. This is the default.
    #[default]
    Error,
    /// Log warnings.
    Warning,
    /// Log informational messages (ffmpeg's own default).
    Info,
    /// Log verbose informational messages.
    Verbose,
    /// Log debugging messages.
    Debug,
    /// Extremely verbose tracing output.
    Trace,
}

impl FfmpegLogLevel {
    /// The argument value for `-loglevel`.
    pub fn as_arg(self) -> &'static str {
        match self {
            FfmpegLogLevel::Quiet => "quiet",
            FfmpegLogLevel::Panic => "panic",
            FfmpegLogLevel::Fatal => "fatal",
            FfmpegLogLevel::Error => "error",
            FfmpegLogLevel::Warning => "warning",
            FfmpegLogLevel::Info => "info",
            FfmpegLogLevel::Verbose => "verbose",
            FfmpegLogLevel::Debug => "debug",
            FfmpegLogLevel::Trace => "trace",
        }
    }

    /// Parse a level name as accepted by `-loglevel` (plus `warn`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "quiet" => Some(FfmpegLogLevel::Quiet),
            "panic" => Some(FfmpegLogLevel::Panic),
            "fatal" => Some(FfmpegLogLevel::Fatal),
            "error" => Some(FfmpegLogLevel::Error),
            "warning" | "warn" => Some(FfmpegLogLevel::Warning),
            "info" => Some(FfmpegLogLevel::Info),
            "verbose" => Some(FfmpegLogLevel::Verbose),
            "debug" => Some(FfmpegLogLevel::Debug),
            "trace" => Some(FfmpegLogLevel::Trace),
            _ => None,
        }
    }
}

impl Display for FfmpegLogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_arg())
    }
}

/// `ffprobe` invocation printing only the container duration in seconds.
pub(crate) fn probe_command(ffprobe: &OsStr, video: &Path) -> Command {
    let mut command = Command::new(ffprobe);
    command
        .args(["-v", "error"])
        .args(["-show_entries", "format=duration"])
        .args(["-of", "default=noprint_wrappers=1:nokey=1"])
        .arg(video)
        .stdin(Stdio::null());
    command
}

/// `ffmpeg` invocation that seeks to `timestamp` and writes one scaled JPEG
/// to stdout.
pub(crate) fn single_frame_command(
    ffmpeg: &OsStr,
    video: &Path,
    timestamp: Duration,
    profile: &ThumbnailProfile,
    log_level: FfmpegLogLevel,
) -> Command {
    let mut command = base_command(ffmpeg, log_level);
    command
        .arg("-ss")
        .arg(format!("{:.3}", timestamp.as_secs_f64()))
        .arg("-i")
        .arg(video)
        .args(["-frames:v", "1"])
        .arg("-vf")
        .arg(scale_filter(profile));
    mjpeg_output(&mut command, profile);
    command
}

/// `ffmpeg` invocation that writes one scaled JPEG every `interval` to
/// stdout, back to back.
pub(crate) fn stream_command(
    ffmpeg: &OsStr,
    video: &Path,
    interval: Duration,
    profile: &ThumbnailProfile,
    log_level: FfmpegLogLevel,
) -> Command {
    let mut command = base_command(ffmpeg, log_level);
    command
        .arg("-i")
        .arg(video)
        .arg("-vf")
        .arg(format!(
            "fps=1000/{},{}",
            interval.as_millis(),
            scale_filter(profile)
        ));
    mjpeg_output(&mut command, profile);
    command
}

/// The `scale` filter for a profile, e.g. `scale=320:180` or
/// `scale=240:160:flags=bicubic`.
pub(crate) fn scale_filter(profile: &ThumbnailProfile) -> String {
    match &profile.scale_flags {
        Some(flags) if !flags.is_empty() => {
            format!("scale={}:{}:{}", profile.width, profile.height, flags)
        }
        _ => format!("scale={}:{}", profile.width, profile.height),
    }
}

fn base_command(ffmpeg: &OsStr, log_level: FfmpegLogLevel) -> Command {
    let mut command = Command::new(ffmpeg);
    command
        .arg("-hide_banner")
        .args(["-loglevel", log_level.as_arg()])
        .stdin(Stdio::null());
    command
}

fn mjpeg_output(command: &mut Command, profile: &ThumbnailProfile) {
    command
        .arg("-qscale:v")
        .arg(profile.quality.to_string())
        .args(["-f", "image2pipe"])
        .args(["-vcodec", "mjpeg"])
        .arg("pipe:1");
}
