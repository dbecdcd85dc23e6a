//! Continuous MJPEG stream demultiplexing.
//!
//! In stream mode a single ffmpeg process writes one JPEG per interval to
//! its stdout, back to back, with nothing between them. [`JpegSplitter`]
//! recovers the individual images from that byte stream using only the JPEG
//! start-of-image (`FF D8`) and end-of-image (`FF D9`) markers.
//! [`StreamDemuxer`] runs the process and feeds its output to a splitter.
//!
//! The splitter keeps its state between calls to [`JpegSplitter::feed`], so
//! the stream can be read in chunks of any size: a marker split across two
//! reads is still recognized.

use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::configuration::{ExtractOptions, ThumbnailProfile};
use crate::error::BifError;
use crate::ffmpeg::{self, FfmpegLogLevel};
use crate::job::validate_interval;
use crate::process::{ProcessExit, SupervisedChild};
use crate::progress::JobControl;

const MARKER_PREFIX: u8 = 0xFF;
const START_OF_IMAGE: u8 = 0xD8;
const END_OF_IMAGE: u8 = 0xD9;
const READ_CHUNK_SIZE: usize = 32 * 1024;

/// Whether the splitter is between images or inside one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitterMode {
    /// Looking for the next `FF D8`.
    Seeking,
    /// Collecting bytes until `FF D9`.
    Capturing,
}

/// Byte-level state machine that splits concatenated JPEGs.
///
/// # Example
///
/// ```
/// use bifgen::JpegSplitter;
///
/// let mut splitter = JpegSplitter::new();
/// let mut frames = Vec::new();
/// splitter.feed(&[0xFF, 0xD8, 0x01], |jpeg| {
///     frames.push(jpeg);
///     Ok::<(), bifgen::BifError>(())
/// })?;
/// splitter.feed(&[0x02, 0xFF, 0xD9], |jpeg| {
///     frames.push(jpeg);
///     Ok::<(), bifgen::BifError>(())
/// })?;
/// assert_eq!(frames, vec![vec![0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9]]);
/// # Ok::<(), bifgen::BifError>(())
/// ```
#[derive(Debug, Clone)]
pub struct JpegSplitter {
    mode: SplitterMode,
    previous_byte: Option<u8>,
    buffer: Vec<u8>,
}

impl JpegSplitter {
    /// A splitter in the [`SplitterMode::Seeking`] state.
    pub fn new() -> Self {
        Self {
            mode: SplitterMode::Seeking,
            previous_byte: None,
            buffer: Vec::new(),
        }
    }

    /// Current state.
    pub fn mode(&self) -> SplitterMode {
        self.mode
    }

    /// Number of bytes of the image currently being captured.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Process one chunk, calling `on_frame` for every image completed in it.
    ///
    /// An error returned by `on_frame` stops processing immediately and is
    /// returned unchanged; the rest of the chunk is not examined.
    pub fn feed<E, F>(&mut self, chunk: &[u8], mut on_frame: F) -> Result<(), E>
    where
        F: FnMut(Vec<u8>) -> Result<(), E>,
    {
        for &byte in chunk {
            let after_prefix = self.previous_byte == Some(MARKER_PREFIX);
            match self.mode {
                SplitterMode::Seeking => {
                    if after_prefix && byte == START_OF_IMAGE {
                        self.mode = SplitterMode::Capturing;
                        self.buffer.clear();
                        self.buffer.extend_from_slice(&[MARKER_PREFIX, START_OF_IMAGE]);
                    }
                }
                SplitterMode::Capturing => {
                    self.buffer.push(byte);
                    if after_prefix && byte == END_OF_IMAGE {
                        self.mode = SplitterMode::Seeking;
                        self.previous_byte = Some(byte);
                        on_frame(std::mem::take(&mut self.buffer))?;
                        continue;
                    }
                }
            }
            self.previous_byte = Some(byte);
        }
        Ok(())
    }

    /// Signal end of stream.
    ///
    /// A partially captured image is discarded; the number of dropped bytes
    /// is returned. The splitter is reset and can be reused.
    pub fn finish(&mut self) -> usize {
        let dropped = match self.mode {
            SplitterMode::Capturing => self.buffer.len(),
            SplitterMode::Seeking => 0,
        };
        *self = Self::new();
        dropped
    }
}

impl Default for JpegSplitter {
    fn default() -> Self {
        Self::new()
    }
}

/// Split everything `reader` yields into JPEGs.
///
/// Reads in 32 KiB chunks until end of stream and returns the number of
/// frames emitted. Trailing partial images are dropped.
///
/// # Errors
///
/// Errors from `on_frame` are returned unchanged; read errors become
/// [`BifError::IoError`].
pub fn split_jpegs<R, F>(mut reader: R, mut on_frame: F) -> Result<usize, BifError>
where
    R: Read,
    F: FnMut(Vec<u8>) -> Result<(), BifError>,
{
    let mut splitter = JpegSplitter::new();
    let mut chunk = vec![0_u8; READ_CHUNK_SIZE];
    let mut emitted = 0_usize;

    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(error) if error.kind() == ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        };
        splitter.feed(&chunk[..read], |jpeg| {
            emitted += 1;
            on_frame(jpeg)
        })?;
    }

    let dropped = splitter.finish();
    if dropped > 0 {
        log::debug!("Discarded {} bytes of an incomplete trailing frame", dropped);
    }
    Ok(emitted)
}

/// Runs one ffmpeg process producing a frame every interval and splits its
/// output into JPEGs.
///
/// This uses a single process for the whole video, at the cost of strictly
/// sequential decoding.
#[derive(Debug, Clone)]
pub struct StreamDemuxer {
    program: PathBuf,
    profile: ThumbnailProfile,
    log_level: FfmpegLogLevel,
}

impl StreamDemuxer {
    /// Demuxer using the `ffmpeg` on `PATH` and the given profile.
    pub fn new(profile: ThumbnailProfile) -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            profile,
            log_level: FfmpegLogLevel::Error,
        }
    }

    /// Demuxer configured from `options` (program, profile, log level).
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

    /// Stream thumbnails of `video`, one every `interval`, into `on_frame`.
    ///
    /// Returns the number of frames emitted.
    ///
    /// # Errors
    ///
    /// - [`BifError::InvalidInterval`] before anything is spawned.
    /// - Any error returned by `on_frame`; the process is killed.
    /// - [`BifError::Cancelled`] / [`BifError::Timeout`] when `control` fires.
    /// - [`BifError::Demux`] if ffmpeg cannot be started or exits non-zero.
    pub fn demux<F>(
        &self,
        video: &Path,
        interval: Duration,
        control: &JobControl,
        on_frame: F,
    ) -> Result<usize, BifError>
    where
        F: FnMut(Vec<u8>) -> Result<(), BifError>,
    {
        validate_interval(interval)?;

        let mut command = ffmpeg::stream_command(
            self.program.as_os_str(),
            video,
            interval,
            &self.profile,
            self.log_level,
        );
        let mut child = match SupervisedChild::spawn(&mut command, control) {
            Ok(child) => child,
            Err(BifError::IoError(error)) => {
                return Err(BifError::Demux(format!("could not start ffmpeg: {error}")));
            }
            Err(error) => return Err(error),
        };

        let split = split_jpegs(child.stdout(), on_frame);
        if split.is_err() {
            child.abort();
        }
        let exit = child.wait();

        // A killed process makes the reader see EOF, so the job-control
        // error from the watcher explains the stop better than `split`.
        let exit = match (split, exit) {
            (_, Err(error)) => return Err(error),
            (Err(error), Ok(_)) => return Err(error),
            (Ok(emitted), Ok(exit)) => (emitted, exit),
        };

        match exit {
            (emitted, ProcessExit::Finished(status)) if status.success() => {
                log::debug!("Stream demux finished with {} frames", emitted);
                Ok(emitted)
            }
            (_, ProcessExit::Finished(status)) => {
                Err(BifError::Demux(format!("ffmpeg exited with {status}")))
            }
            (_, ProcessExit::Aborted) => Err(BifError::Demux("ffmpeg was stopped".to_string())),
        }
    }
}
