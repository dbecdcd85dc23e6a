//! Error types for the `bifgen` crate.
//!
//! This module defines [`BifError`], the unified error type returned by all
//! fallible operations in the crate. Errors carry enough context to diagnose
//! a failed run from the message alone: the video path for probe failures,
//! the timestamp for single-frame failures, and the exit status for failed
//! ffmpeg processes.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use thiserror::Error;

/// The unified error type for all `bifgen` operations.
///
/// Only [`BifError::Extraction`] is recoverable: the scheduler records the
/// affected frame as absent and moves on. Every other variant aborts the job.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BifError {
    /// The duration of the video could not be determined.
    #[error("Failed to probe duration of {path}: {reason}")]
    Probe {
        /// Video that was probed.
        path: PathBuf,
        /// Why the probe failed (tool stderr or parse error).
        reason: String,
    },

    /// A single thumbnail frame could not be extracted.
    #[error("Failed to extract frame at {:.3}s: {reason}", .timestamp.as_secs_f64())]
    Extraction {
        /// Position in the video that was requested.
        timestamp: Duration,
        /// Underlying reason the extraction failed.
        reason: String,
    },

    /// The continuous-stream ffmpeg process failed.
    #[error("Stream demux failed: {0}")]
    Demux(String),

    /// Not a single frame of the job could be extracted.
    #[error("No frames were successfully extracted (0/{total})")]
    NoFramesExtracted {
        /// Number of frames the job attempted.
        total: usize,
    },

    /// A job or encoder was asked to handle zero frames.
    #[error("No frames to process")]
    EmptyInput,

    /// The thumbnail interval is zero or shorter than one millisecond.
    #[error("Interval must be at least one millisecond")]
    InvalidInterval,

    /// The frame count does not fit the 32-bit BIF header field.
    #[error("Too many frames for a BIF file: {0}")]
    TooManyFrames(usize),

    /// The job was cancelled via a [`CancellationToken`](crate::CancellationToken).
    #[error("Operation cancelled")]
    Cancelled,

    /// The job deadline expired before extraction finished.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// An I/O error occurred while writing the BIF or talking to a process.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),
}

impl BifError {
    /// Returns `true` if the scheduler may record this failure as an absent
    /// frame and continue with the rest of the job.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BifError::Extraction { .. })
    }
}
