//! # bifgen
//!
//! Generate BIF (Browse Index File) scrub-bar thumbnail indexes from video
//! files.
//!
//! A BIF holds evenly spaced JPEG thumbnails of a video plus an offset index,
//! so that a player can show a preview for any position of the scrub bar
//! without decoding the video. `bifgen` delegates decoding, scaling and JPEG
//! encoding to the `ffmpeg` and `ffprobe` command-line tools and takes care
//! of the rest: sizing the job, running ffmpeg in parallel or as a single
//! stream, tolerating individual frame failures, and writing the binary
//! format.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use bifgen::{BifGenerator, ExtractOptions};
//!
//! BifGenerator::new("input.mp4", Duration::from_secs(10))
//!     .with_options(ExtractOptions::new().with_workers(4))
//!     .save("input.bif")
//!     .unwrap();
//! ```
//!
//! ### Encode Frames You Already Have
//!
//! ```
//! use std::time::Duration;
//!
//! use bifgen::{BifHeader, Frame, encode};
//!
//! let frames = vec![
//!     Frame::new(0, vec![0xFF, 0xD8, 0xFF, 0xD9]),
//!     Frame::absent(1),
//! ];
//! let mut bif = Vec::new();
//! encode(&frames, &mut bif, BifHeader::new(Duration::from_secs(10), 320, 180).unwrap()).unwrap();
//! assert_eq!(&bif[..3], b"BIF");
//! ```
//!
//! ## Features
//!
//! - **Two acquisition strategies**: one ffmpeg process per thumbnail,
//!   run by a bounded worker pool, or a single ffmpeg process whose MJPEG
//!   output is split on JPEG markers
//! - **Failure tolerance**: a thumbnail that fails is left empty in the
//!   index; the run only fails if every thumbnail failed
//! - **Deterministic output**: frames are always written in time order,
//!   whatever order the workers finish in
//! - **Progress & cancellation**: callbacks, `CancellationToken`, and a
//!   job-wide timeout that kills running ffmpeg processes
//! - **Thumbnail profiles**: 320×180 or 240×160 presets, or any size,
//!   quality and scaler flags
//!
//! ## Requirements
//!
//! `ffmpeg` and `ffprobe` must be installed, either on `PATH` or at paths
//! given through [`ExtractOptions`].

pub mod bif;
pub mod configuration;
pub mod demux;
pub mod error;
pub mod extractor;
pub mod ffmpeg;
pub mod frame;
pub mod generator;
pub mod job;
pub mod probe;
mod process;
pub mod progress;
pub mod scheduler;
pub mod source;

pub use bif::{BIF_HEADER_SIZE, BIF_MAGIC, BIF_VERSION, BifHeader, compute_offsets, encode, write_bif_file};
pub use configuration::{ExtractOptions, ExtractionMode, ThumbnailProfile};
pub use demux::{JpegSplitter, SplitterMode, StreamDemuxer, split_jpegs};
pub use error::BifError;
pub use extractor::{FfmpegFrameExtractor, FrameExtractor};
pub use ffmpeg::FfmpegLogLevel;
pub use frame::{Frame, frame_timestamp};
pub use generator::BifGenerator;
pub use job::{ExtractionJob, frame_count};
pub use probe::{DurationProbe, FfprobeDuration, parse_duration};
pub use progress::{CancellationToken, JobControl, OperationType, ProgressCallback, ProgressInfo};
pub use scheduler::{ExtractionScheduler, extract_frames};
pub use source::FrameSource;
