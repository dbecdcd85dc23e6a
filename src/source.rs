//! Frame sources.
//!
//! A [`FrameSource`] turns an [`ExtractionJob`] into an ordered list of
//! [`Frame`]s. Both variants produce encoder-ready output; they differ in how
//! many ffmpeg processes they start and in how precisely progress can be
//! reported.

use std::sync::Arc;

use crate::configuration::{ExtractOptions, ExtractionMode};
use crate::demux::StreamDemuxer;
use crate::error::BifError;
use crate::extractor::FrameExtractor;
use crate::frame::Frame;
use crate::job::ExtractionJob;
use crate::progress::{JobControl, OperationType, ProgressTracker};
use crate::scheduler::ExtractionScheduler;

/// The two ways of acquiring thumbnails.
pub enum FrameSource<'a> {
    /// One extractor call per timestamp, scheduled over `job.workers()`
    /// threads.
    PerFrame(&'a dyn FrameExtractor),
    /// One ffmpeg process for the whole video.
    Stream(StreamDemuxer),
}

impl<'a> FrameSource<'a> {
    /// Pick the source matching `options.mode()`.
    pub fn for_mode(options: &ExtractOptions, extractor: &'a dyn FrameExtractor) -> Self {
        match options.mode() {
            ExtractionMode::PerFrame => FrameSource::PerFrame(extractor),
            ExtractionMode::Stream => FrameSource::Stream(StreamDemuxer::from_options(options)),
        }
    }

    /// Acquire every frame of `job`.
    ///
    /// # Errors
    ///
    /// [`BifError::NoFramesExtracted`] when nothing could be acquired, plus
    /// the job-fatal errors of the selected strategy.
    pub fn acquire(
        &self,
        job: &ExtractionJob,
        options: &ExtractOptions,
        control: &JobControl,
    ) -> Result<Vec<Frame>, BifError> {
        match self {
            FrameSource::PerFrame(extractor) => {
                ExtractionScheduler::new(*extractor).run_with_control(job, options, control)
            }
            FrameSource::Stream(demuxer) => acquire_stream(demuxer, job, options, control),
        }
    }
}

/// Collect the demuxer's output. Frame `i` is the `i`-th image of the
/// stream; the count may differ from the probed estimate by a frame.
fn acquire_stream(
    demuxer: &StreamDemuxer,
    job: &ExtractionJob,
    options: &ExtractOptions,
    control: &JobControl,
) -> Result<Vec<Frame>, BifError> {
    let mut tracker = ProgressTracker::new(
        Arc::clone(&options.progress),
        OperationType::StreamDemux,
        Some(job.frame_count() as u64),
        options.batch_size,
    );

    let mut frames = Vec::with_capacity(job.frame_count());
    demuxer.demux(job.video(), job.interval(), control, |jpeg| {
        let index = frames.len();
        frames.push(Frame::new(index, jpeg));
        tracker.advance(Some(index as u64), Some(job.timestamp(index)));
        Ok(())
    })?;
    tracker.finish();

    if frames.is_empty() {
        return Err(BifError::NoFramesExtracted {
            total: job.frame_count(),
        });
    }
    log::info!(
        "Extracted {} frames from stream (expected {})",
        frames.len(),
        job.frame_count()
    );
    Ok(frames)
}
