//! Frame extraction scheduling.
//!
//! [`ExtractionScheduler`] calls a [`FrameExtractor`] once for every frame
//! of an [`ExtractionJob`] and collects the results in index order.
//!
//! With one worker the frames are extracted one after another on the calling
//! thread. With more, a fixed pool of OS threads pulls frame indices from a
//! shared queue and sends results back over a channel; the calling thread is
//! the only one that touches the ordered frame list. Either way a failed
//! frame is logged and left absent, and the job only fails if no frame at
//! all could be extracted.
//!
//! Progress is reported after every attempt. Sequential runs report in index
//! order; parallel runs report in completion order, so only the count is
//! monotonic there.

use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::configuration::ExtractOptions;
use crate::error::BifError;
use crate::extractor::FrameExtractor;
use crate::frame::{Frame, frame_timestamp};
use crate::job::ExtractionJob;
use crate::progress::{JobControl, OperationType, ProgressTracker};

/// Result of one extraction attempt, sent from a worker to the aggregator.
struct FrameOutcome {
    index: usize,
    worker: usize,
    result: Result<Vec<u8>, BifError>,
}

/// Drives a [`FrameExtractor`] over every frame of a job.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
///
/// use bifgen::{
///     ExtractOptions, ExtractionJob, ExtractionScheduler, FfmpegFrameExtractor,
///     ThumbnailProfile,
/// };
///
/// let job = ExtractionJob::new("input.mp4", Duration::from_secs(10), 4, 95.0)?;
/// let extractor = FfmpegFrameExtractor::new(ThumbnailProfile::standard());
/// let frames = ExtractionScheduler::new(&extractor).run(&job, &ExtractOptions::new())?;
/// assert_eq!(frames.len(), 10);
/// # Ok::<(), bifgen::BifError>(())
/// ```
pub struct ExtractionScheduler<'a> {
    extractor: &'a dyn FrameExtractor,
}

impl<'a> ExtractionScheduler<'a> {
    /// Schedule work onto `extractor`.
    pub fn new(extractor: &'a dyn FrameExtractor) -> Self {
        Self { extractor }
    }

    /// Extract every frame of `job`.
    ///
    /// Uses `job.workers()` threads; progress, cancellation, timeout and
    /// progress batch size come from `options`. The returned vector has
    /// exactly `job.frame_count()` entries, frame `i` at position `i`.
    ///
    /// # Errors
    ///
    /// - [`BifError::NoFramesExtracted`] if every attempt failed.
    /// - [`BifError::Cancelled`] / [`BifError::Timeout`] when the job was
    ///   stopped; frames extracted so far are dropped.
    pub fn run(&self, job: &ExtractionJob, options: &ExtractOptions) -> Result<Vec<Frame>, BifError> {
        self.run_with_control(job, options, &options.job_control())
    }

    /// Like [`run`](ExtractionScheduler::run), with a job clock that was
    /// started by the caller.
    pub fn run_with_control(
        &self,
        job: &ExtractionJob,
        options: &ExtractOptions,
        control: &JobControl,
    ) -> Result<Vec<Frame>, BifError> {
        let total = job.frame_count();
        log::debug!(
            "Extracting {} frames from {} every {:?} with {} worker(s)",
            total,
            job.video().display(),
            job.interval(),
            job.workers()
        );

        let mut tracker = ProgressTracker::new(
            Arc::clone(&options.progress),
            OperationType::FrameExtraction,
            Some(total as u64),
            options.batch_size,
        );

        let mut frames: Vec<Frame> = (0..total).map(Frame::absent).collect();
        if job.workers() <= 1 {
            self.run_sequential(job, control, &mut frames, &mut tracker)?;
        } else {
            self.run_parallel(job, control, &mut frames, &mut tracker)?;
        }
        tracker.finish();

        let succeeded = frames.iter().filter(|frame| frame.is_present()).count();
        if succeeded == 0 {
            return Err(BifError::NoFramesExtracted { total });
        }
        log::info!("Extracted {}/{} frames", succeeded, total);
        Ok(frames)
    }

    fn run_sequential(
        &self,
        job: &ExtractionJob,
        control: &JobControl,
        frames: &mut [Frame],
        tracker: &mut ProgressTracker,
    ) -> Result<(), BifError> {
        for index in 0..job.frame_count() {
            control.check()?;
            let timestamp = job.timestamp(index);
            let result = self.extractor.extract(job.video(), timestamp, control);
            record(frames, index, timestamp, result, None)?;
            tracker.advance(Some(index as u64), Some(timestamp));
        }
        Ok(())
    }

    fn run_parallel(
        &self,
        job: &ExtractionJob,
        control: &JobControl,
        frames: &mut [Frame],
        tracker: &mut ProgressTracker,
    ) -> Result<(), BifError> {
        let total = job.frame_count();
        let worker_count = job.workers().min(total);

        let (work_sender, work_receiver) = crossbeam_channel::bounded::<usize>(total);
        for index in 0..total {
            // The queue holds every index, so this never blocks.
            let _ = work_sender.send(index);
        }
        drop(work_sender);

        let (result_sender, result_receiver) = crossbeam_channel::unbounded::<FrameOutcome>();
        let extractor = self.extractor;
        let video = job.video();
        let interval = job.interval();
        let halted = AtomicBool::new(false);
        let halted = &halted;

        thread::scope(|scope| -> Result<(), BifError> {
            for worker in 0..worker_count {
                let work = work_receiver.clone();
                let results = result_sender.clone();
                let spawned = thread::Builder::new()
                    .name(format!("bifgen-worker-{worker}"))
                    .spawn_scoped(scope, move || {
                        let context = WorkerContext {
                            extractor,
                            video,
                            interval,
                            control,
                            halted,
                        };
                        run_worker(worker, &context, &work, &results);
                    });
                if let Err(error) = spawned {
                    // Workers already running stop at their next index.
                    halted.store(true, Ordering::Release);
                    return Err(error.into());
                }
            }
            // Workers hold the only remaining senders: the channel closes
            // once the last of them exits.
            drop(result_sender);

            let mut fatal: Option<BifError> = None;
            let mut completed = 0_usize;
            for outcome in result_receiver.iter() {
                completed += 1;
                let timestamp = job.timestamp(outcome.index);
                match record(frames, outcome.index, timestamp, outcome.result, Some(outcome.worker)) {
                    Ok(()) => tracker.advance(Some(outcome.index as u64), Some(timestamp)),
                    Err(error) => {
                        fatal.get_or_insert(error);
                    }
                }
            }

            match fatal {
                Some(error) => Err(error),
                // Workers also stop between frames when the job is stopped.
                None if completed < total => {
                    Err(control.check().err().unwrap_or(BifError::Cancelled))
                }
                None => Ok(()),
            }
        })
    }
}

/// What every worker of one parallel run shares.
struct WorkerContext<'a> {
    extractor: &'a dyn FrameExtractor,
    video: &'a Path,
    interval: Duration,
    control: &'a JobControl,
    /// Set by the first worker that hits a job-fatal error.
    halted: &'a AtomicBool,
}

/// Body of one parallel worker: take indices until the queue is empty or the
/// job is stopped.
fn run_worker(
    worker: usize,
    context: &WorkerContext<'_>,
    work: &Receiver<usize>,
    results: &Sender<FrameOutcome>,
) {
    for index in work.iter() {
        if context.halted.load(Ordering::Acquire) || context.control.should_stop() {
            break;
        }
        let timestamp = frame_timestamp(index, context.interval);
        let result = context
            .extractor
            .extract(context.video, timestamp, context.control);
        let fatal = result.as_ref().is_err_and(|error| !error.is_recoverable());
        if fatal {
            context.halted.store(true, Ordering::Release);
        }
        if results.send(FrameOutcome { index, worker, result }).is_err() || fatal {
            break;
        }
    }
}

/// Store one extraction result in the ordered frame list.
///
/// Recoverable failures are logged and leave the slot absent; anything else
/// is returned as a job-fatal error.
fn record(
    frames: &mut [Frame],
    index: usize,
    timestamp: Duration,
    result: Result<Vec<u8>, BifError>,
    worker: Option<usize>,
) -> Result<(), BifError> {
    match result {
        Ok(data) => {
            frames[index] = Frame::new(index, data);
            Ok(())
        }
        Err(error) if error.is_recoverable() => {
            match worker {
                Some(worker) => log::warn!(
                    "[worker {}] Frame {} (t={:.3}s) failed: {}",
                    worker,
                    index,
                    timestamp.as_secs_f64(),
                    error
                ),
                None => log::warn!(
                    "Frame {} (t={:.3}s) failed: {}",
                    index,
                    timestamp.as_secs_f64(),
                    error
                ),
            }
            Ok(())
        }
        Err(error) => Err(error),
    }
}

/// Convenience wrapper: extract every frame of `job` with `extractor`.
///
/// # Errors
///
/// Same as [`ExtractionScheduler::run`].
pub fn extract_frames(
    job: &ExtractionJob,
    extractor: &dyn FrameExtractor,
    options: &ExtractOptions,
) -> Result<Vec<Frame>, BifError> {
    ExtractionScheduler::new(extractor).run(job, options)
}
