//! Extraction scheduler tests with an in-process extractor.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bifgen::{
    BifError, CancellationToken, ExtractOptions, ExtractionJob, ExtractionScheduler, Frame,
    FrameExtractor, JobControl, OperationType, ProgressCallback, ProgressInfo, extract_frames,
};

const INTERVAL: Duration = Duration::from_secs(10);

/// Produces a tiny JPEG-shaped payload naming the frame index, failing at
/// the listed indices. Later frames finish first so that parallel runs
/// complete out of order.
struct StubExtractor {
    failing: HashSet<usize>,
    frame_count: usize,
    delay: Duration,
    calls: Mutex<Vec<usize>>,
}

impl StubExtractor {
    fn new(frame_count: usize) -> Self {
        Self {
            failing: HashSet::new(),
            frame_count,
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn failing_at(mut self, indices: &[usize]) -> Self {
        self.failing = indices.iter().copied().collect();
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn payload(index: usize) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&(index as u32).to_le_bytes());
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }
}

impl FrameExtractor for StubExtractor {
    fn extract(
        &self,
        _video: &Path,
        timestamp: Duration,
        control: &JobControl,
    ) -> Result<Vec<u8>, BifError> {
        control.check()?;
        let index = (timestamp.as_millis() / INTERVAL.as_millis()) as usize;
        self.calls.lock().unwrap().push(index);

        if !self.delay.is_zero() {
            let remaining = (self.frame_count - index) as u32;
            thread::sleep(self.delay * remaining);
        }

        if self.failing.contains(&index) {
            return Err(BifError::Extraction {
                timestamp,
                reason: "stub failure".to_string(),
            });
        }
        Ok(Self::payload(index))
    }
}

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl RecordingProgress {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            infos: Mutex::new(Vec::new()),
        })
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

fn job(frame_count: usize, workers: usize) -> ExtractionJob {
    ExtractionJob::with_frame_count("stub.mp4", INTERVAL, workers, frame_count).unwrap()
}

fn payloads(frames: &[Frame]) -> Vec<Option<Vec<u8>>> {
    frames.iter().map(|frame| frame.data.clone()).collect()
}

// ── Sequential ─────────────────────────────────────────────────────

#[test]
fn sequential_extracts_in_order() {
    let extractor = StubExtractor::new(5);
    let frames = ExtractionScheduler::new(&extractor)
        .run(&job(5, 1), &ExtractOptions::new())
        .unwrap();

    assert_eq!(frames.len(), 5);
    for (i, frame) in frames.iter().enumerate() {
        assert_eq!(frame.index, i);
        assert_eq!(frame.data, Some(StubExtractor::payload(i)));
    }
    assert_eq!(*extractor.calls.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[test]
fn failed_frame_left_absent() {
    let extractor = StubExtractor::new(5).failing_at(&[2]);
    let frames = extract_frames(&job(5, 1), &extractor, &ExtractOptions::new()).unwrap();

    assert_eq!(frames.len(), 5);
    assert!(!frames[2].is_present());
    assert_eq!(frames[2].index, 2);
    assert_eq!(frames.iter().filter(|frame| frame.is_present()).count(), 4);
}

#[test]
fn failed_frame_not_retried() {
    let extractor = StubExtractor::new(4).failing_at(&[1]);
    extract_frames(&job(4, 2), &extractor, &ExtractOptions::new()).unwrap();

    let calls = extractor.calls.lock().unwrap();
    assert_eq!(calls.iter().filter(|&&index| index == 1).count(), 1);
    assert_eq!(calls.len(), 4);
}

#[test]
fn all_failed_is_error() {
    let extractor = StubExtractor::new(3).failing_at(&[0, 1, 2]);
    let result = extract_frames(&job(3, 1), &extractor, &ExtractOptions::new());

    match result {
        Err(BifError::NoFramesExtracted { total }) => assert_eq!(total, 3),
        other => panic!("Expected NoFramesExtracted, got: {other:?}"),
    }
}

#[test]
fn all_failed_is_error_parallel() {
    let extractor = StubExtractor::new(6).failing_at(&[0, 1, 2, 3, 4, 5]);
    let result = extract_frames(&job(6, 3), &extractor, &ExtractOptions::new());
    assert!(matches!(result, Err(BifError::NoFramesExtracted { total: 6 })));
}

// ── Parallel ───────────────────────────────────────────────────────

#[test]
fn parallel_matches_sequential() {
    let sequential = StubExtractor::new(12).failing_at(&[3, 7]);
    let expected = extract_frames(&job(12, 1), &sequential, &ExtractOptions::new()).unwrap();

    for workers in [2, 4, 12, 32] {
        let parallel = StubExtractor::new(12)
            .failing_at(&[3, 7])
            .with_delay(Duration::from_millis(1));
        let frames = extract_frames(&job(12, workers), &parallel, &ExtractOptions::new()).unwrap();

        assert_eq!(payloads(&frames), payloads(&expected), "workers {workers}");
        assert!(frames.iter().enumerate().all(|(i, frame)| frame.index == i));
    }
}

#[test]
fn parallel_attempts_every_frame_once() {
    let extractor = StubExtractor::new(20).with_delay(Duration::from_micros(200));
    extract_frames(&job(20, 4), &extractor, &ExtractOptions::new()).unwrap();

    let mut calls = extractor.calls.lock().unwrap().clone();
    calls.sort_unstable();
    assert_eq!(calls, (0..20).collect::<Vec<_>>());
}

#[test]
fn more_workers_than_frames() {
    let extractor = StubExtractor::new(2);
    let frames = extract_frames(&job(2, 16), &extractor, &ExtractOptions::new()).unwrap();
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(Frame::is_present));
}

// ── Progress ───────────────────────────────────────────────────────

#[test]
fn progress_reports_every_attempt() {
    let progress = RecordingProgress::new();
    let options = ExtractOptions::new().with_progress(progress.clone());
    let extractor = StubExtractor::new(5).failing_at(&[1]);

    extract_frames(&job(5, 1), &extractor, &options).unwrap();

    let infos = progress.infos.lock().unwrap();
    let counts: Vec<u64> = infos.iter().map(|info| info.current).collect();
    assert_eq!(counts, vec![1, 2, 3, 4, 5]);
    let frames: Vec<Option<u64>> = infos.iter().map(|info| info.current_frame).collect();
    assert_eq!(frames, vec![Some(0), Some(1), Some(2), Some(3), Some(4)]);

    let last = infos.last().unwrap();
    assert_eq!(last.operation, OperationType::FrameExtraction);
    assert_eq!(last.total, Some(5));
    assert_eq!(last.percentage, Some(100.0));
    assert_eq!(last.current_timestamp, Some(Duration::from_secs(40)));
}

#[test]
fn progress_monotonic_in_parallel() {
    let progress = RecordingProgress::new();
    let options = ExtractOptions::new().with_progress(progress.clone());
    let extractor = StubExtractor::new(10).with_delay(Duration::from_millis(1));

    extract_frames(&job(10, 4), &extractor, &options).unwrap();

    let infos = progress.infos.lock().unwrap();
    assert_eq!(infos.len(), 10);
    assert!(infos.windows(2).all(|pair| pair[0].current < pair[1].current));
    assert_eq!(infos.last().unwrap().current, 10);
}

#[test]
fn progress_batch_size() {
    let progress = RecordingProgress::new();
    let options = ExtractOptions::new()
        .with_progress(progress.clone())
        .with_batch_size(4);
    let extractor = StubExtractor::new(10);

    extract_frames(&job(10, 1), &extractor, &options).unwrap();

    let infos = progress.infos.lock().unwrap();
    let counts: Vec<u64> = infos.iter().map(|info| info.current).collect();
    // Two full batches, then the trailing report.
    assert_eq!(counts, vec![4, 8, 10]);
}

// ── Cancellation & timeout ─────────────────────────────────────────

#[test]
fn cancelled_before_start() {
    let token = CancellationToken::new();
    token.cancel();
    let options = ExtractOptions::new().with_cancellation(token);
    let extractor = StubExtractor::new(5);

    let result = extract_frames(&job(5, 1), &extractor, &options);
    assert!(matches!(result, Err(BifError::Cancelled)));
    assert!(extractor.calls.lock().unwrap().is_empty());
}

#[test]
fn cancelled_parallel_run_fails() {
    let token = CancellationToken::new();
    token.cancel();
    let options = ExtractOptions::new().with_cancellation(token);
    let extractor = StubExtractor::new(8);

    let result = extract_frames(&job(8, 4), &extractor, &options);
    assert!(matches!(result, Err(BifError::Cancelled)));
}

/// Cancels its token once `after` frames have been reported.
struct CancelAfter {
    token: CancellationToken,
    after: u64,
}

impl ProgressCallback for CancelAfter {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.current >= self.after {
            self.token.cancel();
        }
    }
}

#[test]
fn cancelled_mid_run_discards_partial_result() {
    let token = CancellationToken::new();
    let options = ExtractOptions::new()
        .with_cancellation(token.clone())
        .with_progress(Arc::new(CancelAfter { token, after: 2 }));
    let extractor = StubExtractor::new(6);

    let result = extract_frames(&job(6, 1), &extractor, &options);

    assert!(matches!(result, Err(BifError::Cancelled)));
    assert_eq!(extractor.calls.lock().unwrap().len(), 2);
}

#[test]
fn timeout_stops_slow_job() {
    let options = ExtractOptions::new().with_timeout(Duration::from_millis(30));
    let extractor = StubExtractor::new(40).with_delay(Duration::from_millis(1));

    let result = extract_frames(&job(40, 2), &extractor, &options);
    match result {
        Err(BifError::Timeout(limit)) => assert_eq!(limit, Duration::from_millis(30)),
        other => panic!("Expected Timeout, got: {other:?}"),
    }
}
