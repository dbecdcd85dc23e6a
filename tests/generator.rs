//! End-to-end pipeline tests with in-process probe and extractor.

use std::path::Path;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use bifgen::{
    BifError, BifGenerator, DurationProbe, ExtractOptions, FrameExtractor, JobControl,
    ThumbnailProfile,
};

struct FixedDuration(f64);

impl DurationProbe for FixedDuration {
    fn probe(&self, _video: &Path) -> Result<f64, BifError> {
        Ok(self.0)
    }
}

struct CountingProbe {
    calls: AtomicUsize,
}

impl DurationProbe for CountingProbe {
    fn probe(&self, video: &Path) -> Result<f64, BifError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BifError::Probe {
            path: video.to_path_buf(),
            reason: "unreadable".to_string(),
        })
    }
}

/// Fails at every timestamp listed in whole seconds.
struct SecondsExtractor {
    failing_seconds: Vec<u64>,
}

impl FrameExtractor for SecondsExtractor {
    fn extract(
        &self,
        _video: &Path,
        timestamp: Duration,
        _control: &JobControl,
    ) -> Result<Vec<u8>, BifError> {
        if self.failing_seconds.contains(&timestamp.as_secs()) {
            return Err(BifError::Extraction {
                timestamp,
                reason: "decode error".to_string(),
            });
        }
        Ok(vec![0xFF, 0xD8, timestamp.as_secs() as u8, 0xFF, 0xD9])
    }
}

struct CountingExtractor(Arc<AtomicUsize>);

impl FrameExtractor for CountingExtractor {
    fn extract(
        &self,
        _video: &Path,
        _timestamp: Duration,
        _control: &JobControl,
    ) -> Result<Vec<u8>, BifError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }
}

fn generator(duration: f64, failing_seconds: &[u64]) -> BifGenerator {
    BifGenerator::new("movie.mp4", Duration::from_secs(10))
        .with_probe(Arc::new(FixedDuration(duration)))
        .with_extractor(Arc::new(SecondsExtractor {
            failing_seconds: failing_seconds.to_vec(),
        }))
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

// ── job ────────────────────────────────────────────────────────────

#[test]
fn job_uses_probed_duration() {
    let job = generator(95.0, &[])
        .with_options(ExtractOptions::new().with_workers(3))
        .job()
        .unwrap();

    assert_eq!(job.frame_count(), 10);
    assert_eq!(job.workers(), 3);
    assert_eq!(job.interval(), Duration::from_secs(10));
}

#[test]
fn invalid_interval_rejected_before_probe() {
    let probe = Arc::new(CountingProbe {
        calls: AtomicUsize::new(0),
    });
    let result = BifGenerator::new("movie.mp4", Duration::ZERO)
        .with_probe(probe.clone())
        .job();

    assert!(matches!(result, Err(BifError::InvalidInterval)));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn probe_error_is_fatal() {
    let probe = Arc::new(CountingProbe {
        calls: AtomicUsize::new(0),
    });
    let result = BifGenerator::new("movie.mp4", Duration::from_secs(10))
        .with_probe(probe.clone())
        .frames();

    assert!(matches!(result, Err(BifError::Probe { .. })));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn absurd_duration_rejected_before_extraction() {
    let calls = Arc::new(AtomicUsize::new(0));
    let result = BifGenerator::new("movie.mp4", Duration::from_secs(10))
        .with_probe(Arc::new(FixedDuration(1e20)))
        .with_extractor(Arc::new(CountingExtractor(Arc::clone(&calls))))
        .frames();

    assert!(matches!(result, Err(BifError::TooManyFrames(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ── frames / write_to ──────────────────────────────────────────────

#[test]
fn frames_in_index_order() {
    let frames = generator(45.0, &[20])
        .with_options(ExtractOptions::new().with_workers(4))
        .frames()
        .unwrap();

    assert_eq!(frames.len(), 5);
    assert!(frames.iter().enumerate().all(|(i, frame)| frame.index == i));
    assert!(!frames[2].is_present());
    assert_eq!(frames[3].data, Some(vec![0xFF, 0xD8, 30, 0xFF, 0xD9]));
}

#[test]
fn write_to_produces_bif() {
    let mut bytes = Vec::new();
    let written = generator(30.0, &[10])
        .with_options(ExtractOptions::new().with_profile(ThumbnailProfile::compact()))
        .write_to(&mut bytes)
        .unwrap();

    assert_eq!(written, bytes.len() as u64);
    assert_eq!(&bytes[0..3], b"BIF");
    assert_eq!(u32_at(&bytes, 12), 4);
    assert_eq!(u32_at(&bytes, 16), 10_000);
    assert_eq!(u32_at(&bytes, 20), 240);
    assert_eq!(u32_at(&bytes, 24), 160);

    // 64 + 5 * 8 = 104; frame 1 failed.
    let offsets: Vec<u64> = (0..5).map(|i| u64_at(&bytes, 64 + i * 8)).collect();
    assert_eq!(offsets, vec![104, 109, 109, 114, 119]);
}

#[test]
fn header_follows_profile() {
    let header = BifGenerator::new("movie.mp4", Duration::from_millis(2500))
        .with_options(
            ExtractOptions::new()
                .with_profile(ThumbnailProfile::standard().with_resolution(480, 270)),
        )
        .header()
        .unwrap();

    assert_eq!(header.interval_ms, 2500);
    assert_eq!((header.width, header.height), (480, 270));
}

// ── save ───────────────────────────────────────────────────────────

#[test]
fn save_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movie.bif");

    let written = generator(20.0, &[]).save(&path).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), written);
}

#[test]
fn save_leaves_no_file_when_every_frame_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("movie.bif");

    let result = generator(20.0, &[0, 10, 20]).save(&path);

    assert!(matches!(
        result,
        Err(BifError::NoFramesExtracted { total: 3 })
    ));
    assert!(!path.exists());
}

#[test]
fn generator_debug() {
    let debug = format!("{:?}", generator(20.0, &[]));
    assert!(debug.contains("movie.mp4"));
    assert!(debug.contains("custom_probe: true"));
}
