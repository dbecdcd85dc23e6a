//! BIF encoder integration tests.

use std::io::{self, Write};
use std::time::Duration;

use bifgen::{
    BIF_HEADER_SIZE, BIF_MAGIC, BIF_VERSION, BifError, BifHeader, Frame, compute_offsets, encode,
    write_bif_file,
};

fn header() -> BifHeader {
    BifHeader::new(Duration::from_secs(10), 320, 180).unwrap()
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap())
}

fn u64_at(bytes: &[u8], at: usize) -> u64 {
    u64::from_le_bytes(bytes[at..at + 8].try_into().unwrap())
}

/// Frames 0..count, frame `i` holding `1000 + i` bytes of value `i`.
fn growing_frames(count: usize) -> Vec<Frame> {
    (0..count)
        .map(|i| Frame::new(i, vec![i as u8; 1000 + i]))
        .collect()
}

fn read_offsets(bytes: &[u8]) -> Vec<u64> {
    let count = u32_at(bytes, 12) as usize;
    (0..=count)
        .map(|i| u64_at(bytes, BIF_HEADER_SIZE as usize + i * 8))
        .collect()
}

// ── Header ─────────────────────────────────────────────────────────

#[test]
fn header_layout() {
    let bytes = header().to_bytes(7);

    assert_eq!(bytes.len(), 64);
    assert_eq!(&bytes[0..8], &BIF_MAGIC);
    assert_eq!(&bytes[0..3], b"BIF");
    assert_eq!(u32_at(&bytes, 8), BIF_VERSION);
    assert_eq!(u32_at(&bytes, 12), 7);
    assert_eq!(u32_at(&bytes, 16), 10_000);
    assert_eq!(u32_at(&bytes, 20), 320);
    assert_eq!(u32_at(&bytes, 24), 180);
    assert!(bytes[28..].iter().all(|&byte| byte == 0));
}

#[test]
fn header_truncates_interval_to_milliseconds() {
    let header = BifHeader::new(Duration::from_micros(2_500_900), 240, 160).unwrap();
    assert_eq!(header.interval_ms, 2500);
}

#[test]
fn header_rejects_sub_millisecond_interval() {
    let result = BifHeader::new(Duration::from_micros(999), 320, 180);
    assert!(matches!(result, Err(BifError::InvalidInterval)));

    let result = BifHeader::new(Duration::ZERO, 320, 180);
    assert!(matches!(result, Err(BifError::InvalidInterval)));
}

// ── Offsets ────────────────────────────────────────────────────────

#[test]
fn offsets_for_growing_frames() {
    let sizes: Vec<u64> = (0..10).map(|i| 1000 + i).collect();
    let offsets = compute_offsets(&sizes);

    assert_eq!(
        offsets,
        vec![152, 1152, 2153, 3155, 4158, 5162, 6167, 7173, 8180, 9188, 10197]
    );
}

#[test]
fn offsets_with_absent_frame_repeat() {
    let sizes = [500, 500, 500, 0, 500];
    let offsets = compute_offsets(&sizes);

    assert_eq!(offsets.len(), 6);
    assert_eq!(offsets[4], offsets[3]);
    assert!(offsets.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn offsets_single_frame() {
    assert_eq!(compute_offsets(&[42]), vec![80, 122]);
}

// ── encode ─────────────────────────────────────────────────────────

#[test]
fn encode_writes_index_and_payload() {
    let frames = growing_frames(10);
    let mut bytes = Vec::new();
    let written = encode(&frames, &mut bytes, header()).unwrap();

    assert_eq!(written, 10197);
    assert_eq!(bytes.len() as u64, written);
    assert_eq!(u32_at(&bytes, 12), 10);

    let offsets = read_offsets(&bytes);
    assert_eq!(*offsets.last().unwrap(), bytes.len() as u64);
    for (i, frame) in frames.iter().enumerate() {
        let payload = &bytes[offsets[i] as usize..offsets[i + 1] as usize];
        assert_eq!(Some(payload), frame.data.as_deref(), "frame {i}");
    }
}

#[test]
fn encode_absent_frame_gets_zero_length_entry() {
    let mut frames = growing_frames(6);
    frames[3] = Frame::absent(3);

    let mut bytes = Vec::new();
    encode(&frames, &mut bytes, header()).unwrap();

    let offsets = read_offsets(&bytes);
    assert_eq!(offsets.len(), 7);
    assert_eq!(offsets[4], offsets[3]);
    assert_eq!(offsets[5] - offsets[4], 1004);
    assert_eq!(u32_at(&bytes, 12), 6);
}

#[test]
fn encode_all_absent_still_valid() {
    let frames = vec![Frame::absent(0), Frame::absent(1)];
    let mut bytes = Vec::new();
    let written = encode(&frames, &mut bytes, header()).unwrap();

    assert_eq!(written, 64 + 3 * 8);
    assert_eq!(read_offsets(&bytes), vec![88, 88, 88]);
}

#[test]
fn encode_empty_input_writes_nothing() {
    let mut bytes = Vec::new();
    let result = encode(&[], &mut bytes, header());

    assert!(matches!(result, Err(BifError::EmptyInput)));
    assert!(bytes.is_empty());
}

struct FailingSink {
    accepted: usize,
    limit: usize,
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.accepted + buf.len() > self.limit {
            return Err(io::Error::other("disk full"));
        }
        self.accepted += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn encode_propagates_sink_errors() {
    let sink = FailingSink {
        accepted: 0,
        limit: 100,
    };
    let result = encode(&growing_frames(3), sink, header());

    match result {
        Err(BifError::IoError(error)) => assert_eq!(error.to_string(), "disk full"),
        other => panic!("Expected IoError, got: {other:?}"),
    }
}

// ── write_bif_file ─────────────────────────────────────────────────

#[test]
fn write_bif_file_matches_encode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bif");
    let frames = growing_frames(4);

    let written = write_bif_file(&path, &frames, header()).unwrap();
    let on_disk = std::fs::read(&path).unwrap();

    let mut in_memory = Vec::new();
    encode(&frames, &mut in_memory, header()).unwrap();

    assert_eq!(written, on_disk.len() as u64);
    assert_eq!(on_disk, in_memory);
}

#[test]
fn write_bif_file_empty_input_creates_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bif");

    let result = write_bif_file(&path, &[], header());

    assert!(matches!(result, Err(BifError::EmptyInput)));
    assert!(!path.exists());
}

#[test]
fn write_bif_file_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.bif");

    let result = write_bif_file(&path, &growing_frames(1), header());
    assert!(matches!(result, Err(BifError::IoError(_))));
}
