//! BIF (Browse Index File) encoding.
//!
//! A BIF is laid out as:
//!
//! | Bytes | Content |
//! |-------|---------|
//! | 0–7 | magic `B I F 00 00 00 00 00` |
//! | 8–11 | version (`1`), little-endian u32 |
//! | 12–15 | frame count, LE u32 |
//! | 16–19 | interval in milliseconds, LE u32 |
//! | 20–23 | thumbnail width, LE u32 |
//! | 24–27 | thumbnail height, LE u32 |
//! | 28–63 | reserved, zero |
//! | 64… | `frame count + 1` LE u64 absolute offsets |
//! | … | JPEG payloads in index order |
//!
//! The last offset is an end-of-data sentinel equal to the file size, so the
//! payload of frame `i` is always `offsets[i]..offsets[i + 1]`. A frame whose
//! extraction failed gets a zero-length entry.
//!
//! All offsets are computed before the first byte is written, so encoding is
//! a single sequential pass and works with any [`Write`] sink.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::BifError;
use crate::frame::Frame;
use crate::job::{interval_ms, validate_interval};

/// Magic bytes at the start of every BIF.
pub const BIF_MAGIC: [u8; 8] = *b"BIF\0\0\0\0\0";
/// Format version written into the header.
pub const BIF_VERSION: u32 = 1;
/// Size of the fixed header in bytes.
pub const BIF_HEADER_SIZE: u64 = 64;

/// The per-file fields of the 64-byte header, minus the frame count (which
/// the encoder takes from the frame list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BifHeader {
    /// Spacing between thumbnails in milliseconds.
    pub interval_ms: u32,
    /// Thumbnail width in pixels.
    pub width: u32,
    /// Thumbnail height in pixels.
    pub height: u32,
}

impl BifHeader {
    /// Header for thumbnails of `width × height` taken every `interval`.
    ///
    /// # Errors
    ///
    /// Returns [`BifError::InvalidInterval`] for an interval shorter than one
    /// millisecond.
    pub fn new(interval: Duration, width: u32, height: u32) -> Result<Self, BifError> {
        validate_interval(interval)?;
        Ok(Self {
            interval_ms: interval_ms(interval),
            width,
            height,
        })
    }

    /// Serialize the header for a file holding `frame_count` frames.
    pub fn to_bytes(&self, frame_count: u32) -> [u8; BIF_HEADER_SIZE as usize] {
        let mut bytes = [0_u8; BIF_HEADER_SIZE as usize];
        bytes[0..8].copy_from_slice(&BIF_MAGIC);
        bytes[8..12].copy_from_slice(&BIF_VERSION.to_le_bytes());
        bytes[12..16].copy_from_slice(&frame_count.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.interval_ms.to_le_bytes());
        bytes[20..24].copy_from_slice(&self.width.to_le_bytes());
        bytes[24..28].copy_from_slice(&self.height.to_le_bytes());
        // 28..64 reserved
        bytes
    }
}

/// Compute the `frame_sizes.len() + 1` absolute offsets of a BIF whose
/// frames have the given payload sizes.
///
/// # Example
///
/// ```
/// let offsets = bifgen::compute_offsets(&[10, 0, 5]);
/// // 64-byte header + 4 offsets of 8 bytes each.
/// assert_eq!(offsets, vec![96, 106, 106, 111]);
/// ```
pub fn compute_offsets(frame_sizes: &[u64]) -> Vec<u64> {
    let index_size = (frame_sizes.len() as u64 + 1) * 8;
    let mut current = BIF_HEADER_SIZE + index_size;

    let mut offsets = Vec::with_capacity(frame_sizes.len() + 1);
    for &size in frame_sizes {
        offsets.push(current);
        current += size;
    }
    offsets.push(current);
    offsets
}

/// Write `frames` as a BIF to `sink`.
///
/// Frames are written in slice order, which must be index order; absent
/// frames contribute no payload. Returns the number of bytes written, which
/// equals the end-of-data sentinel.
///
/// # Errors
///
/// [`BifError::EmptyInput`] for an empty frame list,
/// [`BifError::TooManyFrames`] if the count overflows the header field, and
/// [`BifError::IoError`] for any failing write (the sink is left with
/// whatever was written so far).
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use bifgen::{BifHeader, Frame, encode};
///
/// let frames = vec![Frame::new(0, vec![0xFF, 0xD8, 0xFF, 0xD9]), Frame::absent(1)];
/// let header = BifHeader::new(Duration::from_secs(10), 320, 180)?;
/// let mut buffer = Vec::new();
/// let written = encode(&frames, &mut buffer, header)?;
/// assert_eq!(written, buffer.len() as u64);
/// # Ok::<(), bifgen::BifError>(())
/// ```
pub fn encode<W: Write>(frames: &[Frame], mut sink: W, header: BifHeader) -> Result<u64, BifError> {
    if frames.is_empty() {
        return Err(BifError::EmptyInput);
    }
    let frame_count =
        u32::try_from(frames.len()).map_err(|_| BifError::TooManyFrames(frames.len()))?;

    let sizes: Vec<u64> = frames.iter().map(|frame| frame.len() as u64).collect();
    let offsets = compute_offsets(&sizes);

    sink.write_all(&header.to_bytes(frame_count))?;

    let mut index = Vec::with_capacity(offsets.len() * 8);
    for offset in &offsets {
        index.extend_from_slice(&offset.to_le_bytes());
    }
    sink.write_all(&index)?;

    for frame in frames {
        if let Some(data) = &frame.data {
            sink.write_all(data)?;
        }
    }
    sink.flush()?;

    let total = offsets[offsets.len() - 1];
    log::debug!(
        "Encoded BIF: {} frames, {} bytes, {}ms interval, {}x{}",
        frame_count,
        total,
        header.interval_ms,
        header.width,
        header.height
    );
    Ok(total)
}

/// Create (or truncate) `path` and write `frames` to it as a BIF.
///
/// There is no atomic rename: a failing write leaves a truncated file.
///
/// # Errors
///
/// Same as [`encode`], plus [`BifError::IoError`] if the file cannot be
/// created.
pub fn write_bif_file<P: AsRef<Path>>(
    path: P,
    frames: &[Frame],
    header: BifHeader,
) -> Result<u64, BifError> {
    if frames.is_empty() {
        return Err(BifError::EmptyInput);
    }
    let path = path.as_ref();
    log::debug!("Writing BIF to {}", path.display());
    let file = File::create(path)?;
    encode(frames, BufWriter::new(file), header)
}
