//! Thumbnail frames.

use std::time::Duration;

/// One thumbnail slot of a BIF.
///
/// `index` is the temporal position of the frame: frame `i` shows the video
/// at `i × interval`. `data` holds the JPEG bytes, or `None` when extraction
/// failed for this slot. Absent frames are never retried; the encoder gives
/// them a zero-length entry in the offset index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 0-based temporal index.
    pub index: usize,
    /// JPEG bytes, if extraction succeeded.
    pub data: Option<Vec<u8>>,
}

impl Frame {
    /// A successfully extracted frame.
    pub fn new(index: usize, data: Vec<u8>) -> Self {
        Self {
            index,
            data: Some(data),
        }
    }

    /// A slot whose extraction failed.
    pub fn absent(index: usize) -> Self {
        Self { index, data: None }
    }

    /// Returns `true` if the frame carries JPEG data.
    pub fn is_present(&self) -> bool {
        self.data.is_some()
    }

    /// Number of payload bytes this frame contributes to the BIF.
    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, Vec::len)
    }

    /// Returns `true` if the frame contributes no payload bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of the frame in the video for a given interval.
    pub fn timestamp(&self, interval: Duration) -> Duration {
        frame_timestamp(self.index, interval)
    }
}

/// Position of frame `index` in the video: `index × interval`.
pub fn frame_timestamp(index: usize, interval: Duration) -> Duration {
    interval.mul_f64(index as f64)
}
