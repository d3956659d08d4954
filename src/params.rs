//! Per-session transfer parameters shared by both ends of a link.
//!
//! [`SessionParams`] fixes how a byte buffer maps onto frame slots. Sender and
//! receiver must agree on it before the first payload-bearing frame, which is
//! why the handshake carries it ahead of any frame.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::FrameIndex;

/// Payload bytes carried by every frame of a session except possibly the last.
///
/// Valid chunk sizes lie in `80..=100`.
///
/// # Examples
///
/// ```
/// use stillframe::params::ChunkSize;
/// assert_eq!(ChunkSize::new(90).map(ChunkSize::get), Ok(90));
/// assert!(ChunkSize::new(79).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct ChunkSize(u16);

impl ChunkSize {
    /// Smallest permitted chunk size.
    pub const MIN: u16 = 80;
    /// Largest permitted chunk size.
    pub const MAX: u16 = 100;
    /// Chunk size used when nothing else is configured.
    pub const DEFAULT: Self = Self(90);

    /// Validate and wrap a chunk size.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkSizeError`] when `value` lies outside `80..=100`.
    pub const fn new(value: u16) -> Result<Self, ChunkSizeError> {
        if value < Self::MIN || value > Self::MAX {
            return Err(ChunkSizeError(value));
        }
        Ok(Self(value))
    }

    /// Return the chunk size in bytes.
    #[must_use]
    pub const fn get(self) -> u16 { self.0 }

    /// Return the chunk size as a `usize`.
    #[must_use]
    pub const fn as_usize(self) -> usize { self.0 as usize }
}

impl Default for ChunkSize {
    fn default() -> Self { Self::DEFAULT }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<u16> for ChunkSize {
    type Error = ChunkSizeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<ChunkSize> for u16 {
    fn from(value: ChunkSize) -> Self { value.0 }
}

/// A chunk size outside the permitted range.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("chunk size {0} outside {min}..={max}", min = ChunkSize::MIN, max = ChunkSize::MAX)]
pub struct ChunkSizeError(pub u16);

/// Errors raised when session parameters are inconsistent.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    /// The buffer needs more frames than a 16-bit index can address.
    #[error("image of {total_length} bytes needs more than {max} frames", max = u16::MAX)]
    TooManyFrames {
        /// Length of the rejected buffer.
        total_length: usize,
    },
    /// The advertised frame count does not match the advertised length.
    #[error(
        "frame count {total_frames} inconsistent with {total_length} bytes at chunk size \
         {chunk_size}"
    )]
    FrameCountMismatch {
        /// Advertised chunk size.
        chunk_size: ChunkSize,
        /// Advertised frame count.
        total_frames: u16,
        /// Advertised buffer length.
        total_length: u32,
    },
}

/// How one image buffer maps onto frame slots.
///
/// # Invariants
/// - `total_frames == ceil(total_length / chunk_size)`
///
/// # Examples
///
/// ```
/// use stillframe::{
///     frame::FrameIndex,
///     params::{ChunkSize, SessionParams},
/// };
/// let params = SessionParams::for_length(250, ChunkSize::new(100).unwrap()).unwrap();
/// assert_eq!(params.total_frames(), 3);
/// assert_eq!(params.payload_len(FrameIndex::new(2)), Some(50));
/// assert_eq!(params.payload_len(FrameIndex::new(3)), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionParams {
    chunk_size: ChunkSize,
    total_frames: u16,
    total_length: u32,
}

impl SessionParams {
    /// Derive parameters for a buffer of `total_length` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::TooManyFrames`] when the buffer needs more than
    /// `u16::MAX` frames.
    pub fn for_length(total_length: usize, chunk_size: ChunkSize) -> Result<Self, ParamsError> {
        let frames = total_length.div_ceil(chunk_size.as_usize());
        let (Ok(total_frames), Ok(total_length)) =
            (u16::try_from(frames), u32::try_from(total_length))
        else {
            return Err(ParamsError::TooManyFrames { total_length });
        };
        Ok(Self {
            chunk_size,
            total_frames,
            total_length,
        })
    }

    /// Rebuild parameters received from a peer, checking their consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ParamsError::FrameCountMismatch`] when `total_frames` is not
    /// the frame count implied by `total_length` and `chunk_size`.
    pub fn from_parts(
        chunk_size: ChunkSize,
        total_frames: u16,
        total_length: u32,
    ) -> Result<Self, ParamsError> {
        let expected = u64::from(total_length).div_ceil(u64::from(chunk_size.get()));
        if expected != u64::from(total_frames) {
            return Err(ParamsError::FrameCountMismatch {
                chunk_size,
                total_frames,
                total_length,
            });
        }
        Ok(Self {
            chunk_size,
            total_frames,
            total_length,
        })
    }

    /// Payload bytes per full frame.
    #[must_use]
    pub const fn chunk_size(&self) -> ChunkSize { self.chunk_size }

    /// Number of frames in the session.
    #[must_use]
    pub const fn total_frames(&self) -> u16 { self.total_frames }

    /// Length of the complete image buffer.
    #[must_use]
    pub const fn total_length(&self) -> u32 { self.total_length }

    /// Length of the complete image buffer as a `usize`.
    #[must_use]
    pub const fn total_len(&self) -> usize { self.total_length as usize }

    /// Whether the session carries no frames at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool { self.total_frames == 0 }

    /// Byte offset of `index` within the image buffer.
    #[must_use]
    pub const fn offset(&self, index: FrameIndex) -> usize {
        index.as_usize() * self.chunk_size.as_usize()
    }

    /// Payload length of the frame at `index`.
    ///
    /// Every frame carries a full chunk except the last, which carries the
    /// remainder. Returns `None` for indices outside the session.
    #[must_use]
    pub fn payload_len(&self, index: FrameIndex) -> Option<usize> {
        if index.get() >= self.total_frames {
            return None;
        }
        let remaining = self.total_len().checked_sub(self.offset(index))?;
        Some(remaining.min(self.chunk_size.as_usize()))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{ChunkSize, ChunkSizeError, ParamsError, SessionParams};
    use crate::frame::FrameIndex;

    fn chunk(value: u16) -> ChunkSize { ChunkSize::new(value).expect("valid chunk size") }

    #[rstest]
    #[case(80, true)]
    #[case(100, true)]
    #[case(79, false)]
    #[case(101, false)]
    #[case(0, false)]
    fn chunk_size_range_is_inclusive(#[case] value: u16, #[case] valid: bool) {
        assert_eq!(ChunkSize::new(value).is_ok(), valid);
        if !valid {
            assert_eq!(ChunkSize::new(value), Err(ChunkSizeError(value)));
        }
    }

    #[test]
    fn two_hundred_fifty_bytes_split_into_three_frames() {
        let params = SessionParams::for_length(250, chunk(100)).expect("params");
        let lengths: Vec<_> = (0..3)
            .map(|i| params.payload_len(FrameIndex::new(i)))
            .collect();
        assert_eq!(params.total_frames(), 3);
        assert_eq!(lengths, vec![Some(100), Some(100), Some(50)]);
        assert_eq!(params.offset(FrameIndex::new(2)), 200);
    }

    #[test]
    fn exact_multiple_has_full_last_frame() {
        let params = SessionParams::for_length(300, chunk(100)).expect("params");
        assert_eq!(params.total_frames(), 3);
        assert_eq!(params.payload_len(FrameIndex::new(2)), Some(100));
    }

    #[test]
    fn empty_buffer_has_no_frames() {
        let params = SessionParams::for_length(0, chunk(80)).expect("params");
        assert!(params.is_empty());
        assert_eq!(params.payload_len(FrameIndex::zero()), None);
    }

    #[test]
    fn oversized_buffer_is_rejected() {
        let len = usize::from(u16::MAX) * 80 + 1;
        assert_eq!(
            SessionParams::for_length(len, chunk(80)),
            Err(ParamsError::TooManyFrames { total_length: len })
        );
    }

    #[rstest]
    #[case(250, 3, true)]
    #[case(250, 2, false)]
    #[case(0, 0, true)]
    #[case(0, 1, false)]
    fn from_parts_checks_frame_count(
        #[case] length: u32,
        #[case] frames: u16,
        #[case] consistent: bool,
    ) {
        assert_eq!(
            SessionParams::from_parts(chunk(100), frames, length).is_ok(),
            consistent
        );
    }
}
