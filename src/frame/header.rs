//! Fixed-layout header carried in front of every frame payload.

use super::{FrameIndex, HeaderError};
use crate::byte_order::{read_wire_u16, write_wire_u16};

/// Encoded size of a [`FrameHeader`] in bytes.
pub const HEADER_LEN: usize = 10;

/// Header describing a single frame's place in the whole image.
///
/// The layout is fixed and little-endian:
///
/// ```text
/// 0..2   frame_index   u16
/// 2      row           u8
/// 3      col           u8
/// 4..6   total_frames  u16
/// 6..10  reserved      [u8; 4]
/// ```
///
/// `row` and `col` describe the frame's cell in the encode-time grid. They
/// are advisory: byte offsets are always derived from `frame_index`.
///
/// # Examples
///
/// ```
/// use stillframe::frame::{FrameHeader, FrameIndex};
/// let header = FrameHeader::new(FrameIndex::new(4), 1, 1, 9);
/// let bytes = header.encode();
/// assert_eq!(FrameHeader::decode(&bytes), Ok(header));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameHeader {
    frame_index: FrameIndex,
    row: u8,
    col: u8,
    total_frames: u16,
    reserved: [u8; 4],
}

impl FrameHeader {
    /// Create a header with zeroed reserved bytes.
    #[must_use]
    pub const fn new(frame_index: FrameIndex, row: u8, col: u8, total_frames: u16) -> Self {
        Self {
            frame_index,
            row,
            col,
            total_frames,
            reserved: [0; 4],
        }
    }

    /// Return a copy of the header carrying `reserved` in its padding bytes.
    #[must_use]
    pub const fn with_reserved(mut self, reserved: [u8; 4]) -> Self {
        self.reserved = reserved;
        self
    }

    /// Position of the frame within its session.
    #[must_use]
    pub const fn frame_index(&self) -> FrameIndex { self.frame_index }

    /// Grid row advertised by the sender.
    #[must_use]
    pub const fn row(&self) -> u8 { self.row }

    /// Grid column advertised by the sender.
    #[must_use]
    pub const fn col(&self) -> u8 { self.col }

    /// Number of frames in the session.
    #[must_use]
    pub const fn total_frames(&self) -> u16 { self.total_frames }

    /// Padding bytes, preserved verbatim.
    #[must_use]
    pub const fn reserved(&self) -> [u8; 4] { self.reserved }

    /// Serialise the header into its 10-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0_u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&write_wire_u16(self.frame_index.get()));
        buf[2] = self.row;
        buf[3] = self.col;
        buf[4..6].copy_from_slice(&write_wire_u16(self.total_frames));
        buf[6..10].copy_from_slice(&self.reserved);
        buf
    }

    /// Decode a header from exactly [`HEADER_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HeaderError::Length`] when `bytes` is not exactly
    /// [`HEADER_LEN`] long and [`HeaderError::IndexOutOfRange`] when the
    /// frame index is not below the advertised frame count.
    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> {
        let Ok(raw) = <&[u8; HEADER_LEN]>::try_from(bytes) else {
            return Err(HeaderError::Length {
                expected: HEADER_LEN,
                found: bytes.len(),
            });
        };

        let frame_index = FrameIndex::new(read_wire_u16([raw[0], raw[1]]));
        let total_frames = read_wire_u16([raw[4], raw[5]]);
        if frame_index.get() >= total_frames {
            return Err(HeaderError::IndexOutOfRange {
                index: frame_index,
                total_frames,
            });
        }

        Ok(Self {
            frame_index,
            row: raw[2],
            col: raw[3],
            total_frames,
            reserved: [raw[6], raw[7], raw[8], raw[9]],
        })
    }
}
