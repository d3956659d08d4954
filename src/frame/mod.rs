//! Frame header codec and the header-plus-payload [`Frame`] unit.
//!
//! A frame is the smallest unit that crosses the wire: a fixed 10-byte
//! [`FrameHeader`] followed by at most one chunk of the image buffer.

pub mod error;
pub mod header;
pub mod index;

use bytes::Bytes;
pub use error::HeaderError;
pub use header::{FrameHeader, HEADER_LEN};
pub use index::FrameIndex;

/// Metadata and payload for a single frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    header: FrameHeader,
    payload: Bytes,
}

impl Frame {
    /// Construct a new frame.
    #[must_use]
    pub fn new(header: FrameHeader, payload: Bytes) -> Self { Self { header, payload } }

    /// Return the frame header.
    #[must_use]
    pub fn header(&self) -> &FrameHeader { &self.header }

    /// Shorthand for the header's frame index.
    #[must_use]
    pub fn index(&self) -> FrameIndex { self.header.frame_index() }

    /// Return the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] { self.payload.as_ref() }

    /// Length of the frame on the wire, header included.
    #[must_use]
    pub fn wire_len(&self) -> usize { HEADER_LEN + self.payload.len() }

    /// Consume the frame, returning its components.
    #[must_use]
    pub fn into_parts(self) -> (FrameHeader, Bytes) { (self.header, self.payload) }
}
