//! Errors raised while decoding frame headers.

use thiserror::Error;

use super::FrameIndex;

/// Reasons a byte slice cannot be decoded into a
/// [`FrameHeader`](crate::frame::FrameHeader).
///
/// Every variant is a malformed header; callers treat them alike and abort
/// the stream rather than guessing at a resynchronisation point.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// The input was not exactly one header long.
    #[error("malformed header: expected {expected} bytes, found {found}")]
    Length {
        /// Required header length.
        expected: usize,
        /// Length of the rejected input.
        found: usize,
    },
    /// The frame index does not fall inside the advertised frame count.
    #[error("malformed header: frame index {index} outside total of {total_frames}")]
    IndexOutOfRange {
        /// Index carried by the header.
        index: FrameIndex,
        /// Frame count carried by the same header.
        total_frames: u16,
    },
}
