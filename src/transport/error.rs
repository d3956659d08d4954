//! Error types for the frame transport.
//!
//! The transport distinguishes a stream that stopped mid-frame
//! ([`TransportError::TruncatedFrame`]) from one whose bytes no longer line
//! up with frame boundaries ([`TransportError::Desync`]). The first still
//! lets the session finalize with whatever arrived; the second aborts the
//! connection because no resynchronisation point can be trusted.

use std::io;

use thiserror::Error;

use crate::{
    frame::{FrameIndex, HeaderError},
    params::ParamsError,
    session::TransmitterIdError,
};

/// Why the byte stream can no longer be split into frames.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum DesyncReason {
    /// The bytes at the frame boundary are not a valid header.
    #[error(transparent)]
    Header(#[from] HeaderError),
    /// The header names a slot the negotiated session does not have, so the
    /// payload length cannot be derived.
    #[error("frame index {index} outside negotiated session of {total_frames} frames")]
    OutsideSession {
        /// Index carried by the header.
        index: FrameIndex,
        /// Frame count negotiated in the handshake.
        total_frames: u16,
    },
}

/// Errors produced while reading or writing frames.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The stream ended part-way through a frame.
    #[error("truncated frame: stream ended after {have} of {need} bytes")]
    TruncatedFrame {
        /// Bytes of the partial frame that arrived.
        have: usize,
        /// Bytes the complete frame required (header only when the header
        /// itself was cut short).
        need: usize,
    },
    /// The stream lost frame alignment.
    #[error("stream desynchronised: {0}")]
    Desync(#[from] DesyncReason),
    /// An outbound frame's payload does not fit its slot.
    #[error("payload for frame {index} is {actual} bytes; slot holds {expected}")]
    PayloadLength {
        /// Index of the rejected frame.
        index: FrameIndex,
        /// Slot length derived from the session parameters.
        expected: usize,
        /// Payload length supplied.
        actual: usize,
    },
    /// Underlying I/O failure.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Whether the error means frame boundaries can no longer be trusted.
    #[must_use]
    pub fn is_desync(&self) -> bool { matches!(self, Self::Desync(_)) }
}

/// Errors produced while exchanging the session handshake.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The handshake bytes could not be decoded.
    #[error("failed to decode handshake: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    /// The handshake could not be encoded.
    #[error("failed to encode handshake: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    /// A text field was not valid UTF-8.
    #[error("handshake field `{field}` is not valid UTF-8")]
    InvalidUtf8 {
        /// Name of the offending field.
        field: &'static str,
    },
    /// The transmitter identifier was rejected.
    #[error("invalid transmitter id: {0}")]
    TransmitterId(#[from] TransmitterIdError),
    /// The advertised chunk size is outside the permitted range.
    #[error(transparent)]
    ChunkSize(#[from] crate::params::ChunkSizeError),
    /// The advertised frame count and length disagree.
    #[error(transparent)]
    Params(#[from] ParamsError),
    /// The advertised grid cannot hold the advertised frames.
    #[error("grid {rows}x{cols} cannot hold {frames} frames")]
    GridTooSmall {
        /// Advertised rows.
        rows: u8,
        /// Advertised columns.
        cols: u8,
        /// Advertised frame count.
        frames: u16,
    },
    /// The peer did not complete the handshake in time.
    #[error("handshake timed out")]
    Timeout,
    /// Underlying I/O failure.
    #[error("handshake I/O error: {0}")]
    Io(#[from] io::Error),
}
