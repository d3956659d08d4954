//! Errors raised while feeding frames into a session.

use thiserror::Error;

use crate::{frame::FrameIndex, params::SessionParams};

/// Errors produced by [`SessionReassembler`](super::SessionReassembler) and
/// [`SessionRegistry`](super::SessionRegistry).
///
/// None of these end a session: the offending frame is dropped and the
/// session keeps waiting for the rest.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ReassemblyError {
    /// The session was already finalized and no longer accepts frames.
    #[error("session already finalized")]
    SessionFinalized,
    /// The frame announces a different frame count from the open session.
    #[error("frame belongs to a session of {found} frames; open session has {expected}")]
    SessionMismatch {
        /// Frame count the session was opened with.
        expected: u16,
        /// Frame count carried by the rejected frame.
        found: u16,
    },
    /// A transmitter offered new parameters while its previous session is
    /// still open.
    #[error("open session uses {open:?}; handshake offered {offered:?}")]
    ParamsConflict {
        /// Parameters of the open session.
        open: SessionParams,
        /// Parameters offered for the new session.
        offered: SessionParams,
    },
    /// The slot already holds a payload. The first write wins.
    #[error("duplicate frame {index}")]
    DuplicateFrame {
        /// Index of the duplicate.
        index: FrameIndex,
    },
    /// The index lies outside the session.
    #[error("frame index {index} outside session of {total_frames} frames")]
    IndexOutOfRange {
        /// Rejected index.
        index: FrameIndex,
        /// Frames in the session.
        total_frames: u16,
    },
    /// The payload cannot belong to the slot it names.
    #[error("payload for frame {index} is {actual} bytes; slot holds {expected}")]
    PayloadLength {
        /// Slot index.
        index: FrameIndex,
        /// Length derived from the session parameters.
        expected: usize,
        /// Length received.
        actual: usize,
    },
}
