//! The immutable result of a finalized session.

use std::{fmt, time::Duration};

use bytes::Bytes;

use super::TransmitterId;
use crate::{frame::FrameIndex, grid::GridShape, params::SessionParams};

/// Why a session stopped accepting frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FinalizeReason {
    /// Every slot was filled.
    Complete,
    /// No frame arrived within the inactivity timeout.
    InactivityTimeout,
    /// The transmitter closed the connection between frames.
    ConnectionClosed,
    /// The connection closed part-way through a frame.
    Truncated,
    /// The byte stream lost frame alignment.
    Desync,
    /// The transmitter opened a new session before this one ended.
    Superseded,
    /// The receiver stopped while the session was open.
    Shutdown,
}

impl FinalizeReason {
    /// Stable lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::InactivityTimeout => "inactivity_timeout",
            Self::ConnectionClosed => "connection_closed",
            Self::Truncated => "truncated",
            Self::Desync => "desync",
            Self::Superseded => "superseded",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for FinalizeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Per-session frame counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Frames stored in a slot.
    pub accepted: usize,
    /// Frames dropped because their slot was already filled.
    pub duplicates: usize,
    /// Frames dropped for a mismatch, bad index or bad length.
    pub rejected: usize,
    /// Accepted frames whose row and column disagree with their index.
    pub grid_mismatches: usize,
    /// Time from session creation to finalization.
    pub elapsed: Duration,
}

/// A reconstructed image buffer handed to the downstream codec.
///
/// `buffer` always holds exactly `params.total_length()` bytes. Slots listed
/// in [`missing`](Self::missing) hold placeholder bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizedImage {
    pub(super) transmitter: TransmitterId,
    pub(super) image_name: String,
    pub(super) params: SessionParams,
    pub(super) grid: GridShape,
    pub(super) buffer: Bytes,
    pub(super) missing: Vec<FrameIndex>,
    pub(super) reason: FinalizeReason,
    pub(super) stats: SessionStats,
}

impl FinalizedImage {
    /// Transmitter that sent the image.
    #[must_use]
    pub fn transmitter(&self) -> &TransmitterId { &self.transmitter }

    /// Name announced in the handshake.
    #[must_use]
    pub fn image_name(&self) -> &str { &self.image_name }

    /// Parameters the session was negotiated with.
    #[must_use]
    pub const fn params(&self) -> SessionParams { self.params }

    /// Reconstruction grid for the downstream codec.
    #[must_use]
    pub const fn grid(&self) -> GridShape { self.grid }

    /// The reassembled bytes.
    #[must_use]
    pub fn buffer(&self) -> &[u8] { &self.buffer }

    /// Consume the image, returning its buffer.
    #[must_use]
    pub fn into_buffer(self) -> Bytes { self.buffer }

    /// Indices that were never received, in ascending order.
    #[must_use]
    pub fn missing(&self) -> &[FrameIndex] { &self.missing }

    /// Whether every frame arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.missing.is_empty() }

    /// Why the session ended.
    #[must_use]
    pub const fn reason(&self) -> FinalizeReason { self.reason }

    /// Frame counters gathered while the session was open.
    #[must_use]
    pub const fn stats(&self) -> SessionStats { self.stats }
}
