//! Per-transmitter slot map that rebuilds one image buffer.
//!
//! [`SessionReassembler`] stores each payload in the slot its `frame_index`
//! names, so frames may arrive in any order. Byte offsets come from the index
//! and the negotiated [`SessionParams`] only; the header's `row` and `col` are
//! checked against the grid and counted when they disagree, never used.
//! Finalization happens exactly once and fills unreceived slots with
//! placeholder bytes.

use std::{
    collections::BTreeSet,
    time::{Duration, Instant},
};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

use super::{FinalizeReason, FinalizedImage, ReassemblyError, SessionStats, TransmitterId};
use crate::{
    config::PlaceholderFill,
    frame::{Frame, FrameIndex},
    grid::GridShape,
    metrics,
    params::SessionParams,
};

/// Lifecycle of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting frames.
    Open,
    /// Frozen; the image was handed out.
    Finalized,
}

/// Outcome of accepting a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptStatus {
    /// More frames are needed.
    Incomplete {
        /// Slots still empty.
        remaining: usize,
    },
    /// Every slot is filled.
    Complete,
}

/// Reassembly state for one transmitter's image.
#[derive(Debug)]
pub struct SessionReassembler {
    transmitter: TransmitterId,
    image_name: String,
    params: SessionParams,
    grid: GridShape,
    fill: PlaceholderFill,
    slots: Vec<Option<Bytes>>,
    missing: BTreeSet<FrameIndex>,
    created_at: Instant,
    last_activity_at: Instant,
    state: SessionState,
    stats: SessionStats,
}

impl SessionReassembler {
    /// Open a session using the current time.
    #[must_use]
    pub fn new(
        transmitter: TransmitterId,
        image_name: impl Into<String>,
        params: SessionParams,
        grid: GridShape,
        fill: PlaceholderFill,
    ) -> Self {
        Self::new_at(transmitter, image_name, params, grid, fill, Instant::now())
    }

    /// Open a session with an explicit clock reading.
    #[must_use]
    pub fn new_at(
        transmitter: TransmitterId,
        image_name: impl Into<String>,
        params: SessionParams,
        grid: GridShape,
        fill: PlaceholderFill,
        now: Instant,
    ) -> Self {
        let total = params.total_frames();
        Self {
            transmitter,
            image_name: image_name.into(),
            params,
            grid,
            fill,
            slots: vec![None; usize::from(total)],
            missing: (0..total).map(FrameIndex::new).collect(),
            created_at: now,
            last_activity_at: now,
            state: SessionState::Open,
            stats: SessionStats::default(),
        }
    }

    /// Transmitter owning the session.
    #[must_use]
    pub fn transmitter(&self) -> &TransmitterId { &self.transmitter }

    /// Image name from the handshake.
    #[must_use]
    pub fn image_name(&self) -> &str { &self.image_name }

    /// Negotiated parameters.
    #[must_use]
    pub const fn params(&self) -> SessionParams { self.params }

    /// Reconstruction grid.
    #[must_use]
    pub const fn grid(&self) -> GridShape { self.grid }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState { self.state }

    /// Whether the session still accepts frames.
    #[must_use]
    pub fn is_open(&self) -> bool { self.state == SessionState::Open }

    /// Whether every slot has been filled.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.missing.is_empty() }

    /// Indices not yet received, ascending.
    #[must_use]
    pub fn missing(&self) -> Vec<FrameIndex> { self.missing.iter().copied().collect() }

    /// Number of filled slots.
    #[must_use]
    pub const fn received(&self) -> usize { self.stats.accepted }

    /// When the session was opened.
    #[must_use]
    pub const fn created_at(&self) -> Instant { self.created_at }

    /// When the last frame was accepted.
    #[must_use]
    pub const fn last_activity_at(&self) -> Instant { self.last_activity_at }

    /// Counters gathered so far.
    #[must_use]
    pub const fn stats(&self) -> SessionStats { self.stats }

    /// Whether an open session has been idle for at least `timeout` at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: Instant, timeout: Duration) -> bool {
        self.is_open() && now.saturating_duration_since(self.last_activity_at) >= timeout
    }

    /// Accept a frame using the current time.
    ///
    /// # Errors
    ///
    /// See [`accept_at`](Self::accept_at).
    pub fn accept(&mut self, frame: Frame) -> Result<AcceptStatus, ReassemblyError> {
        self.accept_at(frame, Instant::now())
    }

    /// Accept a frame with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// - [`ReassemblyError::SessionFinalized`] once the session is frozen.
    /// - [`ReassemblyError::SessionMismatch`] when the header's frame count
    ///   differs from the session's.
    /// - [`ReassemblyError::IndexOutOfRange`] or
    ///   [`ReassemblyError::PayloadLength`] when the frame cannot fit a slot.
    /// - [`ReassemblyError::DuplicateFrame`] when the slot is already filled;
    ///   the stored payload is kept.
    pub fn accept_at(&mut self, frame: Frame, now: Instant) -> Result<AcceptStatus, ReassemblyError> {
        if !self.is_open() {
            return Err(ReassemblyError::SessionFinalized);
        }
        let (header, payload) = frame.into_parts();
        let index = header.frame_index();

        if let Err(err) = self.check_fits(header.total_frames(), index, payload.len()) {
            self.stats.rejected += 1;
            metrics::inc_rejected();
            debug!(transmitter = %self.transmitter, %index, error = %err, "frame rejected");
            return Err(err);
        }

        let Some(slot) = self.slots.get_mut(index.as_usize()) else {
            return Err(ReassemblyError::IndexOutOfRange {
                index,
                total_frames: self.params.total_frames(),
            });
        };
        if slot.is_some() {
            self.stats.duplicates += 1;
            metrics::inc_duplicates();
            debug!(transmitter = %self.transmitter, %index, "duplicate frame dropped");
            return Err(ReassemblyError::DuplicateFrame { index });
        }
        *slot = Some(payload);

        if self.grid.cell(index) != Some((header.row(), header.col())) {
            self.stats.grid_mismatches += 1;
            metrics::inc_grid_mismatches();
            warn!(
                transmitter = %self.transmitter,
                %index,
                row = header.row(),
                col = header.col(),
                "grid cell disagrees with frame index"
            );
        }

        self.missing.remove(&index);
        self.last_activity_at = now;
        self.stats.accepted += 1;

        Ok(if self.missing.is_empty() {
            AcceptStatus::Complete
        } else {
            AcceptStatus::Incomplete {
                remaining: self.missing.len(),
            }
        })
    }

    fn check_fits(
        &self,
        total_frames: u16,
        index: FrameIndex,
        actual: usize,
    ) -> Result<(), ReassemblyError> {
        if total_frames != self.params.total_frames() {
            return Err(ReassemblyError::SessionMismatch {
                expected: self.params.total_frames(),
                found: total_frames,
            });
        }
        let expected =
            self.params
                .payload_len(index)
                .ok_or(ReassemblyError::IndexOutOfRange {
                    index,
                    total_frames,
                })?;
        if actual != expected {
            return Err(ReassemblyError::PayloadLength {
                index,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Freeze the session using the current time.
    ///
    /// # Errors
    ///
    /// See [`finalize_at`](Self::finalize_at).
    pub fn finalize(&mut self, reason: FinalizeReason) -> Result<FinalizedImage, ReassemblyError> {
        self.finalize_at(reason, Instant::now())
    }

    /// Freeze the session and build its image buffer.
    ///
    /// Each unreceived slot is filled with placeholder bytes of the length
    /// that slot would have carried. The slot payloads are released.
    ///
    /// # Errors
    ///
    /// Returns [`ReassemblyError::SessionFinalized`] on every call after the
    /// first.
    pub fn finalize_at(
        &mut self,
        reason: FinalizeReason,
        now: Instant,
    ) -> Result<FinalizedImage, ReassemblyError> {
        if !self.is_open() {
            return Err(ReassemblyError::SessionFinalized);
        }
        self.state = SessionState::Finalized;

        let mut buffer = BytesMut::with_capacity(self.params.total_len());
        for (index, slot) in (0..self.params.total_frames())
            .map(FrameIndex::new)
            .zip(std::mem::take(&mut self.slots))
        {
            match slot {
                Some(payload) => buffer.put_slice(&payload),
                None => {
                    let len = self.params.payload_len(index).unwrap_or_default();
                    buffer.put_bytes(self.fill.byte(), len);
                }
            }
        }

        let missing = self.missing();
        self.stats.elapsed = now.saturating_duration_since(self.created_at);
        metrics::add_placeholders(missing.len());
        metrics::inc_finalized(reason.as_str());

        Ok(FinalizedImage {
            transmitter: self.transmitter.clone(),
            image_name: self.image_name.clone(),
            params: self.params,
            grid: self.grid,
            buffer: buffer.freeze(),
            missing,
            reason,
            stats: self.stats,
        })
    }
}
