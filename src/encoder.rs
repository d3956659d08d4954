//! Outbound helper that splits an image buffer into frames.
//!
//! [`FrameEncoder`] chunks an opaque, already-compressed image buffer into
//! fixed-size frames and tags each with a [`FrameHeader`]. Payloads are
//! zero-copy slices of the input [`Bytes`]. The encoder keeps no state between
//! calls, so one instance can serve any number of sessions.

use bytes::Bytes;
use thiserror::Error;

use crate::{
    frame::{Frame, FrameHeader, FrameIndex},
    grid::{GridPolicy, GridShape},
    params::{ChunkSize, ParamsError, SessionParams},
};

/// Errors produced while splitting a buffer into frames.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// The buffer needs more frames than the header can index.
    #[error(transparent)]
    TooLarge(#[from] ParamsError),
    /// No grid with one-byte dimensions can hold the frames.
    #[error("no grid can hold {frames} frames under {policy:?}")]
    NoGrid {
        /// Frames that needed a cell.
        frames: usize,
        /// Policy that failed to produce a grid.
        policy: GridPolicy,
    },
    /// The explicit grid has fewer cells than frames.
    #[error("grid {rows}x{cols} too small for {frames} frames")]
    GridTooSmall {
        /// Rows in the rejected grid.
        rows: u8,
        /// Columns in the rejected grid.
        cols: u8,
        /// Frames that needed a cell.
        frames: usize,
    },
}

/// Splits image buffers into frame sequences.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameEncoder {
    chunk_size: ChunkSize,
    grid_policy: GridPolicy,
}

impl FrameEncoder {
    /// Create an encoder producing `chunk_size` payloads laid out by `grid_policy`.
    #[must_use]
    pub const fn new(chunk_size: ChunkSize, grid_policy: GridPolicy) -> Self {
        Self {
            chunk_size,
            grid_policy,
        }
    }

    /// Return the configured chunk size.
    #[must_use]
    pub const fn chunk_size(&self) -> ChunkSize { self.chunk_size }

    /// Return the configured grid policy.
    #[must_use]
    pub const fn grid_policy(&self) -> GridPolicy { self.grid_policy }

    /// Split `buffer` into frames, choosing the grid with the configured policy.
    ///
    /// An empty buffer yields an empty sequence.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLarge`] when the buffer needs more than
    /// `u16::MAX` frames and [`EncodeError::NoGrid`] when the policy cannot
    /// fit the frames into a one-byte grid.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use stillframe::{encoder::FrameEncoder, grid::GridPolicy, params::ChunkSize};
    ///
    /// let encoder = FrameEncoder::new(ChunkSize::new(100).unwrap(), GridPolicy::Square);
    /// let sequence = encoder.encode(Bytes::from(vec![7_u8; 250])).unwrap();
    /// let lengths: Vec<_> = sequence.frames().iter().map(|f| f.payload().len()).collect();
    /// assert_eq!(lengths, vec![100, 100, 50]);
    /// ```
    pub fn encode(&self, buffer: impl Into<Bytes>) -> Result<FrameSequence, EncodeError> {
        let buffer = buffer.into();
        let params = SessionParams::for_length(buffer.len(), self.chunk_size)?;
        let frames = usize::from(params.total_frames());
        let grid = self
            .grid_policy
            .shape_for(frames)
            .ok_or(EncodeError::NoGrid {
                frames,
                policy: self.grid_policy,
            })?;
        Ok(Self::build(&buffer, params, grid))
    }

    /// Split `buffer` into frames laid out on an explicit `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLarge`] when the buffer needs more than
    /// `u16::MAX` frames and [`EncodeError::GridTooSmall`] when `grid` has
    /// fewer cells than frames.
    pub fn encode_with_grid(
        &self,
        buffer: impl Into<Bytes>,
        grid: GridShape,
    ) -> Result<FrameSequence, EncodeError> {
        let buffer = buffer.into();
        let params = SessionParams::for_length(buffer.len(), self.chunk_size)?;
        let frames = usize::from(params.total_frames());
        if !grid.fits(frames) {
            return Err(EncodeError::GridTooSmall {
                rows: grid.rows(),
                cols: grid.cols(),
                frames,
            });
        }
        Ok(Self::build(&buffer, params, grid))
    }

    fn build(buffer: &Bytes, params: SessionParams, grid: GridShape) -> FrameSequence {
        let chunk = params.chunk_size().as_usize();
        let frames = buffer
            .chunks(chunk)
            .zip(0..params.total_frames())
            .map(|(slice, index)| {
                let index = FrameIndex::new(index);
                // `grid.fits` holds for every caller, so each index has a cell.
                let (row, col) = grid.cell(index).unwrap_or_default();
                let start = params.offset(index);
                let header = FrameHeader::new(index, row, col, params.total_frames());
                Frame::new(header, buffer.slice(start..start + slice.len()))
            })
            .collect();

        FrameSequence {
            params,
            grid,
            frames,
        }
    }
}

/// Ordered frames produced for one image buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameSequence {
    params: SessionParams,
    grid: GridShape,
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Parameters the receiver needs to rebuild the buffer.
    #[must_use]
    pub const fn params(&self) -> SessionParams { self.params }

    /// Grid the frames were laid out on.
    #[must_use]
    pub const fn grid(&self) -> GridShape { self.grid }

    /// Return the frames in `frame_index` order.
    #[must_use]
    pub fn frames(&self) -> &[Frame] { self.frames.as_slice() }

    /// Number of frames in the sequence.
    #[must_use]
    pub fn len(&self) -> usize { self.frames.len() }

    /// Whether the sequence describes a zero-length buffer.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.frames.is_empty() }

    /// Consume the sequence, returning all frames.
    #[must_use]
    pub fn into_frames(self) -> Vec<Frame> { self.frames }
}

impl IntoIterator for FrameSequence {
    type Item = Frame;
    type IntoIter = std::vec::IntoIter<Frame>;

    fn into_iter(self) -> Self::IntoIter { self.frames.into_iter() }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU8;

    use bytes::Bytes;
    use rstest::{fixture, rstest};

    use super::{EncodeError, FrameEncoder};
    use crate::{
        frame::FrameIndex,
        grid::{GridPolicy, GridShape},
        params::ChunkSize,
    };

    #[fixture]
    fn encoder() -> FrameEncoder {
        FrameEncoder::new(ChunkSize::new(100).expect("chunk"), GridPolicy::Square)
    }

    fn image(len: usize) -> Bytes {
        (0..len)
            .map(|i| u8::try_from(i % 251).expect("fits"))
            .collect::<Vec<_>>()
            .into()
    }

    #[rstest]
    fn frames_cover_buffer_without_gaps(encoder: FrameEncoder) {
        let buffer = image(250);
        let sequence = encoder.encode(buffer.clone()).expect("encode");

        assert_eq!(sequence.len(), 3);
        let joined: Vec<u8> = sequence
            .frames()
            .iter()
            .flat_map(|f| f.payload().to_vec())
            .collect();
        assert_eq!(joined, buffer.to_vec());
        for (i, frame) in sequence.frames().iter().enumerate() {
            assert_eq!(frame.index().as_usize(), i);
            assert_eq!(frame.header().total_frames(), 3);
        }
    }

    #[rstest]
    fn headers_carry_row_major_cells(encoder: FrameEncoder) {
        let sequence = encoder.encode(image(1000)).expect("encode");
        assert_eq!(sequence.grid(), GridShape::new(3, 4));
        let cells: Vec<_> = sequence
            .frames()
            .iter()
            .map(|f| (f.header().row(), f.header().col()))
            .collect();
        assert_eq!(cells[0], (0, 0));
        assert_eq!(cells[4], (1, 0));
        assert_eq!(cells[9], (2, 1));
    }

    #[rstest]
    fn empty_buffer_yields_empty_sequence(encoder: FrameEncoder) {
        let sequence = encoder.encode(Bytes::new()).expect("encode");
        assert!(sequence.is_empty());
        assert_eq!(sequence.params().total_frames(), 0);
        assert_eq!(sequence.grid(), GridShape::EMPTY);
    }

    #[rstest]
    fn explicit_grid_must_fit(encoder: FrameEncoder) {
        let err = encoder
            .encode_with_grid(image(501), GridShape::new(2, 2))
            .expect_err("grid too small");
        assert_eq!(
            err,
            EncodeError::GridTooSmall {
                rows: 2,
                cols: 2,
                frames: 6,
            }
        );
    }

    #[rstest]
    fn explicit_grid_sets_cells(encoder: FrameEncoder) {
        let sequence = encoder
            .encode_with_grid(image(300), GridShape::new(1, 3))
            .expect("encode");
        let last = sequence.frames().last().expect("frames");
        assert_eq!((last.header().row(), last.header().col()), (0, 2));
    }

    #[test]
    fn fixed_columns_policy_fails_when_rows_overflow() {
        let encoder = FrameEncoder::new(
            ChunkSize::new(80).expect("chunk"),
            GridPolicy::FixedColumns(NonZeroU8::new(1).expect("non-zero")),
        );
        let err = encoder.encode(image(80 * 256)).expect_err("no grid");
        assert!(matches!(err, EncodeError::NoGrid { frames: 256, .. }));
    }

    #[rstest]
    fn payloads_share_the_input_allocation(encoder: FrameEncoder) {
        let buffer = image(200);
        let sequence = encoder.encode(buffer.clone()).expect("encode");
        let second = sequence
            .frames()
            .iter()
            .find(|f| f.index() == FrameIndex::new(1))
            .expect("second frame");
        assert_eq!(second.payload().as_ptr(), buffer[100..].as_ptr());
    }
}
