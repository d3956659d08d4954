//! Reconstruction grid shapes and the policy that picks them.
//!
//! The grid only affects the advisory `row`/`col` header fields and the shape
//! handed to the downstream codec. Byte offsets never depend on it.

use std::num::NonZeroU8;

use serde::{Deserialize, Serialize};

use crate::frame::FrameIndex;

/// Rows and columns of a reconstruction grid.
///
/// Both dimensions fit in one byte because the header carries `row` and `col`
/// as single bytes. The empty grid (`0 × 0`) describes a zero-length session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    rows: u8,
    cols: u8,
}

impl GridShape {
    /// Grid used for zero-length sessions.
    pub const EMPTY: Self = Self { rows: 0, cols: 0 };

    /// Construct a grid with the given dimensions.
    #[must_use]
    pub const fn new(rows: u8, cols: u8) -> Self { Self { rows, cols } }

    /// Number of rows.
    #[must_use]
    pub const fn rows(&self) -> u8 { self.rows }

    /// Number of columns.
    #[must_use]
    pub const fn cols(&self) -> u8 { self.cols }

    /// Number of cells in the grid.
    #[must_use]
    pub const fn capacity(&self) -> usize { self.rows as usize * self.cols as usize }

    /// Whether the grid can hold `frames` cells.
    #[must_use]
    pub const fn fits(&self, frames: usize) -> bool { self.capacity() >= frames }

    /// Cell of `index` in row-major order, or `None` when it falls outside.
    #[must_use]
    pub fn cell(&self, index: FrameIndex) -> Option<(u8, u8)> {
        if self.cols == 0 || index.as_usize() >= self.capacity() {
            return None;
        }
        let cols = u16::from(self.cols);
        let row = u8::try_from(index.get() / cols).ok()?;
        let col = u8::try_from(index.get() % cols).ok()?;
        Some((row, col))
    }
}

/// Strategy used by the encoder to choose a grid for a frame count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridPolicy {
    /// Square-ish grid: `cols = ceil(sqrt(n))`, `rows = ceil(n / cols)`.
    #[default]
    Square,
    /// Fixed column count; rows grow with the frame count.
    FixedColumns(NonZeroU8),
}

impl GridPolicy {
    /// Choose a grid for `frames` cells.
    ///
    /// Returns [`GridShape::EMPTY`] for zero frames and `None` when no grid
    /// with one-byte dimensions can hold `frames` under this policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use stillframe::grid::{GridPolicy, GridShape};
    /// assert_eq!(GridPolicy::Square.shape_for(10), Some(GridShape::new(3, 4)));
    /// ```
    #[must_use]
    pub fn shape_for(self, frames: usize) -> Option<GridShape> {
        if frames == 0 {
            return Some(GridShape::EMPTY);
        }
        let cols = match self {
            Self::Square => ceil_sqrt(frames),
            Self::FixedColumns(cols) => usize::from(cols.get()),
        };
        let rows = frames.div_ceil(cols);
        Some(GridShape::new(
            u8::try_from(rows).ok()?,
            u8::try_from(cols).ok()?,
        ))
    }
}

fn ceil_sqrt(n: usize) -> usize {
    let mut root = n.isqrt();
    if root * root < n {
        root += 1;
    }
    root
}
