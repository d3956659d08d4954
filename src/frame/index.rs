//! Zero-based frame positioning within a session.
//!
//! Provides [`FrameIndex`], a type-safe wrapper around the 16-bit index
//! carried in every [`FrameHeader`](crate::frame::FrameHeader).

use std::num::TryFromIntError;

use derive_more::{Display, From};

/// Zero-based ordinal describing a frame's position within its session.
///
/// # Examples
///
/// ```
/// use stillframe::frame::FrameIndex;
/// let index = FrameIndex::new(3);
/// assert_eq!(index.get(), 3);
/// assert!(index.checked_increment().is_some());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
#[display("{_0}")]
pub struct FrameIndex(u16);

impl FrameIndex {
    /// Construct an index from a `u16` value.
    #[must_use]
    pub const fn new(value: u16) -> Self { Self(value) }

    /// Return the first valid frame index.
    #[must_use]
    pub const fn zero() -> Self { Self(0) }

    /// Return the underlying numeric value.
    #[must_use]
    pub const fn get(self) -> u16 { self.0 }

    /// Return the index as a `usize`, convenient for slot and offset maths.
    #[must_use]
    pub const fn as_usize(self) -> usize { self.0 as usize }

    /// Increment the index, returning `None` on overflow.
    #[must_use]
    pub fn checked_increment(self) -> Option<Self> { self.0.checked_add(1).map(Self) }
}

impl TryFrom<usize> for FrameIndex {
    type Error = TryFromIntError;

    fn try_from(value: usize) -> Result<Self, Self::Error> { u16::try_from(value).map(Self) }
}

impl From<FrameIndex> for u16 {
    fn from(value: FrameIndex) -> Self { value.0 }
}
