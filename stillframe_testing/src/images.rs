//! Deterministic image buffers and identifiers.

use bytes::Bytes;
use rstest::fixture;
use stillframe::session::TransmitterId;

/// A buffer of `len` bytes whose value at `i` is `i % 251`.
///
/// The prime modulus keeps every 100-byte chunk distinct, so a misplaced
/// frame shows up as a content mismatch.
#[must_use]
pub fn sample_image(len: usize) -> Bytes {
    (0..len)
        .map(|i| u8::try_from(i % 251).unwrap_or_default())
        .collect::<Vec<_>>()
        .into()
}

/// Build a transmitter id, panicking on invalid input.
///
/// # Panics
///
/// Panics if `name` is not a valid [`TransmitterId`].
#[must_use]
pub fn transmitter(name: &str) -> TransmitterId {
    TransmitterId::new(name).expect("valid transmitter id")
}

/// A 250-byte sample image: three 100-byte chunks with a 50-byte tail.
#[fixture]
pub fn image_250() -> Bytes { sample_image(250) }
