//! Helpers for explicit little-endian wire conversions.
//!
//! Every multi-byte integer on the `stillframe` wire is little-endian. These
//! helpers keep Clippy expectations scoped to the conversion points so frame
//! and handshake code can stay explicit about endianness without repeating
//! lint annotations.

/// Serialise a `u16` in wire byte order (little-endian).
///
/// # Examples
///
/// ```
/// use stillframe::byte_order::write_wire_u16;
///
/// assert_eq!(write_wire_u16(0x1234), [0x34, 0x12]);
/// ```
#[must_use]
pub fn write_wire_u16(value: u16) -> [u8; 2] {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The frame wire format is little-endian."
    )]
    value.to_le_bytes()
}

/// Parse a wire-order `u16` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use stillframe::byte_order::read_wire_u16;
///
/// assert_eq!(read_wire_u16([0x34, 0x12]), 0x1234);
/// ```
#[must_use]
pub fn read_wire_u16(bytes: [u8; 2]) -> u16 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The frame wire format is little-endian."
    )]
    u16::from_le_bytes(bytes)
}

/// Serialise a `u32` in wire byte order (little-endian).
///
/// # Examples
///
/// ```
/// use stillframe::byte_order::write_wire_u32;
///
/// assert_eq!(write_wire_u32(0x1234_5678), [0x78, 0x56, 0x34, 0x12]);
/// ```
#[must_use]
pub fn write_wire_u32(value: u32) -> [u8; 4] {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The frame wire format is little-endian."
    )]
    value.to_le_bytes()
}

/// Parse a wire-order `u32` from its on-wire representation.
///
/// # Examples
///
/// ```
/// use stillframe::byte_order::read_wire_u32;
///
/// assert_eq!(read_wire_u32([0x78, 0x56, 0x34, 0x12]), 0x1234_5678);
/// ```
#[must_use]
pub fn read_wire_u32(bytes: [u8; 4]) -> u32 {
    #[expect(
        clippy::little_endian_bytes,
        reason = "The frame wire format is little-endian."
    )]
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    //! Round-trip tests for wire byte-order conversion helpers.

    use rstest::rstest;

    use super::{read_wire_u16, read_wire_u32, write_wire_u16, write_wire_u32};

    /// Verify that each wire-order write/read pair round-trips correctly.
    #[rstest]
    #[case::u16(
        0x1234u64,
        &write_wire_u16(0x1234)[..],
        &[0x34, 0x12],
        u64::from(read_wire_u16([0x34, 0x12]))
    )]
    #[case::u32(
        0x1234_5678u64,
        &write_wire_u32(0x1234_5678)[..],
        &[0x78, 0x56, 0x34, 0x12],
        u64::from(read_wire_u32([0x78, 0x56, 0x34, 0x12]))
    )]
    fn wire_byte_order_round_trip(
        #[case] value: u64,
        #[case] written: &[u8],
        #[case] expected_bytes: &[u8],
        #[case] read_back: u64,
    ) {
        assert_eq!(written, expected_bytes);
        assert_eq!(read_back, value);
    }
}
