//! Metric helpers for `stillframe`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. With the `metrics` feature
//! disabled every helper compiles to a no-op.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking open receiver connections.
pub const CONNECTIONS_ACTIVE: &str = "stillframe_connections_active";
/// Name of the counter tracking frames by direction.
pub const FRAMES_PROCESSED: &str = "stillframe_frames_processed_total";
/// Name of the counter tracking duplicate frames dropped by the reassembler.
pub const FRAMES_DUPLICATE: &str = "stillframe_frames_duplicate_total";
/// Name of the counter tracking frames rejected for a session mismatch.
pub const FRAMES_REJECTED: &str = "stillframe_frames_rejected_total";
/// Name of the counter tracking slots filled with placeholder bytes.
pub const PLACEHOLDER_SLOTS: &str = "stillframe_placeholder_slots_total";
/// Name of the counter tracking headers whose grid cell disagrees with their index.
pub const GRID_MISMATCHES: &str = "stillframe_grid_mismatches_total";
/// Name of the counter tracking finalized sessions by reason.
pub const SESSIONS_FINALIZED: &str = "stillframe_sessions_finalized_total";
/// Name of the counter tracking panics in connection tasks.
pub const CONNECTION_PANICS: &str = "stillframe_connection_panics_total";
/// Name of the counter tracking failed image sends.
pub const SEND_FAILURES: &str = "stillframe_send_failures_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames read from a transmitter.
    Inbound,
    /// Frames written to a receiver.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), expect(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a processed frame for the given direction.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables))]
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
}

/// Record a duplicate frame.
pub fn inc_duplicates() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_DUPLICATE).increment(1);
}

/// Record a frame rejected by the reassembler.
pub fn inc_rejected() {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_REJECTED).increment(1);
}

/// Record a header whose row and column disagree with its index.
pub fn inc_grid_mismatches() {
    #[cfg(feature = "metrics")]
    counter!(GRID_MISMATCHES).increment(1);
}

/// Record `slots` placeholder-filled slots.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables))]
pub fn add_placeholders(slots: usize) {
    #[cfg(feature = "metrics")]
    counter!(PLACEHOLDER_SLOTS).increment(u64::try_from(slots).unwrap_or(u64::MAX));
}

/// Record a finalized session, labelled by why it ended.
#[cfg_attr(not(feature = "metrics"), expect(unused_variables))]
pub fn inc_finalized(reason: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(SESSIONS_FINALIZED, "reason" => reason).increment(1);
}

/// Record a failed image send.
pub fn inc_send_failures() {
    #[cfg(feature = "metrics")]
    counter!(SEND_FAILURES).increment(1);
}

/// Record a panic caught in a connection task.
pub fn inc_connection_panics() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTION_PANICS).increment(1);
}
