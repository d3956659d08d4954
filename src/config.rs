//! Runtime configuration for the receiver and the sender.
//!
//! Both structs deserialize with `serde` so they can be embedded in a host
//! application's configuration file; every field has a default. Builder-style
//! `with_*` methods clamp durations into sane bounds instead of failing.

use std::{num::NonZeroU32, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    grid::GridPolicy,
    params::ChunkSize,
    receiver::BackoffConfig,
    scheduler::DutyCycle,
};

/// TCP port receivers listen on unless told otherwise.
pub const DEFAULT_PORT: u16 = 49697;

const MIN_TIMEOUT: Duration = Duration::from_millis(1);
const MAX_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(300);
const MAX_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(3600);
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(10);
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Byte written into slots whose frame never arrived.
///
/// # Examples
///
/// ```
/// use stillframe::config::PlaceholderFill;
/// assert_eq!(PlaceholderFill::default().byte(), 0);
/// assert_eq!(PlaceholderFill::new(0x80).byte(), 0x80);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceholderFill(u8);

impl PlaceholderFill {
    /// Use `byte` for every placeholder.
    #[must_use]
    pub const fn new(byte: u8) -> Self { Self(byte) }

    /// The fill byte.
    #[must_use]
    pub const fn byte(self) -> u8 { self.0 }
}

/// Settings for [`Receiver`](crate::receiver::Receiver).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Time allowed for a new connection to deliver its handshake.
    pub handshake_timeout: Duration,
    /// Idle time after the last accepted frame before a session is finalized.
    pub inactivity_timeout: Duration,
    /// Period of the sweep that finalizes sessions left idle.
    pub sweep_interval: Duration,
    /// Fill byte for missing slots.
    pub placeholder: PlaceholderFill,
    /// Accept-loop retry timing.
    pub backoff: BackoffConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            inactivity_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(5),
            placeholder: PlaceholderFill::default(),
            backoff: BackoffConfig::default(),
        }
    }
}

impl ReceiverConfig {
    /// Set the handshake timeout, clamped to `1ms..=300s`.
    #[must_use]
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout.clamp(MIN_TIMEOUT, MAX_HANDSHAKE_TIMEOUT);
        self
    }

    /// Set the inactivity timeout, clamped to `1ms..=1h`.
    #[must_use]
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout.clamp(MIN_TIMEOUT, MAX_INACTIVITY_TIMEOUT);
        self
    }

    /// Set the idle-session sweep period, clamped to `10ms..=1h`.
    #[must_use]
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval.clamp(MIN_SWEEP_INTERVAL, MAX_SWEEP_INTERVAL);
        self
    }

    /// Set the placeholder fill byte.
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: PlaceholderFill) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Set the accept-loop back-off.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff.normalized();
        self
    }

    /// Return a copy with every field inside its permitted range.
    ///
    /// Values read through `serde` bypass the `with_*` clamps; the receiver
    /// calls this before using them.
    #[must_use]
    pub fn normalized(self) -> Self {
        let placeholder = self.placeholder;
        self.with_handshake_timeout(self.handshake_timeout)
            .with_inactivity_timeout(self.inactivity_timeout)
            .with_sweep_interval(self.sweep_interval)
            .with_backoff(self.backoff)
            .with_placeholder(placeholder)
    }
}

/// Settings for the [`TransmissionScheduler`](crate::scheduler::TransmissionScheduler).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Payload bytes per frame.
    pub chunk_size: ChunkSize,
    /// How frames are laid out on the reconstruction grid.
    pub grid_policy: GridPolicy,
    /// Optional ceiling on frames written per second.
    pub frames_per_second: Option<NonZeroU32>,
    /// Time allowed to open a connection to the receiver.
    pub connect_timeout: Duration,
    /// Period between sends in timed mode.
    pub interval: Duration,
    /// Optional active/sleep cycle for timed mode.
    pub duty_cycle: Option<DutyCycle>,
    /// Stop the scheduler after this many failed sends in a row.
    pub max_consecutive_failures: Option<NonZeroU32>,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            chunk_size: ChunkSize::DEFAULT,
            grid_policy: GridPolicy::default(),
            frames_per_second: None,
            connect_timeout: Duration::from_secs(5),
            interval: Duration::from_secs(1),
            duty_cycle: None,
            max_consecutive_failures: None,
        }
    }
}

impl SenderConfig {
    /// Set the chunk size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the grid policy.
    #[must_use]
    pub fn with_grid_policy(mut self, policy: GridPolicy) -> Self {
        self.grid_policy = policy;
        self
    }

    /// Pace frame writes to at most `fps` per second.
    #[must_use]
    pub fn with_frames_per_second(mut self, fps: Option<NonZeroU32>) -> Self {
        self.frames_per_second = fps;
        self
    }

    /// Set the connect timeout, clamped to `1ms..=300s`.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout.clamp(MIN_TIMEOUT, MAX_HANDSHAKE_TIMEOUT);
        self
    }

    /// Set the timed-mode period; zero becomes one millisecond.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_TIMEOUT);
        self
    }

    /// Set the timed-mode duty cycle.
    #[must_use]
    pub fn with_duty_cycle(mut self, duty_cycle: Option<DutyCycle>) -> Self {
        self.duty_cycle = duty_cycle;
        self
    }

    /// Stop after `limit` consecutive failed sends; `None` never stops.
    #[must_use]
    pub fn with_max_consecutive_failures(mut self, limit: Option<NonZeroU32>) -> Self {
        self.max_consecutive_failures = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::rstest;

    use super::{PlaceholderFill, ReceiverConfig, SenderConfig};
    use crate::params::ChunkSize;

    #[test]
    fn receiver_defaults() {
        let cfg = ReceiverConfig::default();
        assert_eq!(cfg.inactivity_timeout, Duration::from_secs(60));
        assert_eq!(cfg.placeholder, PlaceholderFill::new(0));
    }

    #[rstest]
    #[case(Duration::ZERO, Duration::from_millis(1))]
    #[case(Duration::from_secs(10), Duration::from_secs(10))]
    #[case(Duration::from_secs(86_400), Duration::from_secs(3600))]
    fn inactivity_timeout_is_clamped(#[case] input: Duration, #[case] expected: Duration) {
        let cfg = ReceiverConfig::default().with_inactivity_timeout(input);
        assert_eq!(cfg.inactivity_timeout, expected);
    }

    #[test]
    fn normalized_repairs_out_of_range_fields() {
        let cfg = ReceiverConfig {
            handshake_timeout: Duration::ZERO,
            sweep_interval: Duration::ZERO,
            placeholder: PlaceholderFill::new(7),
            ..ReceiverConfig::default()
        }
        .normalized();
        assert_eq!(cfg.handshake_timeout, Duration::from_millis(1));
        assert_eq!(cfg.sweep_interval, Duration::from_millis(10));
        assert_eq!(cfg.placeholder.byte(), 7);
    }

    #[test]
    fn sender_defaults_use_default_chunk() {
        let cfg = SenderConfig::default();
        assert_eq!(cfg.chunk_size, ChunkSize::DEFAULT);
        assert!(cfg.frames_per_second.is_none());
        assert_eq!(
            SenderConfig::default()
                .with_interval(Duration::ZERO)
                .interval,
            Duration::from_millis(1)
        );
    }
}
