#![doc(html_root_url = "https://docs.rs/stillframe/latest")]
//! Public API for the `stillframe` library.
//!
//! `stillframe` moves one compressed still image per session over a plain
//! byte stream. The sender splits the image into fixed-size frames, each
//! behind a 10-byte header; the receiver rebuilds the buffer in frame-index
//! order and fills any frame that never arrived with placeholder bytes.
//!
//! - [`encoder`] splits buffers into [`frame::Frame`]s.
//! - [`transport`] carries the session handshake and frames over a stream.
//! - [`session`] reassembles frames and tracks one session per transmitter.
//! - [`scheduler`] decides when the sender transmits.
//! - [`receiver`] accepts connections and hands finished images downstream.

pub mod byte_order;
pub mod config;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod grid;
pub mod metrics;
pub mod panic;
pub mod params;
pub mod receiver;
pub mod scheduler;
pub mod session;
pub mod transport;

pub use config::{DEFAULT_PORT, PlaceholderFill, ReceiverConfig, SenderConfig};
pub use encoder::{FrameEncoder, FrameSequence};
pub use error::{Error, Result};
pub use frame::{Frame, FrameHeader, FrameIndex};
pub use params::{ChunkSize, SessionParams};
pub use receiver::{ImageSink, Receiver};
pub use scheduler::{ImageSource, TransmissionScheduler};
pub use session::{FinalizeReason, FinalizedImage, SessionRegistry, TransmitterId};
