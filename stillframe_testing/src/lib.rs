//! Helpers for exercising `stillframe` senders and receivers in tests.
//!
//! - [`images`] builds deterministic image buffers.
//! - [`wire`] renders and parses the on-the-wire form of a session.
//! - [`capture`] provides a [`Connector`](stillframe::scheduler::Connector)
//!   that records everything a sender writes.
//!
//! ```rust
//! use stillframe_testing::{images::sample_image, wire::{parse_session, session_bytes}};
//!
//! let bytes = session_bytes("TX1", "a.jpg", &sample_image(250), &[2, 0, 1]);
//! let (handshake, frames) = parse_session(&bytes);
//! assert_eq!(handshake.image_name(), "a.jpg");
//! assert_eq!(frames.len(), 3);
//! ```

pub mod capture;
pub mod images;
pub mod wire;

pub use capture::CapturingConnector;
pub use images::{sample_image, transmitter};
pub use wire::{parse_session, session_bytes, write_session};
