//! Errors raised by [`Receiver`](super::Receiver) operations.

use std::io;

use thiserror::Error;

/// Errors that may occur while setting up or running the receiver.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Binding or configuring the listening socket failed.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),
}
