//! Crate-wide error type.
//!
//! Every module reports failures through its own `thiserror` enum. [`Error`]
//! wraps them all so applications can use one `?`-friendly type across the
//! sender and the receiver.

use thiserror::Error;

use crate::{
    encoder::EncodeError,
    frame::HeaderError,
    params::{ChunkSizeError, ParamsError},
    receiver::{ReceiverError, SinkError},
    scheduler::{SchedulerError, SendError, SourceError},
    session::{ReassemblyError, TransmitterIdError},
    transport::{HandshakeError, TransportError},
};

/// Top-level error exposed by `stillframe`.
#[derive(Debug, Error)]
pub enum Error {
    /// A frame header could not be decoded.
    #[error(transparent)]
    Header(#[from] HeaderError),
    /// A chunk size was outside the permitted range.
    #[error(transparent)]
    ChunkSize(#[from] ChunkSizeError),
    /// Session parameters were inconsistent.
    #[error(transparent)]
    Params(#[from] ParamsError),
    /// An image could not be split into frames.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// Reading or writing the frame stream failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The session handshake failed.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    /// A frame was refused by its session.
    #[error(transparent)]
    Reassembly(#[from] ReassemblyError),
    /// A transmitter identifier was invalid.
    #[error(transparent)]
    TransmitterId(#[from] TransmitterIdError),
    /// An image source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// A single send failed.
    #[error(transparent)]
    Send(#[from] SendError),
    /// The scheduler gave up.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    /// The receiver could not start.
    #[error(transparent)]
    Receiver(#[from] ReceiverError),
    /// An image sink failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Result alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
