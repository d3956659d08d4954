//! Errors raised on the sending side.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::{
    encoder::EncodeError,
    transport::{HandshakeError, TransportError},
};

/// Errors produced by an [`ImageSource`](super::ImageSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// Reading an image or listing a directory failed.
    #[error("failed to read {path}: {source}", path = path.display())]
    Io {
        /// File or directory being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// The path has no usable file name to announce.
    #[error("{path} has no UTF-8 file name", path = path.display())]
    InvalidName {
        /// Offending path.
        path: PathBuf,
    },
}

/// Errors that abort one image send.
///
/// A failed send never stops the scheduler on its own and is never retried.
#[derive(Debug, Error)]
pub enum SendError {
    /// The image source failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// The image could not be split into frames.
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// The handshake could not be built or written.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    /// Writing frames failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Opening the connection failed.
    #[error("failed to connect: {0}")]
    Connect(#[source] io::Error),
    /// Opening the connection took longer than the configured timeout.
    #[error("connect timed out")]
    ConnectTimeout,
}

/// Errors that end [`TransmissionScheduler::run`](super::TransmissionScheduler::run).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Consecutive send failures reached the configured ceiling.
    #[error("{count} consecutive sends failed; last error: {last}")]
    TooManyFailures {
        /// Failures in a row.
        count: u32,
        /// The most recent failure.
        #[source]
        last: SendError,
    },
}
