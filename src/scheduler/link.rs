//! One-connection-per-image delivery.
//!
//! Every send opens a fresh connection through a [`Connector`], writes the
//! handshake followed by every frame in `frame_index` order, and closes the
//! connection. Cancellation is honoured between frames only, so a frame is
//! either written whole or not at all.

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use futures::SinkExt;
use leaky_bucket::RateLimiter;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tokio_util::{codec::FramedWrite, sync::CancellationToken};
use tracing::debug;

use super::SendError;
use crate::{
    encoder::FrameSequence,
    metrics::{self, Direction},
    transport::{FrameCodec, Handshake, write_handshake},
};

/// Opens the byte stream an image is written to.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Stream type produced by [`connect`](Self::connect).
    type Stream: AsyncWrite + Unpin + Send;

    /// Open a new stream to the receiver.
    ///
    /// # Errors
    ///
    /// Returns any I/O error raised while connecting.
    async fn connect(&self) -> io::Result<Self::Stream>;
}

/// Connects to a receiver over TCP.
#[derive(Clone, Copy, Debug)]
pub struct TcpConnector {
    addr: SocketAddr,
}

impl TcpConnector {
    /// Connect to `addr` for every send.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self { Self { addr } }

    /// Receiver address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr { self.addr }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// How a session write ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Every frame was written and the stream closed.
    Sent {
        /// Frames written.
        frames: usize,
    },
    /// Cancellation arrived between frames.
    Cancelled {
        /// Frames written before cancellation.
        sent: usize,
        /// Frames in the session.
        total: usize,
    },
}

/// Write one session to `stream`: handshake, then frames in order.
///
/// When `limiter` is set, each frame waits for one token first.
///
/// # Errors
///
/// Returns [`SendError`] if the handshake or any frame cannot be written.
pub async fn send_session<W>(
    mut stream: W,
    handshake: &Handshake,
    sequence: FrameSequence,
    limiter: Option<&RateLimiter>,
    cancel: &CancellationToken,
) -> Result<SendOutcome, SendError>
where
    W: AsyncWrite + Unpin,
{
    write_handshake(&mut stream, handshake).await?;

    let total = sequence.len();
    let mut sink = FramedWrite::new(stream, FrameCodec::new(sequence.params()));
    for (sent, frame) in sequence.into_iter().enumerate() {
        if cancel.is_cancelled() {
            debug!(sent, total, "send cancelled between frames");
            if let Err(err) = sink.get_mut().shutdown().await {
                debug!(error = %err, "closing cancelled send failed");
            }
            return Ok(SendOutcome::Cancelled { sent, total });
        }
        if let Some(limiter) = limiter {
            limiter.acquire(1).await;
        }
        sink.send(frame).await?;
        metrics::inc_frames(Direction::Outbound);
    }
    sink.close().await?;
    Ok(SendOutcome::Sent { frames: total })
}
