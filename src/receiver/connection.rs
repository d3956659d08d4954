//! Per-connection session handling.

use std::{net::SocketAddr, sync::Arc};

use futures::{FutureExt, StreamExt};
use log::error;
use tokio::{
    io::AsyncRead,
    select,
    time::{Instant, timeout, timeout_at},
};
use tokio_util::{codec::FramedRead, sync::CancellationToken, task::TaskTracker};
use tracing::{debug, warn};

use super::sink::ImageSink;
use crate::{
    config::ReceiverConfig,
    metrics::{self, Direction},
    session::{FinalizeReason, FinalizedImage, ReassemblyError, SessionHandle, SessionRegistry},
    transport::{FrameCodec, TransportError, read_handshake},
};

/// Shared state handed to every connection task.
pub(in crate::receiver) struct ConnectionContext<K> {
    pub registry: Arc<SessionRegistry>,
    pub sink: Arc<K>,
    pub config: ReceiverConfig,
    pub shutdown: CancellationToken,
}

impl<K> Clone for ConnectionContext<K> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            sink: Arc::clone(&self.sink),
            config: self.config,
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<K: ImageSink> ConnectionContext<K> {
    /// Hand `image` to the sink, logging a failure.
    pub async fn deliver(&self, image: FinalizedImage) {
        let transmitter = image.transmitter().clone();
        let name = image.image_name().to_owned();
        if let Err(err) = self.sink.deliver(image).await {
            warn!(%transmitter, image = %name, error = %err, "image sink rejected image");
        }
    }
}

/// Spawn a task that handles one connection, logging and discarding any panic.
pub(in crate::receiver) fn spawn_connection_task<S, K>(
    stream: S,
    peer_addr: Option<SocketAddr>,
    ctx: ConnectionContext<K>,
    tracker: &TaskTracker,
) where
    S: AsyncRead + Unpin + Send + 'static,
    K: ImageSink,
{
    tracker.spawn(async move {
        metrics::inc_connections();
        let fut =
            std::panic::AssertUnwindSafe(process_stream(stream, peer_addr, &ctx)).catch_unwind();
        let outcome = fut.await;
        metrics::dec_connections();

        if let Err(panic) = outcome {
            metrics::inc_connection_panics();
            let panic_msg = crate::panic::format_panic(panic);
            error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr:?}");
            tracing::error!(panic = %panic_msg, ?peer_addr, "connection task panicked");
        }
    });
}

/// Read one session from `stream` and deliver what was reassembled.
///
/// The handshake must arrive within `handshake_timeout`. Afterwards each
/// accepted frame re-arms the `inactivity_timeout` deadline. The session is
/// finalized when the last slot fills, the deadline passes, the stream ends
/// or breaks, or the receiver shuts down.
pub(in crate::receiver) async fn process_stream<S, K>(
    mut stream: S,
    peer_addr: Option<SocketAddr>,
    ctx: &ConnectionContext<K>,
) where
    S: AsyncRead + Unpin,
    K: ImageSink,
{
    let handshake = match timeout(ctx.config.handshake_timeout, read_handshake(&mut stream)).await
    {
        Ok(Ok(handshake)) => handshake,
        Ok(Err(err)) => {
            warn!(?peer_addr, error = %err, "handshake rejected");
            return;
        }
        Err(_) => {
            warn!(?peer_addr, timeout = ?ctx.config.handshake_timeout, "handshake timed out");
            return;
        }
    };
    debug!(
        ?peer_addr,
        transmitter = %handshake.transmitter(),
        image = handshake.image_name(),
        total_frames = handshake.params().total_frames(),
        "handshake accepted"
    );

    // Every handshake gets its own session, even while an earlier transfer
    // from the same transmitter is still being read.
    let handle = ctx.registry.begin(
        handshake.transmitter(),
        handshake.params(),
        handshake.grid(),
        handshake.image_name(),
    );
    if handle.is_complete() {
        // Nothing to wait for: the image is empty.
        finish(&handle, FinalizeReason::Complete, ctx).await;
        return;
    }

    let mut frames = FramedRead::new(stream, FrameCodec::new(handshake.params()));
    let mut deadline = Instant::now() + ctx.config.inactivity_timeout;
    let reason = loop {
        let next = select! {
            biased;
            () = ctx.shutdown.cancelled() => break FinalizeReason::Shutdown,
            next = timeout_at(deadline, frames.next()) => next,
        };
        let frame = match next {
            Err(_) => break FinalizeReason::InactivityTimeout,
            Ok(None) => break FinalizeReason::ConnectionClosed,
            Ok(Some(Err(err))) => break reason_for(&err, &handle),
            Ok(Some(Ok(frame))) => frame,
        };
        metrics::inc_frames(Direction::Inbound);

        match ctx.registry.accept(&handle, frame) {
            Ok(Some(image)) => {
                ctx.deliver(image).await;
                return;
            }
            Ok(None) => deadline = Instant::now() + ctx.config.inactivity_timeout,
            Err(ReassemblyError::SessionFinalized) => {
                debug!(transmitter = %handle.transmitter(), "session ended elsewhere; closing");
                return;
            }
            Err(err) => debug!(transmitter = %handle.transmitter(), error = %err, "frame dropped"),
        }
    };
    finish(&handle, reason, ctx).await;
}

async fn finish<K: ImageSink>(
    handle: &SessionHandle,
    reason: FinalizeReason,
    ctx: &ConnectionContext<K>,
) {
    match ctx.registry.finalize(handle, reason) {
        Ok(image) => ctx.deliver(image).await,
        Err(err) => debug!(transmitter = %handle.transmitter(), error = %err, "session already finalized"),
    }
}

fn reason_for(err: &TransportError, handle: &SessionHandle) -> FinalizeReason {
    warn!(transmitter = %handle.transmitter(), error = %err, "frame stream failed");
    match err {
        TransportError::TruncatedFrame { .. } => FinalizeReason::Truncated,
        TransportError::Desync(_) | TransportError::PayloadLength { .. } => FinalizeReason::Desync,
        TransportError::Io(_) => FinalizeReason::ConnectionClosed,
    }
}
