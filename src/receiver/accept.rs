//! Accept loop feeding connection tasks.

use std::{io, net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{
    backoff::BackoffConfig,
    connection::{ConnectionContext, spawn_connection_task},
    sink::ImageSink,
};

/// Source of incoming connections consumed by the accept loop.
///
/// Dropping a pending `accept()` future must not leak resources.
#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub(in crate::receiver) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

#[derive(Debug)]
pub(in crate::receiver) struct AcceptLoopOptions {
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
    pub backoff: BackoffConfig,
}

/// Accept connections until `options.shutdown` fires.
///
/// Each accepted stream gets its own task on `options.tracker`. Accept
/// failures are logged and retried after an exponentially growing delay.
pub(in crate::receiver) async fn accept_loop<K, L>(
    listener: Arc<L>,
    ctx: ConnectionContext<K>,
    options: AcceptLoopOptions,
) where
    K: ImageSink,
    L: AcceptListener + 'static,
{
    let AcceptLoopOptions {
        shutdown,
        tracker,
        backoff,
    } = options;
    let backoff = backoff.normalized();
    let mut delay = backoff.initial_delay;
    while let Some(next) =
        accept_iteration(&*listener, &ctx, &shutdown, &tracker, &backoff, delay).await
    {
        delay = next;
    }
}

async fn accept_iteration<K, L>(
    listener: &L,
    ctx: &ConnectionContext<K>,
    shutdown: &CancellationToken,
    tracker: &TaskTracker,
    backoff: &BackoffConfig,
    delay: Duration,
) -> Option<Duration>
where
    K: ImageSink,
    L: AcceptListener,
{
    select! {
        biased;

        () = shutdown.cancelled() => None,
        res = listener.accept() => Some(match res {
            Ok((stream, peer_addr)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    warn!("failed to disable Nagle: error={e}, peer_addr={peer_addr}");
                }
                spawn_connection_task(stream, Some(peer_addr), ctx.clone(), tracker);
                backoff.initial_delay
            }
            Err(e) => {
                let local_addr = listener.local_addr().ok();
                warn!("accept error: error={e:?}, local_addr={local_addr:?}");
                select! {
                    biased;
                    () = shutdown.cancelled() => return None,
                    () = sleep(delay) => {}
                }
                backoff.next_delay(delay)
            }
        }),
    }
}
