//! Runtime control for [`Receiver`].

use std::future::Future;

use log::warn;
use tokio::{
    select,
    signal,
    time::{self, MissedTickBehavior},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

use super::{
    Bound,
    Receiver,
    ReceiverError,
    accept::{AcceptLoopOptions, accept_loop},
    connection::ConnectionContext,
    sink::ImageSink,
};
use crate::session::FinalizeReason;

impl<K: ImageSink> Receiver<K, Bound> {
    /// Run until Ctrl+C is received.
    ///
    /// # Errors
    ///
    /// Accept failures are retried with back-off and do not surface as
    /// errors; the `Result` is kept for symmetry with binding.
    pub async fn run(self) -> Result<(), ReceiverError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run until `shutdown` resolves.
    ///
    /// On shutdown the accept loop stops, open connections finalize their
    /// sessions as [`Shutdown`](crate::session::FinalizeReason::Shutdown),
    /// and the call returns once every connection task has finished.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use stillframe::{
    ///     config::ReceiverConfig,
    ///     receiver::{ChannelSink, Receiver},
    ///     session::SessionRegistry,
    /// };
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), stillframe::receiver::ReceiverError> {
    /// let (sink, _images) = ChannelSink::new(4);
    /// let receiver = Receiver::new(
    ///     ReceiverConfig::default(),
    ///     Arc::new(SessionRegistry::default()),
    ///     sink,
    /// )
    /// .bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(receiver.run_with_shutdown(async {
    ///     let _ = rx.await;
    /// }));
    /// let _ = tx.send(());
    /// handle.await.expect("join receiver task")?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<(), ReceiverError>
    where
        F: Future<Output = ()> + Send,
    {
        let Receiver {
            config,
            registry,
            sink,
            ready_tx,
            state: Bound { listener },
        } = self;
        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let ctx = ConnectionContext {
            registry,
            sink,
            config,
            shutdown: token.clone(),
        };

        info!(addr = ?listener.local_addr().ok(), "receiver listening");
        tracker.spawn(accept_loop(
            listener,
            ctx.clone(),
            AcceptLoopOptions {
                shutdown: token.clone(),
                tracker: tracker.clone(),
                backoff: config.backoff,
            },
        ));
        tracker.spawn(reap_idle_sessions(ctx.clone()));

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => {},
            () = tracker.wait() => {},
        }
        token.cancel();
        tracker.close();
        tracker.wait().await;

        // Connections have drained; anything still registered is orphaned.
        for image in ctx.registry.finalize_all(FinalizeReason::Shutdown) {
            ctx.deliver(image).await;
        }
        info!("receiver stopped");
        Ok(())
    }
}

/// Periodically finalize sessions whose connection went quiet without closing.
pub(in crate::receiver) async fn reap_idle_sessions<K: ImageSink>(ctx: ConnectionContext<K>) {
    let mut ticker = time::interval(ctx.config.sweep_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        select! {
            biased;
            () = ctx.shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        sweep_expired(&ctx, std::time::Instant::now()).await;
    }
}

/// Finalize and deliver every session idle for the inactivity timeout at `now`.
pub(in crate::receiver) async fn sweep_expired<K: ImageSink>(
    ctx: &ConnectionContext<K>,
    now: std::time::Instant,
) -> usize {
    let expired = ctx
        .registry
        .finalize_expired_at(now, ctx.config.inactivity_timeout);
    let count = expired.len();
    for image in expired {
        ctx.deliver(image).await;
    }
    count
}
