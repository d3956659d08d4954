//! Shared utilities for integration tests.
//!
//! Starts a receiver on an ephemeral localhost port with a channel sink so
//! tests can connect real TCP streams and inspect the images it delivers.

// Items in this shared module may not be used by all test binaries that import it.
#![allow(
    dead_code,
    reason = "shared test utilities are not used by all test binaries"
)]

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use rstest::fixture;
use stillframe::{
    config::ReceiverConfig,
    receiver::{ChannelSink, Receiver},
    session::{FinalizedImage, SessionRegistry},
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Create a TCP listener bound to a free local port.
#[fixture]
pub fn unused_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("failed to bind port")
}

/// A receiver running on its own task.
pub struct RunningReceiver {
    pub addr: SocketAddr,
    pub registry: Arc<SessionRegistry>,
    pub images: mpsc::Receiver<FinalizedImage>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RunningReceiver {
    /// Bind `listener` and run a receiver with `config` until [`stop`](Self::stop).
    pub async fn start(listener: StdTcpListener, config: ReceiverConfig) -> TestResult<Self> {
        let registry = Arc::new(SessionRegistry::new(config.placeholder));
        let (sink, images) = ChannelSink::new(16);
        let (ready_tx, ready_rx) = oneshot::channel();
        let receiver = Receiver::new(config, Arc::clone(&registry), sink)
            .ready_signal(ready_tx)
            .bind_existing_listener(listener)?;
        let addr = receiver.local_addr().ok_or("receiver has no address")?;

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            let _ = receiver
                .run_with_shutdown(async {
                    let _ = rx.await;
                })
                .await;
        });
        ready_rx.await?;
        Ok(Self {
            addr,
            registry,
            images,
            shutdown: Some(tx),
            handle,
        })
    }

    /// Wait for the next delivered image.
    pub async fn next_image(&mut self) -> TestResult<FinalizedImage> {
        let image = tokio::time::timeout(std::time::Duration::from_secs(5), self.images.recv())
            .await?
            .ok_or("sink closed")?;
        Ok(image)
    }

    /// Signal shutdown and wait for the receiver to finish.
    pub async fn stop(mut self) -> TestResult {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await?;
        Ok(())
    }

    /// Shut down and collect every image delivered from then on.
    pub async fn stop_and_drain(mut self) -> TestResult<Vec<FinalizedImage>> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await?;
        let mut drained = Vec::new();
        while let Some(image) = self.images.recv().await {
            drained.push(image);
        }
        Ok(drained)
    }
}
