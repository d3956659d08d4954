//! Tokio-based receiver that turns incoming connections into images.
//!
//! [`Receiver`] accepts TCP connections, reads one session from each, and
//! hands every finalized image to an [`ImageSink`]. Sessions are tracked in a
//! shared [`SessionRegistry`]; a background sweep finalizes any session left
//! idle past the inactivity timeout.
//!
//! The receiver carries a typestate `S`: it starts [`Unbound`] and must be
//! bound to a listener before it can run.

use std::{
    net::{SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use tokio::{net::TcpListener, sync::oneshot};

use crate::{config::ReceiverConfig, session::SessionRegistry};

mod accept;
pub mod backoff;
mod connection;
pub mod error;
mod runtime;
pub mod sink;

pub use backoff::BackoffConfig;
pub use error::ReceiverError;
pub use sink::{ChannelSink, DirectorySink, ImageSink, SinkError};

/// Listens for transmitters and reassembles their images.
pub struct Receiver<K, S = Unbound>
where
    K: ImageSink,
    S: ReceiverState,
{
    config: ReceiverConfig,
    registry: Arc<SessionRegistry>,
    sink: Arc<K>,
    ready_tx: Option<oneshot::Sender<()>>,
    state: S,
}

/// Marker for a receiver that has no listener yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker for a receiver bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    listener: Arc<TcpListener>,
}

/// Implemented by [`Unbound`] and [`Bound`].
pub trait ReceiverState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ReceiverState`](super::ReceiverState).

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ReceiverState for Unbound {}
impl ReceiverState for Bound {}

impl<K: ImageSink> Receiver<K, Unbound> {
    /// Create a receiver delivering images to `sink`.
    ///
    /// `config` is normalized before use.
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
    ///
    /// let (sink, _images) = ChannelSink::new(4);
    /// let receiver = Receiver::new(
    ///     ReceiverConfig::default(),
    ///     Arc::new(SessionRegistry::default()),
    ///     sink,
    /// );
    /// assert!(receiver.local_addr().is_none());
    /// ```
    #[must_use]
    pub fn new(config: ReceiverConfig, registry: Arc<SessionRegistry>, sink: K) -> Self {
        Self {
            config: config.normalized(),
            registry,
            sink: Arc::new(sink),
            ready_tx: None,
            state: Unbound,
        }
    }

    /// Return `None` as the receiver is not bound.
    #[must_use]
    pub const fn local_addr(&self) -> Option<SocketAddr> { None }

    /// Bind to `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::Bind`] if binding or configuring the listener
    /// fails.
    pub fn bind(self, addr: SocketAddr) -> Result<Receiver<K, Bound>, ReceiverError> {
        let std_listener = StdTcpListener::bind(addr).map_err(ReceiverError::Bind)?;
        self.bind_existing_listener(std_listener)
    }

    /// Adopt an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`ReceiverError::Bind`] if the listener cannot be registered
    /// with the runtime.
    pub fn bind_existing_listener(
        self,
        std_listener: StdTcpListener,
    ) -> Result<Receiver<K, Bound>, ReceiverError> {
        std_listener
            .set_nonblocking(true)
            .map_err(ReceiverError::Bind)?;
        let listener = TcpListener::from_std(std_listener).map_err(ReceiverError::Bind)?;
        let Self {
            config,
            registry,
            sink,
            ready_tx,
            ..
        } = self;
        Ok(Receiver {
            config,
            registry,
            sink,
            ready_tx,
            state: Bound {
                listener: Arc::new(listener),
            },
        })
    }
}

impl<K: ImageSink> Receiver<K, Bound> {
    /// Address the listener is bound to, or `None` if it cannot be read.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> { self.state.listener.local_addr().ok() }
}

impl<K, S> Receiver<K, S>
where
    K: ImageSink,
    S: ReceiverState,
{
    /// Notify `tx` once the receiver has started accepting connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Effective configuration.
    #[must_use]
    pub const fn config(&self) -> &ReceiverConfig { &self.config }

    /// Registry shared by all connections.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> { &self.registry }
}

impl<K, S> std::fmt::Debug for Receiver<K, S>
where
    K: ImageSink,
    S: ReceiverState + std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("config", &self.config)
            .field("sessions", &self.registry.len())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
