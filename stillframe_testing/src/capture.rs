//! A connector that records what a sender writes.

use std::io;

use async_trait::async_trait;
use stillframe::scheduler::Connector;
use tokio::{
    io::{AsyncReadExt, DuplexStream},
    sync::mpsc,
};

/// Hands the sender one in-memory pipe per send and forwards everything
/// written to it, one `Vec<u8>` per connection, once the sender closes.
#[derive(Clone, Debug)]
pub struct CapturingConnector {
    sessions: mpsc::UnboundedSender<Vec<u8>>,
}

impl CapturingConnector {
    /// Create a connector and the receiver its captured sessions arrive on.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sessions: tx }, rx)
    }
}

#[async_trait]
impl Connector for CapturingConnector {
    type Stream = DuplexStream;

    async fn connect(&self) -> io::Result<DuplexStream> {
        let (client, mut server) = tokio::io::duplex(64 * 1024);
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            let mut buf = Vec::new();
            if server.read_to_end(&mut buf).await.is_ok() {
                let _ = sessions.send(buf);
            }
        });
        Ok(client)
    }
}
