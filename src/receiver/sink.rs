//! Downstream consumers of finalized images.

use std::{io, path::PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::session::FinalizedImage;

/// Errors raised while handing an image downstream.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The receiving half of a [`ChannelSink`] was dropped.
    #[error("image channel closed")]
    Closed,
    /// A name cannot be used as a single path component.
    #[error("`{0}` is not a safe file name")]
    UnsafeName(String),
    /// Writing the image failed.
    #[error("failed to write {path}: {source}", path = path.display())]
    Io {
        /// Destination being written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Receives every image the receiver finalizes, complete or not.
///
/// Implementations hand the buffer to the codec or storage layer. A failure
/// is logged by the receiver and the image is dropped.
#[async_trait]
pub trait ImageSink: Send + Sync + 'static {
    /// Take ownership of a finalized image.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the image cannot be stored or forwarded.
    async fn deliver(&self, image: FinalizedImage) -> Result<(), SinkError>;
}

/// Forwards images over a bounded channel.
///
/// # Examples
///
/// ```
/// use stillframe::receiver::ChannelSink;
///
/// let (sink, mut images) = ChannelSink::new(8);
/// drop(sink);
/// assert!(images.try_recv().is_err());
/// ```
#[derive(Clone, Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<FinalizedImage>,
}

impl ChannelSink {
    /// Create a sink and the receiver its images arrive on.
    ///
    /// A `capacity` of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FinalizedImage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl ImageSink for ChannelSink {
    async fn deliver(&self, image: FinalizedImage) -> Result<(), SinkError> {
        self.tx.send(image).await.map_err(|_| SinkError::Closed)
    }
}

/// Writes each image to `<root>/<transmitter>/images/<image_name>`.
///
/// Files are overwritten when a transmitter reuses an image name.
#[derive(Clone, Debug)]
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    /// Store images under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    /// Directory images are written under.
    #[must_use]
    pub fn root(&self) -> &std::path::Path { &self.root }

    /// Destination path for `image`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::UnsafeName`] when the transmitter id or image
    /// name would escape its directory.
    pub fn path_for(&self, image: &FinalizedImage) -> Result<PathBuf, SinkError> {
        let transmitter = path_component(image.transmitter().as_str())?;
        let name = path_component(image.image_name())?;
        Ok(self.root.join(transmitter).join("images").join(name))
    }
}

#[async_trait]
impl ImageSink for DirectorySink {
    async fn deliver(&self, image: FinalizedImage) -> Result<(), SinkError> {
        let path = self.path_for(&image)?;
        let io_err = |source| SinkError::Io {
            path: path.clone(),
            source,
        };
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await.map_err(io_err)?;
        }
        tokio::fs::write(&path, image.buffer())
            .await
            .map_err(io_err)
    }
}

fn path_component(name: &str) -> Result<&str, SinkError> {
    let unsafe_name = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if unsafe_name {
        return Err(SinkError::UnsafeName(name.to_owned()));
    }
    Ok(name)
}
