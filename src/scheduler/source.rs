//! Upstream collaborators that supply already-encoded image bytes.

use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use bytes::Bytes;

use super::SourceError;

/// One image ready to send: a name for the receiver and opaque bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceImage {
    name: String,
    bytes: Bytes,
}

impl SourceImage {
    /// Wrap `bytes` under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Name announced in the handshake.
    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// The encoded image.
    #[must_use]
    pub fn bytes(&self) -> &Bytes { &self.bytes }

    /// Consume the image, returning its parts.
    #[must_use]
    pub fn into_parts(self) -> (String, Bytes) { (self.name, self.bytes) }
}

/// Yields the next image to send.
#[async_trait]
pub trait ImageSource: Send {
    /// Produce the next image, or `None` when the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the image cannot be produced. The
    /// scheduler logs the failure and waits for the next trigger.
    async fn next_image(&mut self) -> Result<Option<SourceImage>, SourceError>;
}

/// In-memory images, sent once in order or cycled forever.
#[derive(Clone, Debug, Default)]
pub struct StaticSource {
    images: VecDeque<SourceImage>,
    cycle: bool,
}

impl StaticSource {
    /// Send each image once.
    #[must_use]
    pub fn new(images: impl IntoIterator<Item = SourceImage>) -> Self {
        Self {
            images: images.into_iter().collect(),
            cycle: false,
        }
    }

    /// Repeat the images indefinitely.
    #[must_use]
    pub fn cycling(images: impl IntoIterator<Item = SourceImage>) -> Self {
        Self {
            cycle: true,
            ..Self::new(images)
        }
    }
}

#[async_trait]
impl ImageSource for StaticSource {
    async fn next_image(&mut self) -> Result<Option<SourceImage>, SourceError> {
        let next = self.images.pop_front();
        if self.cycle
            && let Some(image) = &next
        {
            self.images.push_back(image.clone());
        }
        Ok(next)
    }
}

/// Re-reads one file on every trigger.
///
/// Suits a capture process that keeps overwriting the same file. Each send is
/// named `<stem>_<n>.<ext>` with a running counter so the receiver keeps every
/// image.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
    stem: String,
    extension: Option<String>,
    sent: u64,
}

impl FileSource {
    /// Read images from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidName`] when `path` has no UTF-8 file stem.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| SourceError::InvalidName { path: path.clone() })?
            .to_owned();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_owned);
        Ok(Self {
            path,
            stem,
            extension,
            sent: 0,
        })
    }
}

#[async_trait]
impl ImageSource for FileSource {
    async fn next_image(&mut self) -> Result<Option<SourceImage>, SourceError> {
        let bytes = read(&self.path).await?;
        self.sent += 1;
        let name = match &self.extension {
            Some(ext) => format!("{}_{:04}.{ext}", self.stem, self.sent),
            None => format!("{}_{:04}", self.stem, self.sent),
        };
        Ok(Some(SourceImage::new(name, bytes)))
    }
}

/// Sends every regular file in a directory once, in file-name order.
#[derive(Debug)]
pub struct DirectorySource {
    dir: PathBuf,
    queue: Option<VecDeque<PathBuf>>,
}

impl DirectorySource {
    /// Queue the files in `dir`. The listing is taken on the first send.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            queue: None,
        }
    }

    async fn list(&self) -> Result<VecDeque<PathBuf>, SourceError> {
        let io_err = |source| SourceError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(io_err)?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            if entry.file_type().await.map_err(io_err)?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files.into())
    }
}

#[async_trait]
impl ImageSource for DirectorySource {
    async fn next_image(&mut self) -> Result<Option<SourceImage>, SourceError> {
        if self.queue.is_none() {
            self.queue = Some(self.list().await?);
        }
        let Some(path) = self.queue.as_mut().and_then(VecDeque::pop_front) else {
            return Ok(None);
        };
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SourceError::InvalidName { path: path.clone() })?
            .to_owned();
        Ok(Some(SourceImage::new(name, read(&path).await?)))
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, SourceError> {
    tokio::fs::read(path).await.map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })
}
