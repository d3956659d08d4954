//! Transmitter identity used to scope reassembly sessions.

use std::{fmt, sync::Arc};

use thiserror::Error;

/// Maximum encoded length of a transmitter identifier in bytes.
pub const MAX_TRANSMITTER_ID_LEN: usize = 50;

/// Reasons a string cannot serve as a [`TransmitterId`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransmitterIdError {
    /// Identifiers must not be empty.
    #[error("transmitter id must not be empty")]
    Empty,
    /// Identifiers must fit the fixed handshake field.
    #[error("transmitter id is {len} bytes; at most {max} allowed", max = MAX_TRANSMITTER_ID_LEN)]
    TooLong {
        /// Encoded length of the rejected identifier.
        len: usize,
    },
    /// NUL bytes are reserved for handshake padding.
    #[error("transmitter id must not contain NUL bytes")]
    ContainsNul,
}

/// Opaque, stable token naming one transmitter.
///
/// Cloning is cheap; the string is shared.
///
/// # Examples
///
/// ```
/// use stillframe::session::TransmitterId;
/// let id = TransmitterId::new("TX1").unwrap();
/// assert_eq!(id.as_str(), "TX1");
/// assert!(TransmitterId::new("").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransmitterId(Arc<str>);

impl TransmitterId {
    /// Validate and wrap an identifier.
    ///
    /// # Errors
    ///
    /// Returns [`TransmitterIdError`] when `id` is empty, longer than
    /// [`MAX_TRANSMITTER_ID_LEN`] bytes, or contains a NUL byte.
    pub fn new(id: impl AsRef<str>) -> Result<Self, TransmitterIdError> {
        let id = id.as_ref();
        if id.is_empty() {
            return Err(TransmitterIdError::Empty);
        }
        if id.len() > MAX_TRANSMITTER_ID_LEN {
            return Err(TransmitterIdError::TooLong { len: id.len() });
        }
        if id.contains('\0') {
            return Err(TransmitterIdError::ContainsNul);
        }
        Ok(Self(Arc::from(id)))
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for TransmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

impl fmt::Debug for TransmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransmitterId({:?})", &*self.0)
    }
}

impl TryFrom<&str> for TransmitterId {
    type Error = TransmitterIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> { Self::new(value) }
}
