//! Fixed-size preamble that opens every session on the wire.
//!
//! The handshake names the transmitter and the image and fixes the session
//! parameters before the first frame, so the receiver can derive every
//! frame's payload length. It is encoded with bincode using little-endian
//! fixed-width integers, giving a constant [`HANDSHAKE_LEN`]-byte layout:
//!
//! ```text
//! 0..50     transmitter id  NUL-padded UTF-8
//! 50..150   image name      NUL-padded UTF-8
//! 150..152  chunk_size      u16
//! 152..154  total_frames    u16
//! 154..158  total_length    u32
//! 158       grid rows       u8
//! 159       grid cols       u8
//! ```

use bincode::{Decode, Encode, config, decode_from_slice, encode_to_vec};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::HandshakeError;
use crate::{
    grid::GridShape,
    params::{ChunkSize, SessionParams},
    session::{MAX_TRANSMITTER_ID_LEN, TransmitterId},
};

/// Maximum encoded length of an image name in bytes.
pub const MAX_IMAGE_NAME_LEN: usize = 100;

/// Encoded size of a [`Handshake`] in bytes.
pub const HANDSHAKE_LEN: usize = MAX_TRANSMITTER_ID_LEN + MAX_IMAGE_NAME_LEN + 2 + 2 + 4 + 1 + 1;

#[derive(Encode, Decode)]
struct WireHandshake {
    transmitter: [u8; MAX_TRANSMITTER_ID_LEN],
    image_name: [u8; MAX_IMAGE_NAME_LEN],
    chunk_size: u16,
    total_frames: u16,
    total_length: u32,
    rows: u8,
    cols: u8,
}

fn wire_config() -> impl config::Config {
    config::standard()
        .with_little_endian()
        .with_fixed_int_encoding()
}

/// Session announcement sent ahead of the frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handshake {
    transmitter: TransmitterId,
    image_name: String,
    params: SessionParams,
    grid: GridShape,
}

impl Handshake {
    /// Build a handshake for one session.
    ///
    /// Image names longer than [`MAX_IMAGE_NAME_LEN`] bytes are cut at the
    /// last character boundary that fits; NUL bytes end the name early on the
    /// receiving side, so they are stripped here.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::GridTooSmall`] when `grid` cannot hold the
    /// session's frames.
    pub fn new(
        transmitter: TransmitterId,
        image_name: &str,
        params: SessionParams,
        grid: GridShape,
    ) -> Result<Self, HandshakeError> {
        if !grid.fits(usize::from(params.total_frames())) {
            return Err(HandshakeError::GridTooSmall {
                rows: grid.rows(),
                cols: grid.cols(),
                frames: params.total_frames(),
            });
        }
        let cleaned: String = image_name.chars().filter(|c| *c != '\0').collect();
        Ok(Self {
            transmitter,
            image_name: truncate_to_boundary(&cleaned, MAX_IMAGE_NAME_LEN).to_owned(),
            params,
            grid,
        })
    }

    /// Identity of the sending transmitter.
    #[must_use]
    pub fn transmitter(&self) -> &TransmitterId { &self.transmitter }

    /// Name of the image being sent.
    #[must_use]
    pub fn image_name(&self) -> &str { &self.image_name }

    /// Negotiated session parameters.
    #[must_use]
    pub const fn params(&self) -> SessionParams { self.params }

    /// Grid the frames are laid out on.
    #[must_use]
    pub const fn grid(&self) -> GridShape { self.grid }

    /// Encode the handshake into its fixed wire form.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError::Encode`] if bincode rejects the value.
    pub fn encode(&self) -> Result<Vec<u8>, HandshakeError> {
        let wire = WireHandshake {
            transmitter: pad(self.transmitter.as_str()),
            image_name: pad(&self.image_name),
            chunk_size: self.params.chunk_size().get(),
            total_frames: self.params.total_frames(),
            total_length: self.params.total_length(),
            rows: self.grid.rows(),
            cols: self.grid.cols(),
        };
        Ok(encode_to_vec(wire, wire_config())?)
    }

    /// Decode and validate a handshake.
    ///
    /// # Errors
    ///
    /// Returns [`HandshakeError`] when the bytes cannot be decoded or any
    /// field fails validation.
    pub fn decode(bytes: &[u8]) -> Result<Self, HandshakeError> {
        let (wire, _) = decode_from_slice::<WireHandshake, _>(bytes, wire_config())?;
        let transmitter = TransmitterId::new(unpad(&wire.transmitter, "transmitter")?)?;
        let image_name = unpad(&wire.image_name, "image_name")?.to_owned();
        let chunk_size = ChunkSize::new(wire.chunk_size)?;
        let params = SessionParams::from_parts(chunk_size, wire.total_frames, wire.total_length)?;
        let grid = GridShape::new(wire.rows, wire.cols);
        if !grid.fits(usize::from(wire.total_frames)) {
            return Err(HandshakeError::GridTooSmall {
                rows: wire.rows,
                cols: wire.cols,
                frames: wire.total_frames,
            });
        }
        Ok(Self {
            transmitter,
            image_name,
            params,
            grid,
        })
    }
}

/// Read exactly one handshake from `reader`.
///
/// # Errors
///
/// Returns [`HandshakeError::Io`] if the stream fails or ends early, or any
/// validation error raised by [`Handshake::decode`].
pub async fn read_handshake<R>(reader: &mut R) -> Result<Handshake, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0_u8; HANDSHAKE_LEN];
    reader.read_exact(&mut buf).await?;
    Handshake::decode(&buf)
}

/// Write `handshake` to `writer` and flush it.
///
/// # Errors
///
/// Returns [`HandshakeError`] if encoding or writing fails.
pub async fn write_handshake<W>(writer: &mut W, handshake: &Handshake) -> Result<(), HandshakeError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(&handshake.encode()?).await?;
    writer.flush().await?;
    Ok(())
}

fn pad<const N: usize>(value: &str) -> [u8; N] {
    let mut out = [0_u8; N];
    let bytes = truncate_to_boundary(value, N).as_bytes();
    out[..bytes.len()].copy_from_slice(bytes);
    out
}

fn unpad<'a>(field: &'a [u8], name: &'static str) -> Result<&'a str, HandshakeError> {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    std::str::from_utf8(&field[..end]).map_err(|_| HandshakeError::InvalidUtf8 { field: name })
}

fn truncate_to_boundary(value: &str, max: usize) -> &str {
    if value.len() <= max {
        return value;
    }
    let mut end = max;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}
