//! Byte-stream transport for frame sequences.
//!
//! A session on the wire is a fixed-size [`Handshake`] followed by frames in
//! `frame_index` order. [`FrameCodec`] splits the stream back into frames using
//! the parameters the handshake negotiated.

pub mod codec;
pub mod error;
pub mod handshake;

pub use codec::FrameCodec;
pub use error::{DesyncReason, HandshakeError, TransportError};
pub use handshake::{
    HANDSHAKE_LEN,
    Handshake,
    MAX_IMAGE_NAME_LEN,
    read_handshake,
    write_handshake,
};
