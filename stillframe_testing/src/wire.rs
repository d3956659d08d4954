//! Rendering and parsing of complete sessions.

use bytes::{Bytes, BytesMut};
use stillframe::{
    encoder::{FrameEncoder, FrameSequence},
    frame::Frame,
    grid::GridPolicy,
    params::ChunkSize,
    transport::{FrameCodec, HANDSHAKE_LEN, Handshake},
};
use tokio::{io::AsyncWriteExt, net::TcpStream};
use tokio_util::codec::{Decoder, Encoder};

use crate::images::transmitter;

/// Encode `image` with 100-byte chunks.
///
/// # Panics
///
/// Panics if the image needs more frames than a session can index.
#[must_use]
pub fn encode_100(image: &Bytes) -> FrameSequence {
    FrameEncoder::new(
        ChunkSize::new(100).expect("100 is a valid chunk size"),
        GridPolicy::Square,
    )
    .encode(image.clone())
    .expect("image fits one session")
}

/// Handshake plus the frames at `order`, using 100-byte chunks.
///
/// Indices may repeat or be left out to model duplicates and losses.
///
/// # Panics
///
/// Panics if an index in `order` is outside the session.
#[must_use]
pub fn session_bytes(id: &str, name: &str, image: &Bytes, order: &[usize]) -> BytesMut {
    let sequence = encode_100(image);
    let handshake = Handshake::new(transmitter(id), name, sequence.params(), sequence.grid())
        .expect("grid fits frames");
    let mut buf = BytesMut::from(&handshake.encode().expect("handshake encodes")[..]);
    let mut codec = FrameCodec::new(sequence.params());
    for &index in order {
        let frame = sequence
            .frames()
            .get(index)
            .cloned()
            .unwrap_or_else(|| panic!("frame {index} outside session"));
        codec.encode(frame, &mut buf).expect("frame encodes");
    }
    buf
}

/// Split captured sender output into its handshake and frames.
///
/// # Panics
///
/// Panics if the bytes are not one well-formed session.
#[must_use]
pub fn parse_session(bytes: &[u8]) -> (Handshake, Vec<Frame>) {
    let head = bytes.get(..HANDSHAKE_LEN).expect("handshake present");
    let handshake = Handshake::decode(head).expect("handshake decodes");
    let mut codec = FrameCodec::new(handshake.params());
    let mut rest = BytesMut::from(&bytes[HANDSHAKE_LEN..]);
    let mut frames = Vec::new();
    while let Some(frame) = codec.decode_eof(&mut rest).expect("frame decodes") {
        frames.push(frame);
    }
    (handshake, frames)
}

/// Connect to `addr`, write `bytes`, and close the write half.
///
/// # Panics
///
/// Panics if connecting or writing fails.
pub async fn write_session(addr: std::net::SocketAddr, bytes: &[u8]) {
    let mut stream = TcpStream::connect(addr).await.expect("connect to receiver");
    stream.write_all(bytes).await.expect("write session");
    stream.shutdown().await.expect("close write half");
}
