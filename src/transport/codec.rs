//! Stream codec mapping frames onto a reliable, ordered byte stream.
//!
//! A TCP-like stream has no message boundaries of its own. [`FrameCodec`]
//! restores them from the negotiated [`SessionParams`]: payload lengths are
//! never sent in-band, so the decoder derives each frame's length from its
//! header's `frame_index` and only yields a [`Frame`] once the whole
//! `header ++ payload` is buffered.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{DesyncReason, TransportError};
use crate::{
    frame::{Frame, FrameHeader, HEADER_LEN},
    params::SessionParams,
};

/// Frame codec bound to one session's parameters.
///
/// # Examples
///
/// ```
/// use bytes::{Bytes, BytesMut};
/// use stillframe::{
///     encoder::FrameEncoder,
///     transport::FrameCodec,
/// };
/// use tokio_util::codec::{Decoder, Encoder};
///
/// let sequence = FrameEncoder::default().encode(Bytes::from(vec![1_u8; 120])).unwrap();
/// let mut codec = FrameCodec::new(sequence.params());
/// let mut wire = BytesMut::new();
/// for frame in sequence.frames() {
///     codec.encode(frame.clone(), &mut wire).unwrap();
/// }
/// let first = codec.decode(&mut wire).unwrap().unwrap();
/// assert_eq!(first.payload().len(), 90);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct FrameCodec {
    params: SessionParams,
}

impl FrameCodec {
    /// Create a codec for the session described by `params`.
    #[must_use]
    pub const fn new(params: SessionParams) -> Self { Self { params } }

    /// Parameters the codec derives payload lengths from.
    #[must_use]
    pub const fn params(&self) -> SessionParams { self.params }

    fn frame_len(&self, header: &FrameHeader) -> Result<usize, DesyncReason> {
        self.params
            .payload_len(header.frame_index())
            .map(|payload| HEADER_LEN + payload)
            .ok_or(DesyncReason::OutsideSession {
                index: header.frame_index(),
                total_frames: self.params.total_frames(),
            })
    }

    /// Bytes needed to complete the frame that starts at the front of `src`.
    fn pending_len(&self, src: &[u8]) -> usize {
        src.get(..HEADER_LEN)
            .and_then(|raw| FrameHeader::decode(raw).ok())
            .and_then(|header| self.frame_len(&header).ok())
            .unwrap_or(HEADER_LEN)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(raw) = src.get(..HEADER_LEN) else {
            src.reserve(HEADER_LEN - src.len());
            return Ok(None);
        };
        let header = FrameHeader::decode(raw).map_err(DesyncReason::from)?;
        let frame_len = self.frame_len(&header)?;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(frame_len);
        frame.advance(HEADER_LEN);
        Ok(Some(Frame::new(header, frame.freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        if src.is_empty() {
            return Ok(None);
        }
        Err(TransportError::TruncatedFrame {
            have: src.len(),
            need: self.pending_len(src),
        })
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let index = item.index();
        let expected = self
            .params
            .payload_len(index)
            .ok_or(DesyncReason::OutsideSession {
                index,
                total_frames: self.params.total_frames(),
            })?;
        if item.payload().len() != expected {
            return Err(TransportError::PayloadLength {
                index,
                expected,
                actual: item.payload().len(),
            });
        }

        dst.reserve(item.wire_len());
        dst.put_slice(&item.header().encode());
        dst.put_slice(item.payload());
        Ok(())
    }
}
