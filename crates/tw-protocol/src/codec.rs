//! Tokio codec for framed relay messages

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{FrameHeader, MAX_PAYLOAD_SIZE};
use crate::message::RelayFrame;

/// Codec for encoding/decoding relay frames
#[derive(Debug, Default)]
pub struct RelayCodec {
    /// Current header being decoded (if any)
    pending_header: Option<FrameHeader>,
}

impl RelayCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            pending_header: None,
        }
    }
}

impl Decoder for RelayCodec {
    type Item = RelayFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match FrameHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None),
            },
        };

        let payload_len = header.payload_length as usize;
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        if src.len() < payload_len {
            // Save header and wait for more data
            self.pending_header = Some(header);
            src.reserve(payload_len - src.len());
            return Ok(None);
        }

        let payload_bytes = src.split_to(payload_len).freeze();
        let frame: RelayFrame = serde_json::from_slice(&payload_bytes)?;

        if frame.kind() != header.kind {
            return Err(ProtocolError::KindMismatch {
                header: header.kind,
                payload: frame.kind(),
            });
        }

        tracing::trace!(kind = ?header.kind, bytes = payload_len, "Decoded relay frame");
        Ok(Some(frame))
    }
}

impl Encoder<RelayFrame> for RelayCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: RelayFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&frame)?;
        let payload_len = payload.len();

        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let header = FrameHeader::new(frame.kind(), payload_len as u32);
        header.encode(dst);
        dst.extend_from_slice(&payload);

        Ok(())
    }
}
