//! Chunked message framing for tokio_util.
//!
//! Every message is split into chunks, each prefixed with a 2-byte big-endian
//! length, and terminated by an empty chunk (`00 00`). An empty chunk outside
//! a message is a NOOP keep-alive and is skipped.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::message::{BoltRequest, BoltResponse};
use super::packstream::{decode, encode, PackStreamValue};
use super::BoltError;

/// Largest payload a single chunk can carry.
pub const MAX_CHUNK_SIZE: usize = 0xFFFF;

/// End of message marker (0x00 0x00)
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// Default limit on a reassembled message (16MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Framing codec: raw message payloads in, chunked bytes out.
#[derive(Debug)]
pub struct ChunkCodec {
    max_message_size: usize,
    message_buffer: BytesMut,
}

impl ChunkCodec {
    /// Create a codec with the default message size limit.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a codec with a custom message size limit.
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            max_message_size,
            message_buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Append `payload` to `dst` as chunks plus end marker.
    pub fn write_chunked(payload: &[u8], dst: &mut BytesMut) {
        dst.reserve(payload.len() + 2 * (payload.len() / MAX_CHUNK_SIZE + 2));
        for chunk in payload.chunks(MAX_CHUNK_SIZE) {
            dst.put_u16(chunk.len() as u16);
            dst.put_slice(chunk);
        }
        dst.put_slice(&END_MARKER);
    }
}

impl Default for ChunkCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkCodec {
    type Item = BytesMut;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < 2 {
                return Ok(None);
            }

            let chunk_size = usize::from(u16::from_be_bytes([src[0], src[1]]));

            if chunk_size == 0 {
                src.advance(2);
                if self.message_buffer.is_empty() {
                    // NOOP
                    continue;
                }
                return Ok(Some(self.message_buffer.split()));
            }

            if src.len() < 2 + chunk_size {
                src.reserve(2 + chunk_size - src.len());
                return Ok(None);
            }

            let size = self.message_buffer.len() + chunk_size;
            if size > self.max_message_size {
                return Err(BoltError::MessageTooLarge {
                    size,
                    max: self.max_message_size,
                });
            }

            src.advance(2);
            self.message_buffer.extend_from_slice(&src[..chunk_size]);
            src.advance(chunk_size);
        }
    }
}

impl Encoder<Bytes> for ChunkCodec {
    type Error = BoltError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.len() > self.max_message_size {
            return Err(BoltError::MessageTooLarge {
                size: item.len(),
                max: self.max_message_size,
            });
        }
        Self::write_chunked(&item, dst);
        Ok(())
    }
}

fn unpack_structure(payload: &[u8]) -> Result<crate::bolt::packstream::PackStreamStructure, BoltError> {
    match decode(payload)? {
        PackStreamValue::Structure(s) => Ok(s),
        other => Err(BoltError::Protocol(format!(
            "Expected message structure, got {}",
            other.type_name()
        ))),
    }
}

/// Decode one unchunked response payload.
pub fn decode_response(payload: &[u8]) -> Result<BoltResponse, BoltError> {
    let structure = unpack_structure(payload)?;
    Ok(BoltResponse::from_structure(&structure)?)
}

/// Decode one unchunked request payload.
pub fn decode_request(payload: &[u8]) -> Result<BoltRequest, BoltError> {
    let structure = unpack_structure(payload)?;
    Ok(BoltRequest::from_structure(&structure)?)
}

/// Client-side codec: decodes responses, frames pre-encoded requests.
#[derive(Debug, Default)]
pub struct BoltResponseCodec {
    inner: ChunkCodec,
}

impl BoltResponseCodec {
    /// Create a codec with a custom message size limit.
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            inner: ChunkCodec::with_max_size(max_message_size),
        }
    }
}

impl Decoder for BoltResponseCodec {
    type Item = BoltResponse;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(payload) => decode_response(&payload).map(Some),
            None => Ok(None),
        }
    }
}

impl Encoder<Bytes> for BoltResponseCodec {
    type Error = BoltError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.inner.encode(item, dst)
    }
}

/// Server-side codec: decodes requests, encodes responses.
///
/// Used by scripted peers in tests and tooling.
#[derive(Debug, Default)]
pub struct BoltRequestCodec {
    inner: ChunkCodec,
}

impl Decoder for BoltRequestCodec {
    type Item = BoltRequest;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.inner.decode(src)? {
            Some(payload) => decode_request(&payload).map(Some),
            None => Ok(None),
        }
    }
}

impl Encoder<BoltResponse> for BoltRequestCodec {
    type Error = BoltError;

    fn encode(&mut self, item: BoltResponse, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = encode(&PackStreamValue::Structure(item.to_structure()))?;
        self.inner.encode(payload.freeze(), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bolt::message::{RecordMessage, SuccessMessage};

    fn framed(payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        ChunkCodec::write_chunked(payload, &mut buf);
        buf
    }

    #[test]
    fn test_single_chunk_layout() {
        let buf = framed(&[0xB0, 0x0F]);
        assert_eq!(&buf[..], &[0x00, 0x02, 0xB0, 0x0F, 0x00, 0x00]);
    }

    #[test]
    fn test_large_message_splits_at_max_chunk() {
        let payload = vec![7u8; MAX_CHUNK_SIZE + 10];
        let mut buf = framed(&payload);
        assert_eq!(&buf[..2], &[0xFF, 0xFF]);
        assert_eq!(&buf[2 + MAX_CHUNK_SIZE..4 + MAX_CHUNK_SIZE], &[0x00, 0x0A]);

        let decoded = ChunkCodec::new().decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], &payload[..]);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_chunk_waits() {
        let full = framed(&[1, 2, 3, 4]);
        let mut codec = ChunkCodec::new();

        let mut partial = BytesMut::from(&full[..4]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full[4..]);
        assert_eq!(&codec.decode(&mut partial).unwrap().unwrap()[..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_noop_chunks_skipped() {
        let mut buf = BytesMut::from(&END_MARKER[..]);
        buf.extend_from_slice(&END_MARKER);
        buf.extend_from_slice(&framed(&[0xC3]));

        let mut codec = ChunkCodec::new();
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], &[0xC3]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_message_too_large() {
        let mut codec = ChunkCodec::with_max_size(100);
        let mut buf = BytesMut::new();
        buf.put_u16(200);
        buf.extend_from_slice(&[0u8; 200]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(BoltError::MessageTooLarge { size: 200, max: 100 })
        ));
    }

    #[test]
    fn test_response_codec_decodes_sequence() {
        let mut server = BoltRequestCodec::default();
        let mut buf = BytesMut::new();
        server
            .encode(BoltResponse::Record(RecordMessage::new(vec![1.into()])), &mut buf)
            .unwrap();
        server
            .encode(BoltResponse::Success(SuccessMessage::stream_end(None)), &mut buf)
            .unwrap();

        let mut client = BoltResponseCodec::default();
        assert!(matches!(client.decode(&mut buf).unwrap(), Some(BoltResponse::Record(_))));
        assert!(matches!(client.decode(&mut buf).unwrap(), Some(BoltResponse::Success(_))));
        assert!(client.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_non_structure_payload_rejected() {
        assert!(matches!(decode_response(&[0x01]), Err(BoltError::Protocol(_))));
    }
}
