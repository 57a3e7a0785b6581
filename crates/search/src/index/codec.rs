//! Binary on-disk format for [`VectorIndex`]
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! magic "DQIX" | version u16 | metric u8 | dimension u32 | count u32
//! model (u16 len + utf8) | built_at i64 (unix millis)
//! count x [ source_id (u16 len + utf8) | chunk_index u32 | start_offset u64
//!           | text (u32 len + utf8) | dimension x f32 ]
//! sha256 of all preceding bytes (32 bytes)
//! ```

use super::{EmbeddingRecord, VectorIndex};
use chrono::{DateTime, Utc};
use docqa_common::models::{Chunk, SimilarityMetric};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"DQIX";
pub const FORMAT_VERSION: u16 = 1;
const CHECKSUM_LEN: usize = 32;

/// Reasons a byte buffer is not a valid index
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("not an index file (bad magic)")]
    BadMagic,

    #[error("unsupported format version {0}")]
    UnsupportedVersion(u16),

    #[error("unknown similarity metric tag {0}")]
    UnknownMetric(u8),

    #[error("zero vector dimension")]
    ZeroDimension,

    #[error("truncated while reading {0}")]
    Truncated(&'static str),

    #[error("{0} unexpected trailing bytes")]
    TrailingBytes(usize),

    #[error("checksum mismatch (stored {stored}, computed {computed})")]
    ChecksumMismatch { stored: String, computed: String },

    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    #[error("{0} too long to encode")]
    TooLong(&'static str),

    #[error("invalid timestamp {0}")]
    InvalidTimestamp(i64),
}

/// Serialize an index, checksum included
pub fn encode(index: &VectorIndex) -> Result<Vec<u8>, CodecError> {
    let record_bytes: usize = index
        .records()
        .iter()
        .map(|r| 2 + r.chunk.source_id.len() + 4 + 8 + 4 + r.chunk.text.len() + 4 * r.vector.len())
        .sum();
    let mut buf = Vec::with_capacity(64 + index.model().len() + record_bytes + CHECKSUM_LEN);

    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.push(index.metric().tag());
    put_u32(&mut buf, index.dimension(), "dimension")?;
    put_u32(&mut buf, index.len(), "record count")?;
    put_str16(&mut buf, index.model(), "model name")?;
    buf.extend_from_slice(&index.built_at().timestamp_millis().to_le_bytes());

    for record in index.records() {
        let chunk = &record.chunk;
        put_str16(&mut buf, &chunk.source_id, "source id")?;
        buf.extend_from_slice(&chunk.chunk_index.to_le_bytes());
        buf.extend_from_slice(&(chunk.start_offset as u64).to_le_bytes());
        put_u32(&mut buf, chunk.text.len(), "chunk text")?;
        buf.extend_from_slice(chunk.text.as_bytes());
        for value in &record.vector {
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }

    let checksum = Sha256::digest(&buf);
    buf.extend_from_slice(&checksum);
    Ok(buf)
}

/// Parse and verify an index
pub fn decode(bytes: &[u8]) -> Result<VectorIndex, CodecError> {
    if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
        return Err(CodecError::BadMagic);
    }
    if bytes.len() < MAGIC.len() + CHECKSUM_LEN {
        return Err(CodecError::Truncated("checksum"));
    }

    let (body, stored) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let computed = Sha256::digest(body);
    if computed.as_slice() != stored {
        return Err(CodecError::ChecksumMismatch {
            stored: hex::encode(stored),
            computed: hex::encode(computed),
        });
    }

    let mut reader = Reader::new(&body[MAGIC.len()..]);

    let version = reader.u16("version")?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let tag = reader.u8("metric")?;
    let metric = SimilarityMetric::from_tag(tag).ok_or(CodecError::UnknownMetric(tag))?;
    let dimension = reader.u32("dimension")? as usize;
    if dimension == 0 {
        return Err(CodecError::ZeroDimension);
    }
    let count = reader.u32("record count")? as usize;
    let model = reader.str16("model name")?;
    let millis = reader.i64("build time")?;
    let built_at =
        DateTime::<Utc>::from_timestamp_millis(millis).ok_or(CodecError::InvalidTimestamp(millis))?;

    let mut index = VectorIndex::new(metric, dimension, model).with_built_at(built_at);
    for _ in 0..count {
        let source_id = reader.str16("source id")?;
        let chunk_index = reader.u32("chunk index")?;
        let start_offset = reader.u64("start offset")? as usize;
        let text_len = reader.u32("chunk text")? as usize;
        let text = reader.utf8(text_len, "chunk text")?;

        let raw = reader.take(dimension * 4, "vector")?;
        let vector = raw
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        index.records.push(EmbeddingRecord {
            chunk: Chunk {
                source_id,
                chunk_index,
                start_offset,
                text,
            },
            vector,
        });
    }

    if reader.remaining() > 0 {
        return Err(CodecError::TrailingBytes(reader.remaining()));
    }
    Ok(index)
}

fn put_u32(buf: &mut Vec<u8>, value: usize, what: &'static str) -> Result<(), CodecError> {
    let value = u32::try_from(value).map_err(|_| CodecError::TooLong(what))?;
    buf.extend_from_slice(&value.to_le_bytes());
    Ok(())
}

fn put_str16(buf: &mut Vec<u8>, value: &str, what: &'static str) -> Result<(), CodecError> {
    let len = u16::try_from(value.len()).map_err(|_| CodecError::TooLong(what))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(value.as_bytes());
    Ok(())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::Truncated(what));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, CodecError> {
        self.array(what).map(u16::from_le_bytes)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, CodecError> {
        self.array(what).map(u32::from_le_bytes)
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, CodecError> {
        self.array(what).map(u64::from_le_bytes)
    }

    fn i64(&mut self, what: &'static str) -> Result<i64, CodecError> {
        self.array(what).map(i64::from_le_bytes)
    }

    fn utf8(&mut self, len: usize, what: &'static str) -> Result<String, CodecError> {
        let raw = self.take(len, what)?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8(what))
    }

    fn str16(&mut self, what: &'static str) -> Result<String, CodecError> {
        let len = self.u16(what)? as usize;
        self.utf8(len, what)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VectorIndex {
        let mut index = VectorIndex::new(SimilarityMetric::L2, 3, "models/embedding-001");
        for (i, text) in ["Première partie", "second chunk", ""].iter().enumerate() {
            index
                .insert(EmbeddingRecord {
                    chunk: Chunk {
                        source_id: "rapport.pdf".to_string(),
                        chunk_index: i as u32,
                        start_offset: i * 12,
                        text: text.to_string(),
                    },
                    vector: vec![i as f32, -0.5, f32::MIN_POSITIVE],
                })
                .unwrap();
        }
        index
    }

    /// Re-seal a tampered body so the checksum passes
    fn reseal(mut body: Vec<u8>) -> Vec<u8> {
        let checksum = Sha256::digest(&body);
        body.extend_from_slice(&checksum);
        body
    }

    #[test]
    fn test_decode_preserves_everything() {
        let index = sample();
        let decoded = decode(&encode(&index).unwrap()).unwrap();

        assert_eq!(decoded.metric(), SimilarityMetric::L2);
        assert_eq!(decoded.dimension(), 3);
        assert_eq!(decoded.model(), "models/embedding-001");
        assert_eq!(
            decoded.built_at().timestamp_millis(),
            index.built_at().timestamp_millis()
        );
        assert_eq!(decoded.records(), index.records());
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(&bytes[..4], b"DQIX");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), FORMAT_VERSION);
        assert_eq!(bytes[6], SimilarityMetric::L2.tag());
        assert_eq!(u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]), 3);
        assert_eq!(u32::from_le_bytes([bytes[11], bytes[12], bytes[13], bytes[14]]), 3);
    }

    #[test]
    fn test_flipped_byte_fails_checksum() {
        let mut bytes = encode(&sample()).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xff;
        assert!(matches!(decode(&bytes), Err(CodecError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[0] = b'X';
        assert_eq!(decode(&bytes).unwrap_err(), CodecError::BadMagic);
        assert_eq!(decode(b"").unwrap_err(), CodecError::BadMagic);
    }

    #[test]
    fn test_unsupported_version() {
        let bytes = encode(&sample()).unwrap();
        let mut body = bytes[..bytes.len() - CHECKSUM_LEN].to_vec();
        body[4..6].copy_from_slice(&2u16.to_le_bytes());
        assert_eq!(
            decode(&reseal(body)).unwrap_err(),
            CodecError::UnsupportedVersion(2)
        );
    }

    #[test]
    fn test_truncated_body() {
        let bytes = encode(&sample()).unwrap();
        let body = bytes[..bytes.len() - CHECKSUM_LEN - 5].to_vec();
        assert!(matches!(
            decode(&reseal(body)).unwrap_err(),
            CodecError::Truncated(_)
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let bytes = encode(&sample()).unwrap();
        let mut body = bytes[..bytes.len() - CHECKSUM_LEN].to_vec();
        body.extend_from_slice(&[0, 0]);
        assert_eq!(decode(&reseal(body)).unwrap_err(), CodecError::TrailingBytes(2));
    }
}
