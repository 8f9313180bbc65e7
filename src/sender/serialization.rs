use super::request::LogEventPayload;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::io::{Read, Write};
use thiserror::Error;

/// Payloads smaller than this go out uncompressed even when compression is allowed.
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024;

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("IO error during serialization: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Payload has no events")]
    EmptyPayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub bytes: Vec<u8>,
    pub compressed: bool,
}

#[derive(Debug, Clone)]
pub struct PayloadSerializer {
    compression_threshold: usize,
}

impl PayloadSerializer {
    pub fn new() -> Self {
        Self::with_compression_threshold(DEFAULT_COMPRESSION_THRESHOLD)
    }

    pub fn with_compression_threshold(compression_threshold: usize) -> Self {
        Self {
            compression_threshold,
        }
    }

    /// JSON-encode the payload, gzipping it when allowed and large enough.
    pub fn encode(
        &self,
        payload: &LogEventPayload,
        allow_compression: bool,
    ) -> Result<EncodedPayload, SerializationError> {
        if payload.events.is_empty() {
            return Err(SerializationError::EmptyPayload);
        }

        let json = serde_json::to_vec(payload)?;

        if !allow_compression || json.len() < self.compression_threshold {
            return Ok(EncodedPayload {
                bytes: json,
                compressed: false,
            });
        }

        let mut encoder = GzEncoder::new(Vec::with_capacity(json.len() / 4), Compression::fast());
        encoder.write_all(&json)?;
        let compressed = encoder.finish()?;

        Ok(EncodedPayload {
            bytes: compressed,
            compressed: true,
        })
    }

    pub fn decode(&self, encoded: &EncodedPayload) -> Result<LogEventPayload, SerializationError> {
        if encoded.compressed {
            let mut decoder = GzDecoder::new(encoded.bytes.as_slice());
            let mut json = Vec::new();
            decoder.read_to_end(&mut json)?;
            Ok(serde_json::from_slice(&json)?)
        } else {
            Ok(serde_json::from_slice(&encoded.bytes)?)
        }
    }
}

impl Default for PayloadSerializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Event;
    use crate::sender::request::SdkMetadata;

    fn payload(events: usize) -> LogEventPayload {
        LogEventPayload {
            events: (0..events)
                .map(|i| Event::at(format!("event_{i}"), i as i64).with_value("some value"))
                .collect(),
            sdk_metadata: SdkMetadata::default(),
        }
    }

    #[test]
    fn test_small_payload_is_not_compressed() {
        let serializer = PayloadSerializer::new();
        let encoded = serializer.encode(&payload(1), true).unwrap();

        assert!(!encoded.compressed);
        assert_eq!(serializer.decode(&encoded).unwrap(), payload(1));
    }

    #[test]
    fn test_large_payload_is_gzipped_when_allowed() {
        let serializer = PayloadSerializer::new();
        let original = payload(100);

        let encoded = serializer.encode(&original, true).unwrap();
        assert!(encoded.compressed);
        assert_eq!(&encoded.bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(serializer.decode(&encoded).unwrap(), original);

        let plain = serializer.encode(&original, false).unwrap();
        assert!(!plain.compressed);
        assert!(plain.bytes.len() > encoded.bytes.len());
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let serializer = PayloadSerializer::new();
        assert!(matches!(
            serializer.encode(&payload(0), true),
            Err(SerializationError::EmptyPayload)
        ));
    }
}
