//! Pluggable payload serialization.
//!
//! Every value that crosses the workflow boundary (activity inputs and
//! results, marker details, signal payloads) goes through a
//! [`DataConverter`]. The trait works at the `serde_json::Value` level so
//! it stays object-safe and workers can hold `Arc<dyn DataConverter>`;
//! typed access goes through the [`encode`] and [`decode`] helpers.

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

/// Errors produced while converting payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("deserialization error: {0}")]
    Deserialization(String),
}

/// Converts between in-memory values and the byte payloads stored in
/// history.
pub trait DataConverter: Send + Sync {
    fn to_payload(&self, value: &serde_json::Value) -> Result<Vec<u8>, EncodingError>;
    fn from_payload(&self, data: &[u8]) -> Result<serde_json::Value, EncodingError>;
}

/// Encode a typed value through a converter.
pub fn encode<T: Serialize + ?Sized>(
    converter: &dyn DataConverter,
    value: &T,
) -> Result<Vec<u8>, EncodingError> {
    let json =
        serde_json::to_value(value).map_err(|e| EncodingError::Serialization(e.to_string()))?;
    converter.to_payload(&json)
}

/// Decode a typed value through a converter.
pub fn decode<T: DeserializeOwned>(
    converter: &dyn DataConverter,
    data: &[u8],
) -> Result<T, EncodingError> {
    let json = converter.from_payload(data)?;
    serde_json::from_value(json).map_err(|e| EncodingError::Deserialization(e.to_string()))
}

/// Default converter: payloads are plain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDataConverter;

impl JsonDataConverter {
    pub fn new() -> Self {
        Self
    }
}

impl DataConverter for JsonDataConverter {
    fn to_payload(&self, value: &serde_json::Value) -> Result<Vec<u8>, EncodingError> {
        serde_json::to_vec(value).map_err(|e| EncodingError::Serialization(e.to_string()))
    }

    fn from_payload(&self, data: &[u8]) -> Result<serde_json::Value, EncodingError> {
        serde_json::from_slice(data).map_err(|e| EncodingError::Deserialization(e.to_string()))
    }
}

/// A payload whose decoding is deferred until the caller knows the target
/// type, e.g. side-effect results handed back to workflow code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedValue {
    data: Vec<u8>,
}

impl EncodedValue {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Decode with the given converter.
    pub fn get<T: DeserializeOwned>(
        &self,
        converter: &dyn DataConverter,
    ) -> Result<T, EncodingError> {
        decode(converter, &self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
        value: i32,
    }

    #[test]
    fn json_round_trip() {
        let converter = JsonDataConverter::new();
        let original = Payload {
            name: "test".into(),
            value: 42,
        };

        let encoded = encode(&converter, &original).unwrap();
        let decoded: Payload = decode(&converter, &encoded).unwrap();
        assert_eq!(original, decoded);
    }

    #[test]
    fn converter_is_object_safe() {
        let converter: Box<dyn DataConverter> = Box::new(JsonDataConverter::new());
        let encoded = encode(converter.as_ref(), &5i64).unwrap();
        let decoded: i64 = decode(converter.as_ref(), &encoded).unwrap();
        assert_eq!(decoded, 5);
    }

    #[test]
    fn encoded_value_defers_decoding() {
        let converter = JsonDataConverter::new();
        let bytes = encode(&converter, "hello").unwrap();
        let value = EncodedValue::new(bytes);
        let back: String = value.get(&converter).unwrap();
        assert_eq!(back, "hello");
    }

    #[test]
    fn decode_rejects_garbage() {
        let converter = JsonDataConverter::new();
        let result: Result<Payload, _> = decode(&converter, b"not json");
        assert!(result.is_err());
    }
}
