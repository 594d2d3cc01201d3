//! Marker payload codecs.
//!
//! Side effects, mutable side effects, and version decisions persist
//! locally-computed values through `MarkerRecorded` history events so every
//! replay returns the same value. These are the payload shapes inside
//! those markers; the marker names themselves live in
//! [`crate::state_machine`].

use serde::{Deserialize, Serialize};
use windlass_core::encoded::{decode, encode, DataConverter, EncodingError};
use windlass_core::types::Version;

/// Details of a `SideEffect` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffectDetails {
    pub side_effect_id: i32,
    pub result: Vec<u8>,
}

/// Details of a `MutableSideEffect` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutableSideEffectDetails {
    pub id: String,
    pub result: Vec<u8>,
}

/// Details of a `Version` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionDetails {
    pub change_id: String,
    pub version: Version,
}

pub fn encode_side_effect_details(
    converter: &dyn DataConverter,
    side_effect_id: i32,
    result: &[u8],
) -> Result<Vec<u8>, EncodingError> {
    encode(
        converter,
        &SideEffectDetails {
            side_effect_id,
            result: result.to_vec(),
        },
    )
}

pub fn decode_side_effect_details(
    converter: &dyn DataConverter,
    data: &[u8],
) -> Result<SideEffectDetails, EncodingError> {
    decode(converter, data)
}

pub fn encode_mutable_side_effect_details(
    converter: &dyn DataConverter,
    id: &str,
    result: &[u8],
) -> Result<Vec<u8>, EncodingError> {
    encode(
        converter,
        &MutableSideEffectDetails {
            id: id.to_string(),
            result: result.to_vec(),
        },
    )
}

pub fn decode_mutable_side_effect_details(
    converter: &dyn DataConverter,
    data: &[u8],
) -> Result<MutableSideEffectDetails, EncodingError> {
    decode(converter, data)
}

pub fn encode_version_details(
    converter: &dyn DataConverter,
    change_id: &str,
    version: Version,
) -> Result<Vec<u8>, EncodingError> {
    encode(
        converter,
        &VersionDetails {
            change_id: change_id.to_string(),
            version,
        },
    )
}

pub fn decode_version_details(
    converter: &dyn DataConverter,
    data: &[u8],
) -> Result<VersionDetails, EncodingError> {
    decode(converter, data)
}
