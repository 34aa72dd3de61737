//! JSON encoding for the files written by the persistence adapters.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::ser::{PrettyFormatter, Serializer};

/// Error type for serialization operations.
#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// Encoding failed.
    #[error("JSON encoding failed: {0}")]
    Encode(serde_json::Error),

    /// Decoding failed.
    #[error("JSON decoding failed: {0}")]
    Decode(serde_json::Error),
}

/// Encodes a value as pretty JSON with 2-space indentation and a trailing
/// newline. Key order follows the source types, so maps should be
/// `BTreeMap`s for stable output.
///
/// # Errors
///
/// Returns an error if the value cannot be encoded.
pub fn to_json_stable_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, SerializationError> {
    let mut buffer = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"  "));
    value
        .serialize(&mut serializer)
        .map_err(SerializationError::Encode)?;
    buffer.push(b'\n');
    Ok(buffer)
}

/// Decodes JSON bytes, pretty or minified.
///
/// # Errors
///
/// Returns an error if the bytes are not valid JSON for `T`.
pub fn from_json_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, SerializationError> {
    serde_json::from_slice(bytes).map_err(SerializationError::Decode)
}
