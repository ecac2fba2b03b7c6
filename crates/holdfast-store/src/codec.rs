//! Byte serialization for attribute values.

use serde_json::Value;

use crate::error::Result;

/// Converts attribute values to and from the opaque byte blobs stored in
/// the attributes table.
///
/// Implementations must round-trip any value a caller stores.
pub trait AttributeCodec: Send + Sync {
    /// Serialize a value for the attribute blob column.
    fn serialize(&self, value: &Value) -> Result<Vec<u8>>;

    /// Deserialize bytes read back from the attribute blob column.
    fn deserialize(&self, bytes: &[u8]) -> Result<Value>;
}

/// Default codec persisting attribute values as JSON text.
#[derive(Debug, Clone, Default)]
pub struct JsonCodec;

impl AttributeCodec for JsonCodec {
    fn serialize(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
