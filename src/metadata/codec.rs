//! Encoding of ownership records to store values.
//!
//! Records are stored as compact JSON objects. The record's map is ordered,
//! so the same logical record always encodes to the same bytes.

use super::OwnershipRecord;
use crate::error::{MetaLockError, Result};

/// Encode a record into the value written at the lock key.
pub fn encode(record: &OwnershipRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(record)
        .map_err(|e| MetaLockError::Codec(format!("failed to serialize ownership record: {}", e)))
}

/// Decode a stored value.
///
/// No value (or an empty one) decodes to `Ok(None)`; anything that is not a
/// JSON object of strings is a codec error.
pub fn decode(value: Option<&[u8]>) -> Result<Option<OwnershipRecord>> {
    match value {
        None => Ok(None),
        Some(bytes) if bytes.is_empty() => Ok(None),
        Some(bytes) => serde_json::from_slice(bytes).map(Some).map_err(|e| {
            MetaLockError::Codec(format!("failed to parse ownership record: {}", e))
        }),
    }
}
