//! Payload fingerprinting and tamper detection.
//!
//! Every managed key stores a sealed record `{ checksum, payload }`. On
//! load the checksum is recomputed over the payload text and compared
//! before the payload is decoded; any mismatch or shape surprise is
//! reported as corruption and sends the caller down the recovery ladder
//! (backup, then legacy migration, then empty defaults).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use pocketfolio_core::errors::{Result, StorageError};

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SealedRecord {
    checksum: String,
    payload: String,
}

/// Lowercase hex SHA-256 of the payload text.
pub fn fingerprint(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Wraps a payload with its fingerprint for storage.
pub fn seal(payload: &str) -> Result<String> {
    let record = SealedRecord {
        checksum: fingerprint(payload),
        payload: payload.to_string(),
    };
    serde_json::to_string(&record)
        .map_err(|e| StorageError::Serialization(e.to_string()).into())
}

/// Verifies a sealed record and returns the inner payload.
///
/// Records written before sealing existed carry no checksum and are treated
/// the same as tampered ones; recovery handles both.
pub fn unseal(text: &str) -> Result<String> {
    let record: SealedRecord = serde_json::from_str(text)
        .map_err(|e| StorageError::Corruption(format!("unreadable sealed record: {}", e)))?;
    let actual = fingerprint(&record.payload);
    if actual != record.checksum {
        return Err(StorageError::Corruption(format!(
            "checksum mismatch: stored {}, computed {}",
            record.checksum, actual
        ))
        .into());
    }
    Ok(record.payload)
}
