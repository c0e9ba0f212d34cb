//! Reversible text encoding with an optional run-length compression pass.
//!
//! Payloads are canonical JSON text. Once a payload crosses the compression
//! threshold, maximal runs of a repeated character are collapsed into
//! `char` + count and the result travels inside a small envelope recording
//! the original and compressed sizes. Short payloads are stored as-is.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use pocketfolio_core::errors::{Error, Result, StorageError};

/// Serialized payloads shorter than this are stored unmodified.
pub const COMPRESSION_THRESHOLD: usize = 1024;

/// Minimum run length worth collapsing.
const MIN_RUN_LEN: usize = 2;

/// Ceiling on expanded output so a corrupted run count cannot balloon
/// memory.
const MAX_EXPANDED_LEN: usize = 64 * 1024 * 1024;

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct CompressedEnvelope {
    compressed: bool,
    data: String,
    original_size: usize,
    compressed_size: usize,
}

/// Text codec for persisted payloads.
#[derive(Debug, Clone)]
pub struct Codec {
    compression_threshold: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Codec::new(COMPRESSION_THRESHOLD)
    }
}

impl Codec {
    pub fn new(compression_threshold: usize) -> Self {
        Codec {
            compression_threshold,
        }
    }

    /// Serializes `value` to canonical JSON text, applying the run-length
    /// pass once the payload crosses the compression threshold.
    ///
    /// The compressed form is committed only when expanding it reproduces
    /// the serialized text exactly and actually saves space; otherwise the
    /// plain text is stored. `decode(encode(v))` therefore round-trips
    /// every serializable value, including text the run-length shorthand
    /// cannot represent unambiguously.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<String> {
        let plain =
            serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))?;
        if plain.len() < self.compression_threshold {
            return Ok(plain);
        }

        let packed = compress_runs(&plain);
        if packed.len() >= plain.len() {
            return Ok(plain);
        }
        match expand_runs(&packed) {
            Ok(expanded) if expanded == plain => {}
            _ => return Ok(plain),
        }

        let envelope = CompressedEnvelope {
            compressed: true,
            original_size: plain.len(),
            compressed_size: packed.len(),
            data: packed,
        };
        serde_json::to_string(&envelope)
            .map_err(|e| Error::from(StorageError::Serialization(e.to_string())))
    }

    /// Deserializes a payload produced by [`encode`](Codec::encode).
    ///
    /// Envelope payloads are expanded first; plain payloads deserialize
    /// directly.
    pub fn decode<T: DeserializeOwned>(&self, payload: &str) -> Result<T> {
        if let Ok(envelope) = serde_json::from_str::<CompressedEnvelope>(payload) {
            if envelope.compressed {
                let plain = expand_runs(&envelope.data)?;
                return serde_json::from_str(&plain)
                    .map_err(|e| Error::from(StorageError::Serialization(e.to_string())));
            }
        }
        serde_json::from_str(payload)
            .map_err(|e| Error::from(StorageError::Serialization(e.to_string())))
    }
}

/// Collapses every maximal run of a repeated character (length >= 2) into
/// the character followed by its decimal repeat count. Non-repeating input
/// passes through unchanged.
pub fn compress_runs(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        let mut run = 1usize;
        while chars.peek() == Some(&c) {
            chars.next();
            run += 1;
        }
        out.push(c);
        if run >= MIN_RUN_LEN {
            out.push_str(&run.to_string());
        }
    }
    out
}

/// Expands a run-length encoded string: any character followed by a decimal
/// digit run is repeated that many times.
///
/// A zero or implausibly large count is reported as corruption rather than
/// expanded.
pub fn expand_runs(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        let mut digits = String::new();
        while let Some(d) = chars.peek().copied() {
            if d.is_ascii_digit() {
                digits.push(d);
                chars.next();
            } else {
                break;
            }
        }
        if digits.is_empty() {
            out.push(c);
            continue;
        }

        let count: usize = digits
            .parse()
            .map_err(|_| StorageError::Corruption(format!("unreadable run count '{}'", digits)))?;
        let run_bytes = count.checked_mul(c.len_utf8());
        if count == 0 || run_bytes.map_or(true, |b| out.len() + b > MAX_EXPANDED_LEN) {
            return Err(
                StorageError::Corruption(format!("implausible run count {}", count)).into(),
            );
        }
        for _ in 0..count {
            out.push(c);
        }
    }
    Ok(out)
}
