//! Persisted key layout and schema versioning.

/// Codec-encoded, integrity-sealed position list.
pub const POSITIONS_KEY: &str = "positions";

/// Codec-encoded, integrity-sealed snapshot list.
pub const SNAPSHOTS_KEY: &str = "snapshots";

/// Integer schema marker consulted before decoding.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Current version of the persisted schema.
pub const SCHEMA_VERSION: u32 = 2;

/// Pre-rework flat position array (`ticker`/`avgPrice` field layout).
pub const LEGACY_POSITIONS_KEY: &str = "portfolioPositions";

/// Pre-rework valuation history list.
pub const LEGACY_SNAPSHOTS_KEY: &str = "portfolioHistory";

/// Co-located previous successful payload for a managed key.
pub fn backup_key(key: &str) -> String {
    format!("backup_{}", key)
}
