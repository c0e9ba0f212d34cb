use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Result;
use crate::positions::{NewPosition, Position, PositionStore};
use crate::snapshots::PortfolioSnapshot;

/// Version of the export document shape.
pub const EXPORT_VERSION: u32 = 2;

/// Full portfolio export document.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioExport {
    pub version: u32,
    pub export_date: DateTime<Utc>,
    pub positions: Vec<Position>,
    pub snapshots: Vec<PortfolioSnapshot>,
    pub metadata: ExportMetadata,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub position_count: usize,
    pub snapshot_count: usize,
    #[serde(default)]
    pub generator: String,
}

impl PortfolioExport {
    pub fn build(positions: Vec<Position>, snapshots: Vec<PortfolioSnapshot>) -> Self {
        PortfolioExport {
            version: EXPORT_VERSION,
            export_date: Utc::now(),
            metadata: ExportMetadata {
                position_count: positions.len(),
                snapshot_count: snapshots.len(),
                generator: "pocketfolio".to_string(),
            },
            positions,
            snapshots,
        }
    }
}

/// Raw import document.
///
/// Entries stay untyped so one malformed record cannot fail the whole
/// import; they are validated one by one by the sanitizers below.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase", default)]
pub struct PortfolioImport {
    pub version: u32,
    pub positions: Vec<Value>,
    pub snapshots: Vec<Value>,
}

impl Default for PortfolioImport {
    fn default() -> Self {
        PortfolioImport {
            version: EXPORT_VERSION,
            positions: Vec::new(),
            snapshots: Vec::new(),
        }
    }
}

/// Validates imported position entries one by one, dropping invalid ones.
/// Returns the accepted records and the number dropped.
pub fn sanitize_positions(entries: Vec<Value>) -> (Vec<Position>, usize) {
    let mut accepted = Vec::new();
    let mut dropped = 0usize;
    for entry in entries {
        match validate_imported_position(entry) {
            Ok(position) => accepted.push(position),
            Err(e) => {
                warn!("Dropping invalid imported position: {}", e);
                dropped += 1;
            }
        }
    }
    (accepted, dropped)
}

/// Validates imported snapshot entries one by one, dropping invalid ones.
pub fn sanitize_snapshots(entries: Vec<Value>) -> (Vec<PortfolioSnapshot>, usize) {
    let mut accepted = Vec::new();
    let mut dropped = 0usize;
    for entry in entries {
        match serde_json::from_value::<PortfolioSnapshot>(entry) {
            Ok(snapshot) => accepted.push(snapshot),
            Err(e) => {
                warn!("Dropping invalid imported snapshot: {}", e);
                dropped += 1;
            }
        }
    }
    (accepted, dropped)
}

fn validate_imported_position(entry: Value) -> Result<Position> {
    // Full records keep their identity and creation time; the field checks
    // still run so a hand-edited export cannot smuggle in bad data.
    if let Ok(position) = serde_json::from_value::<Position>(entry.clone()) {
        let input = NewPosition {
            id: Some(position.id.clone()),
            symbol: position.symbol.clone(),
            quantity: position.quantity,
            purchase_price_per_share: position.purchase_price_per_share,
            purchase_date: Some(position.purchase_date),
            current_price: position.current_price,
        };
        let mut validated = PositionStore::validate(input)?;
        validated.created_at = position.created_at;
        return Ok(validated);
    }

    // Partial entries go through the same defaulting path as manual entry.
    let input: NewPosition = serde_json::from_value(entry)?;
    PositionStore::validate(input)
}
