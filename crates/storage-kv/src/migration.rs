//! One-time migration of the pre-rework key layout.
//!
//! Older builds persisted a flat array of `{ticker, avgPrice, quantity}`
//! records plus a valuation history list, unsealed and uncompressed. When
//! the current keys yield nothing, this module converts whatever legacy
//! data exists into validated records and removes the legacy keys; the
//! caller persists the result under the current layout.

use chrono::NaiveTime;
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use pocketfolio_core::positions::{NewPosition, Position, PositionStore};
use pocketfolio_core::snapshots::PortfolioSnapshot;
use pocketfolio_core::utils::{parse_date_lenient, round_money};

use crate::backend::KeyValueBackend;
use crate::keys::{LEGACY_POSITIONS_KEY, LEGACY_SNAPSHOTS_KEY};

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct LegacyPosition {
    ticker: Option<String>,
    symbol: Option<String>,
    avg_price: Option<Decimal>,
    purchase_price: Option<Decimal>,
    quantity: Option<Decimal>,
    date: Option<String>,
    purchase_date: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct LegacyHistoryEntry {
    date: Option<String>,
    total_value: Option<Decimal>,
    invested: Option<Decimal>,
}

/// Data recovered from the legacy layout.
#[derive(Debug, Default)]
pub struct MigratedData {
    pub positions: Vec<Position>,
    pub snapshots: Vec<PortfolioSnapshot>,
}

pub struct LegacyMigrator;

impl LegacyMigrator {
    /// Returns `Some` when a legacy layout was found and converted, `None`
    /// when no legacy keys exist (a no-op, never an error). Legacy keys are
    /// removed once their contents have been read, so a second run is a
    /// no-op.
    pub fn run(backend: &mut dyn KeyValueBackend) -> Option<MigratedData> {
        let legacy_positions = backend.get(LEGACY_POSITIONS_KEY);
        let legacy_history = backend.get(LEGACY_SNAPSHOTS_KEY);
        if legacy_positions.is_none() && legacy_history.is_none() {
            return None;
        }
        info!("Legacy portfolio layout detected, migrating");

        let mut data = MigratedData::default();
        if let Some(text) = legacy_positions {
            data.positions = convert_positions(&text);
            backend.remove(LEGACY_POSITIONS_KEY);
        }
        if let Some(text) = legacy_history {
            data.snapshots = convert_history(&text);
            backend.remove(LEGACY_SNAPSHOTS_KEY);
        }
        info!(
            "Migrated {} positions and {} snapshots from the legacy layout",
            data.positions.len(),
            data.snapshots.len()
        );
        Some(data)
    }
}

fn convert_positions(text: &str) -> Vec<Position> {
    let entries: Vec<LegacyPosition> = match serde_json::from_str(text) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Legacy position list unreadable, skipping: {}", e);
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for entry in entries {
        let input = NewPosition {
            id: None,
            symbol: entry.symbol.or(entry.ticker).unwrap_or_default(),
            quantity: entry.quantity.unwrap_or_default(),
            purchase_price_per_share: entry
                .purchase_price
                .or(entry.avg_price)
                .unwrap_or_default(),
            purchase_date: entry
                .purchase_date
                .or(entry.date)
                .as_deref()
                .and_then(parse_date_lenient),
            current_price: None,
        };
        match PositionStore::validate(input) {
            Ok(position) => out.push(position),
            Err(e) => warn!("Dropping unmigratable legacy position: {}", e),
        }
    }
    out
}

fn convert_history(text: &str) -> Vec<PortfolioSnapshot> {
    let entries: Vec<LegacyHistoryEntry> = match serde_json::from_str(text) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Legacy history list unreadable, skipping: {}", e);
            return Vec::new();
        }
    };

    let mut out = Vec::new();
    for entry in entries {
        let Some(snapshot_date) = entry.date.as_deref().and_then(parse_date_lenient) else {
            warn!("Dropping legacy history entry without a readable date");
            continue;
        };
        let Some(total_value) = entry.total_value else {
            warn!("Dropping legacy history entry for {} without a value", snapshot_date);
            continue;
        };

        let total_portfolio_value = round_money(total_value);
        let total_invested = entry
            .invested
            .map(round_money)
            .unwrap_or(total_portfolio_value);
        let gain_loss = round_money(total_portfolio_value - total_invested);
        out.push(PortfolioSnapshot {
            id: Uuid::new_v4().to_string(),
            snapshot_date,
            timestamp: snapshot_date.and_time(NaiveTime::MIN).and_utc(),
            total_portfolio_value,
            total_invested,
            gain_loss,
            gain_loss_percentage: PortfolioSnapshot::percentage_of(gain_loss, total_invested),
            positions_snapshot: Vec::new(),
        });
    }
    out
}
