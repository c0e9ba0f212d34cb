//! Portfolio snapshot domain models.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::positions::Position;
use crate::utils::round_money;

/// An immutable point-in-time valuation of the whole position set.
///
/// Snapshots are never mutated after creation; the retention policy may
/// remove them oldest-first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSnapshot {
    pub id: String,
    pub snapshot_date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub total_portfolio_value: Decimal,
    pub total_invested: Decimal,
    pub gain_loss: Decimal,
    pub gain_loss_percentage: Decimal,
    /// Deep, independent copy of all positions at creation time.
    #[serde(default)]
    pub positions_snapshot: Vec<Position>,
}

impl PortfolioSnapshot {
    /// Gain/loss percentage with the zero-invested guard.
    pub fn percentage_of(gain_loss: Decimal, total_invested: Decimal) -> Decimal {
        if total_invested.is_zero() {
            Decimal::ZERO
        } else {
            round_money(gain_loss / total_invested * Decimal::ONE_HUNDRED)
        }
    }
}

/// Caller-supplied overrides applied when a snapshot is created.
#[derive(Debug, Clone, Default)]
pub struct SnapshotOverrides {
    /// Explicit valuation date; defaults to today.
    pub snapshot_date: Option<NaiveDate>,
    /// Portfolio value from the quote layer; defaults to the sum of each
    /// position's market value.
    pub total_portfolio_value: Option<Decimal>,
}
