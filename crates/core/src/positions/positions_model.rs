use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::round_money;

/// A single validated purchase lot.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub id: String,
    /// Normalized ticker symbol (trimmed, upper-case).
    pub symbol: String,
    pub quantity: Decimal,
    pub purchase_price_per_share: Decimal,
    pub purchase_date: NaiveDate,
    /// Derived: `quantity * purchase_price_per_share`, rounded to 2 dp.
    pub total_investment: Decimal,
    /// Last fetched market price, maintained by the quote layer.
    #[serde(default)]
    pub current_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Market value at the last known price, falling back to the purchase
    /// price when no quote has been recorded yet.
    pub fn market_value(&self) -> Decimal {
        let price = self.current_price.unwrap_or(self.purchase_price_per_share);
        round_money(self.quantity * price)
    }
}

/// Input for creating a position.
///
/// `id` and `purchase_date` are defaulted by the store when absent.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPosition {
    pub id: Option<String>,
    pub symbol: String,
    pub quantity: Decimal,
    pub purchase_price_per_share: Decimal,
    pub purchase_date: Option<NaiveDate>,
    pub current_price: Option<Decimal>,
}

/// Partial update; `None` fields keep their current values.
///
/// The merged record is re-validated as a whole before anything is written.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PositionUpdate {
    pub symbol: Option<String>,
    pub quantity: Option<Decimal>,
    pub purchase_price_per_share: Option<Decimal>,
    pub purchase_date: Option<NaiveDate>,
    pub current_price: Option<Decimal>,
}
