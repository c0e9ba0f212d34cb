use chrono::Utc;
use log::debug;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{NewPosition, Position, PositionUpdate};
use crate::errors::{Error, Result, ValidationError};
use crate::utils::{round_money, today};

/// Canonical, validated collection of portfolio positions.
///
/// The store owns the live position list exclusively; callers receive
/// defensive copies from [`list`](PositionStore::list). Every successful
/// mutation marks the store dirty for the persistence scheduler.
#[derive(Debug, Default)]
pub struct PositionStore {
    positions: Vec<Position>,
    dirty: bool,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the store from already-validated records (load path).
    pub fn from_positions(positions: Vec<Position>) -> Self {
        PositionStore {
            positions,
            dirty: false,
        }
    }

    /// Validates `input` into a full record, normalizing the symbol and
    /// defaulting `id` and `purchase_date`. Rejected input writes nothing.
    pub fn validate(input: NewPosition) -> Result<Position> {
        let symbol = input.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ValidationError::MissingField("symbol".to_string()).into());
        }
        require_positive("quantity", input.quantity)?;
        require_positive("purchasePricePerShare", input.purchase_price_per_share)?;
        if let Some(price) = input.current_price {
            require_positive("currentPrice", price)?;
        }

        let now = Utc::now();
        Ok(Position {
            id: input
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            symbol,
            quantity: input.quantity,
            purchase_price_per_share: input.purchase_price_per_share,
            purchase_date: input.purchase_date.unwrap_or_else(today),
            total_investment: round_money(input.quantity * input.purchase_price_per_share),
            current_price: input.current_price,
            created_at: now,
            updated_at: now,
        })
    }

    /// Adds a new lot. Duplicate symbols coexist as separate lots; merging
    /// is never implicit (see [`merge`](PositionStore::merge)).
    pub fn add(&mut self, input: NewPosition) -> Result<Position> {
        let position = Self::validate(input)?;
        debug!("Adding position {} ({})", position.symbol, position.id);
        self.positions.push(position.clone());
        self.dirty = true;
        Ok(position)
    }

    /// Folds `input` into an existing lot with the same symbol, combining
    /// quantities under a quantity-weighted average price and keeping the
    /// earlier purchase date. Behaves as [`add`](PositionStore::add) when
    /// the symbol is not held yet.
    ///
    /// Merging is always an explicit caller choice.
    pub fn merge(&mut self, input: NewPosition) -> Result<Position> {
        let incoming = Self::validate(input)?;
        let index = self
            .positions
            .iter()
            .position(|p| p.symbol == incoming.symbol);
        let Some(index) = index else {
            debug!("Merge target {} not held, adding new lot", incoming.symbol);
            self.positions.push(incoming.clone());
            self.dirty = true;
            return Ok(incoming);
        };

        let existing = &mut self.positions[index];
        let combined_quantity = existing.quantity + incoming.quantity;
        let combined_cost = existing.quantity * existing.purchase_price_per_share
            + incoming.quantity * incoming.purchase_price_per_share;
        existing.purchase_price_per_share = combined_cost / combined_quantity;
        existing.quantity = combined_quantity;
        existing.total_investment = round_money(combined_cost);
        existing.purchase_date = existing.purchase_date.min(incoming.purchase_date);
        existing.updated_at = Utc::now();
        self.dirty = true;
        Ok(existing.clone())
    }

    /// Merges partial fields onto the existing record and re-validates the
    /// whole result, rejecting the entire update when any field is invalid.
    pub fn update(&mut self, id: &str, update: PositionUpdate) -> Result<Position> {
        let index = self
            .positions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("Position {}", id)))?;

        let current = self.positions[index].clone();
        let merged = NewPosition {
            id: Some(current.id.clone()),
            symbol: update.symbol.unwrap_or_else(|| current.symbol.clone()),
            quantity: update.quantity.unwrap_or(current.quantity),
            purchase_price_per_share: update
                .purchase_price_per_share
                .unwrap_or(current.purchase_price_per_share),
            purchase_date: Some(update.purchase_date.unwrap_or(current.purchase_date)),
            current_price: update.current_price.or(current.current_price),
        };

        let mut validated = Self::validate(merged)?;
        validated.created_at = current.created_at;
        validated.updated_at = Utc::now();
        self.positions[index] = validated.clone();
        self.dirty = true;
        Ok(validated)
    }

    pub fn delete(&mut self, id: &str) -> Result<Position> {
        let index = self
            .positions
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::NotFound(format!("Position {}", id)))?;
        let removed = self.positions.remove(index);
        debug!("Deleted position {} ({})", removed.symbol, removed.id);
        self.dirty = true;
        Ok(removed)
    }

    /// Stores the latest fetched quote on every lot of `symbol` and returns
    /// how many lots were touched.
    pub fn record_quote(&mut self, symbol: &str, price: Decimal) -> Result<usize> {
        require_positive("currentPrice", price)?;
        let normalized = symbol.trim().to_uppercase();
        let now = Utc::now();
        let mut touched = 0;
        for position in self.positions.iter_mut().filter(|p| p.symbol == normalized) {
            position.current_price = Some(price);
            position.updated_at = now;
            touched += 1;
        }
        if touched > 0 {
            self.dirty = true;
        }
        Ok(touched)
    }

    pub fn get(&self, id: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    /// Ordered defensive copy; mutations on the result never touch the
    /// canonical store.
    pub fn list(&self) -> Vec<Position> {
        self.positions.clone()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Replaces the entire collection (import path) and marks the store
    /// dirty so the next flush persists it.
    pub fn replace_all(&mut self, positions: Vec<Position>) {
        self.positions = positions;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clears and returns the dirty flag; called by the flush path once the
    /// state has been committed.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

fn require_positive(field: &'static str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveNumber {
            field,
            value: value.to_string(),
        }
        .into());
    }
    Ok(())
}
