use chrono::Utc;
use log::debug;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{PortfolioSnapshot, SnapshotOverrides};
use crate::constants::MAX_SNAPSHOTS;
use crate::positions::Position;
use crate::utils::{parse_date_lenient, round_money, today};

/// Bounded time series of portfolio valuations.
///
/// The store holds at most its retention cap of snapshots; eviction always
/// removes the oldest by timestamp, both at the cap and when the quota
/// guard needs room.
#[derive(Debug)]
pub struct SnapshotStore {
    snapshots: Vec<PortfolioSnapshot>,
    max_snapshots: usize,
    dirty: bool,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::with_retention(MAX_SNAPSHOTS)
    }

    /// Custom retention cap, primarily for tests and small quotas.
    pub fn with_retention(max_snapshots: usize) -> Self {
        SnapshotStore {
            snapshots: Vec::new(),
            max_snapshots,
            dirty: false,
        }
    }

    /// Rebuilds the store from persisted records (load path), trimming to
    /// the retention cap in case the cap shrank since the data was written.
    pub fn from_snapshots(snapshots: Vec<PortfolioSnapshot>, max_snapshots: usize) -> Self {
        let mut store = Self::with_retention(max_snapshots);
        store.snapshots = snapshots;
        store.dirty = false;
        store.trim_to_retention();
        store
    }

    /// Computes aggregates over `positions`, applies `overrides`, appends,
    /// and trims to the retention cap (oldest first). Returns a copy of the
    /// stored snapshot.
    pub fn create(
        &mut self,
        positions: &[Position],
        overrides: SnapshotOverrides,
    ) -> PortfolioSnapshot {
        let total_invested =
            round_money(positions.iter().map(|p| p.total_investment).sum::<Decimal>());
        let total_portfolio_value = overrides
            .total_portfolio_value
            .map(round_money)
            .unwrap_or_else(|| {
                round_money(positions.iter().map(|p| p.market_value()).sum::<Decimal>())
            });
        let gain_loss = round_money(total_portfolio_value - total_invested);
        let gain_loss_percentage = PortfolioSnapshot::percentage_of(gain_loss, total_invested);

        let snapshot = PortfolioSnapshot {
            id: Uuid::new_v4().to_string(),
            snapshot_date: overrides.snapshot_date.unwrap_or_else(today),
            timestamp: Utc::now(),
            total_portfolio_value,
            total_invested,
            gain_loss,
            gain_loss_percentage,
            positions_snapshot: positions.to_vec(),
        };
        debug!(
            "Created snapshot {} for {} ({} positions)",
            snapshot.id,
            snapshot.snapshot_date,
            positions.len()
        );
        self.snapshots.push(snapshot.clone());
        self.trim_to_retention();
        self.dirty = true;
        snapshot
    }

    /// Most-recent-first copy of the retained snapshots.
    pub fn list(&self) -> Vec<PortfolioSnapshot> {
        let mut out = self.snapshots.clone();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out
    }

    /// Inclusive filter on `snapshot_date`, ordered oldest-first.
    ///
    /// Malformed `start` or `end` yields an empty result rather than an
    /// error; "no matches" beats throwing for external input.
    pub fn by_date_range(&self, start: &str, end: &str) -> Vec<PortfolioSnapshot> {
        let (Some(start), Some(end)) = (parse_date_lenient(start), parse_date_lenient(end)) else {
            return Vec::new();
        };
        let mut out: Vec<PortfolioSnapshot> = self
            .snapshots
            .iter()
            .filter(|s| s.snapshot_date >= start && s.snapshot_date <= end)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.snapshot_date);
        out
    }

    /// Removes and returns the oldest snapshot by timestamp.
    pub fn evict_oldest(&mut self) -> Option<PortfolioSnapshot> {
        let index = self
            .snapshots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.timestamp)
            .map(|(i, _)| i)?;
        let evicted = self.snapshots.remove(index);
        debug!(
            "Evicted snapshot {} from {}",
            evicted.id, evicted.snapshot_date
        );
        self.dirty = true;
        Some(evicted)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Replaces the entire series (import path), applies retention, and
    /// marks the store dirty.
    pub fn replace_all(&mut self, snapshots: Vec<PortfolioSnapshot>) {
        self.snapshots = snapshots;
        self.trim_to_retention();
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

    fn trim_to_retention(&mut self) {
        while self.snapshots.len() > self.max_snapshots {
            self.evict_oldest();
        }
    }
}
