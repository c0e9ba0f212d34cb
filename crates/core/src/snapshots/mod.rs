//! Portfolio valuation snapshots - immutable time series with retention.

mod snapshot_model;
mod snapshot_store;

pub use snapshot_model::*;
pub use snapshot_store::*;

#[cfg(test)]
mod snapshot_store_tests;
