/// Maximum number of valuation snapshots retained by the snapshot store
pub const MAX_SNAPSHOTS: usize = 365;

/// Decimal precision for monetary amounts surfaced to the UI
pub const DISPLAY_DECIMAL_PRECISION: u32 = 2;
