use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::constants::DISPLAY_DECIMAL_PRECISION;

/// Returns the current calendar date in UTC.
///
/// This is the single source of truth for defaulting domain dates, e.g. a
/// position's purchase date when the caller omits it.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Rounds a monetary amount to display precision.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp(DISPLAY_DECIMAL_PRECISION)
}

/// Parses a calendar date leniently, returning `None` on malformed input.
///
/// Used at boundaries where external input (date pickers, imports) should
/// produce "no matches" rather than an error.
pub fn parse_date_lenient(input: &str) -> Option<NaiveDate> {
    input.trim().parse::<NaiveDate>().ok()
}
