//! Candle series normalization
//!
//! Sources return candles in whatever order suits them (Twelve Data is
//! newest-first, Alpha Vantage is an unordered JSON object). Everything
//! downstream expects ascending time.

use crate::types::Candle;

/// Return the series sorted ascending by timestamp.
///
/// The sort is stable: candles sharing a timestamp keep their input order.
pub fn normalize(raw: &[Candle]) -> Vec<Candle> {
    let mut series = raw.to_vec();
    series.sort_by_key(|c| c.timestamp);
    series
}

/// Check whether a series is already in ascending order
pub fn is_ascending(series: &[Candle]) -> bool {
    series.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}
