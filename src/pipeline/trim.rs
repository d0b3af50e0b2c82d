//! Recency trimming
//!
//! Series are kept ascending. Trimming keeps the `limit` most recent
//! candles and leaves them in ascending order.

use crate::types::Candle;

/// Keep at most `limit` of the most recent candles of an ascending series
pub fn trim_recent(series: &[Candle], limit: usize) -> Vec<Candle> {
    let start = series.len().saturating_sub(limit);
    series[start..].to_vec()
}

/// Owned variant that avoids a copy when nothing needs trimming
pub fn trim_recent_owned(mut series: Vec<Candle>, limit: usize) -> Vec<Candle> {
    let excess = series.len().saturating_sub(limit);
    if excess > 0 {
        series.drain(..excess);
    }
    series
}
