//! Timeframe aggregation - builds coarser candles from finer ones
//!
//! Groups `factor` consecutive candles of an ascending series into one
//! synthetic candle, scanning from the oldest candle forward. A trailing
//! group shorter than `factor` is an unfinished period and is dropped.

use crate::types::Candle;

/// Aggregate an ascending series by a fixed grouping factor.
///
/// The caller must normalize first; this function never re-sorts. Returns
/// an empty series when there is not enough history for one full group
/// (or when `factor` is zero).
pub fn aggregate(series: &[Candle], factor: usize) -> Vec<Candle> {
    if factor == 0 {
        return Vec::new();
    }

    series
        .chunks_exact(factor)
        .filter_map(merge_group)
        .collect()
}

/// Merge one complete group: opened by the first member, stamped and
/// closed by the last.
fn merge_group(group: &[Candle]) -> Option<Candle> {
    let first = group.first()?;
    let last = group.last()?;

    let mut high = first.high;
    let mut low = first.low;
    let mut volume = rust_decimal::Decimal::ZERO;
    for c in group {
        high = high.max(c.high);
        low = low.min(c.low);
        volume += c.volume;
    }

    Some(Candle {
        timestamp: last.timestamp,
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
    })
}
