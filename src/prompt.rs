//! Analysis prompt built from a snapshot
//!
//! The completion call itself lives outside this crate; this only renders
//! the request text with the OHLCV snapshot embedded as JSON.

use crate::pipeline::{SlotStatus, Snapshot};

const ANALYST_PREAMBLE: &str = "Act as a highly experienced institutional-level technical analyst \
specializing in multi-timeframe analysis, Smart Money Concepts (SMC), Inner Circle Trader (ICT) \
principles, liquidity analysis, volume interpretation, classical chart patterns, and mean \
reversion strategies. Your primary goal is to identify the highest probability trade setup for \
the given pair based on the current market data.";

const ANALYST_TASKS: &str = "Work top-down from the highest timeframe to the lowest. Identify \
market structure, key liquidity pools, order blocks and fair value gaps, then propose one setup \
with entry, stop loss, take profit targets and a confidence level. If no setup qualifies, say so.";

/// Render the analysis request for a snapshot
pub fn build_analysis_prompt(snapshot: &Snapshot) -> serde_json::Result<String> {
    let data = snapshot.ohlcv_json()?;

    let mut notes = Vec::new();
    for slot in snapshot.slots() {
        match &slot.status {
            SlotStatus::Ready(_) => {}
            SlotStatus::InsufficientHistory => notes.push(format!(
                "- {}: not enough history, ignore this timeframe",
                slot.label
            )),
            SlotStatus::Failed(_) => notes.push(format!(
                "- {}: data unavailable, ignore this timeframe",
                slot.label
            )),
        }
    }

    let mut prompt = format!(
        "{}\n\nPair: {}/{} ({})\n\nHere's the data for analysis (OHLCV, oldest first): {}\n",
        ANALYST_PREAMBLE,
        snapshot.instrument.base,
        snapshot.instrument.quote,
        snapshot.asset_class,
        data
    );
    if !notes.is_empty() {
        prompt.push_str("\nData gaps:\n");
        prompt.push_str(&notes.join("\n"));
        prompt.push('\n');
    }
    prompt.push('\n');
    prompt.push_str(ANALYST_TASKS);

    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{TimeframeSlot, Timeframes};
    use crate::types::{AssetClass, Instrument};
    use chrono::Utc;
    use uuid::Uuid;

    #[test]
    fn test_prompt_embeds_snapshot_and_gaps() {
        let snapshot = Snapshot {
            request_id: Uuid::nil(),
            instrument: Instrument::parse("GBPUSD").unwrap(),
            asset_class: AssetClass::Forex,
            generated_at: Utc::now(),
            timeframes: Timeframes(vec![
                TimeframeSlot {
                    label: "1H".into(),
                    status: SlotStatus::Ready(vec![]),
                },
                TimeframeSlot {
                    label: "15M".into(),
                    status: SlotStatus::Failed("provider error".into()),
                },
            ]),
        };

        let prompt = build_analysis_prompt(&snapshot).unwrap();
        assert!(prompt.contains("Pair: GBP/USD (forex)"));
        assert!(prompt.contains(&snapshot.ohlcv_json().unwrap()));
        assert!(prompt.contains("- 15M: data unavailable"));
        assert!(!prompt.contains("- 1H:"));
    }
}
