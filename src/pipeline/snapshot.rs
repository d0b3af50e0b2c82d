//! Multi-timeframe snapshot handed to downstream consumers

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::types::{AssetClass, Candle, Instrument};

/// Outcome of one timeframe slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    /// Trimmed series in ascending order
    Ready(Vec<Candle>),
    /// Derived timeframe whose source was too short for a single candle
    InsufficientHistory,
    /// Fetch failed, or the slot's source timeframe failed
    Failed(String),
}

impl SlotStatus {
    pub fn candles(&self) -> &[Candle] {
        match self {
            SlotStatus::Ready(candles) => candles,
            _ => &[],
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, SlotStatus::Ready(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SlotStatus::Failed(_))
    }

    fn tag(&self) -> &'static str {
        match self {
            SlotStatus::Ready(_) => "ok",
            SlotStatus::InsufficientHistory => "insufficient_history",
            SlotStatus::Failed(_) => "error",
        }
    }
}

impl Serialize for SlotStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SlotStatus", 3)?;
        state.serialize_field("status", self.tag())?;
        state.serialize_field("candles", self.candles())?;
        match self {
            SlotStatus::Failed(msg) => state.serialize_field("error", msg)?,
            _ => state.serialize_field("error", &Option::<String>::None)?,
        }
        state.end()
    }
}

/// Labelled slot in configured order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeframeSlot {
    pub label: String,
    pub status: SlotStatus,
}

/// Serialized as a JSON object keyed by label, keeping slot order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Timeframes(pub Vec<TimeframeSlot>);

impl Serialize for Timeframes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for slot in &self.0 {
            map.serialize_entry(&slot.label, &slot.status)?;
        }
        map.end()
    }
}

/// Per-request collection of candle series across all timeframes
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub request_id: Uuid,
    pub instrument: Instrument,
    pub asset_class: AssetClass,
    pub generated_at: DateTime<Utc>,
    pub timeframes: Timeframes,
}

impl Snapshot {
    pub fn get(&self, label: &str) -> Option<&SlotStatus> {
        self.timeframes
            .0
            .iter()
            .find(|slot| slot.label == label)
            .map(|slot| &slot.status)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.timeframes.0.iter().map(|slot| slot.label.as_str())
    }

    pub fn slots(&self) -> &[TimeframeSlot] {
        &self.timeframes.0
    }

    /// Labels of failed slots
    pub fn failures(&self) -> Vec<&str> {
        self.timeframes
            .0
            .iter()
            .filter(|slot| slot.status.is_failed())
            .map(|slot| slot.label.as_str())
            .collect()
    }

    /// JSON of the timeframe map alone, the shape analysis prompts embed
    pub fn ohlcv_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.timeframes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn snapshot(slots: Vec<TimeframeSlot>) -> Snapshot {
        Snapshot {
            request_id: Uuid::nil(),
            instrument: Instrument::parse("EURUSD").unwrap(),
            asset_class: AssetClass::Forex,
            generated_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            timeframes: Timeframes(slots),
        }
    }

    #[test]
    fn test_json_keeps_slot_order() {
        let labels = ["1D", "4H", "1H", "15M", "5M"];
        let snap = snapshot(
            labels
                .iter()
                .map(|l| TimeframeSlot {
                    label: l.to_string(),
                    status: SlotStatus::InsufficientHistory,
                })
                .collect(),
        );

        let json = snap.ohlcv_json().unwrap();
        let positions: Vec<usize> = labels
            .iter()
            .map(|l| json.find(&format!("\"{}\"", l)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", json);
    }

    #[test]
    fn test_slot_status_json() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap();
        let candle = Candle::new(ts, dec!(1.1), dec!(1.2), dec!(1.0), dec!(1.15), dec!(0));
        let snap = snapshot(vec![
            TimeframeSlot {
                label: "1H".into(),
                status: SlotStatus::Ready(vec![candle]),
            },
            TimeframeSlot {
                label: "15M".into(),
                status: SlotStatus::Failed("timed out".into()),
            },
        ]);

        let value = serde_json::to_value(&snap).unwrap();
        let tf = &value["timeframes"];
        assert_eq!(tf["1H"]["status"], "ok");
        assert_eq!(tf["1H"]["candles"].as_array().unwrap().len(), 1);
        assert_eq!(tf["1H"]["error"], serde_json::Value::Null);
        assert_eq!(tf["15M"]["status"], "error");
        assert_eq!(tf["15M"]["error"], "timed out");
        assert_eq!(value["instrument"]["base"], "EUR");
        assert_eq!(snap.failures(), vec!["15M"]);
    }
}
