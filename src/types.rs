//! Core types used throughout the snapshot pipeline
//!
//! Defines candles, fetch intervals and instrument identifiers.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Bases treated as crypto when no routing list is configured
pub const DEFAULT_CRYPTO_BASES: &[&str] = &["BTC", "ETH", "SOL", "DOG", "BNB", "XRP", "ADA", "LTC"];

/// Candlestick data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candle {
    /// Period timestamp as reported by the source
    pub timestamp: DateTime<Utc>,
    /// Open price
    pub open: Decimal,
    /// High price
    pub high: Decimal,
    /// Low price
    pub low: Decimal,
    /// Close price
    pub close: Decimal,
    /// Volume (zero when the source has none)
    pub volume: Decimal,
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Parse a source timestamp into an instant.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and bare dates. Naive values are
/// read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a decimal that may arrive as text or as a JSON number
pub fn parse_decimal(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

/// Fetch intervals understood by the data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "15m")]
    Min15,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl Interval {
    /// Get duration in seconds
    pub fn duration_secs(&self) -> u64 {
        match self {
            Interval::Min5 => 5 * 60,
            Interval::Min15 => 15 * 60,
            Interval::Hour1 => 60 * 60,
            Interval::Hour4 => 4 * 60 * 60,
            Interval::Day1 => 24 * 60 * 60,
        }
    }

    /// Parse from string
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "5m" | "5min" => Some(Interval::Min5),
            "15m" | "15min" => Some(Interval::Min15),
            "1h" | "60min" | "1hour" => Some(Interval::Hour1),
            "4h" | "4hour" => Some(Interval::Hour4),
            "1d" | "1day" | "daily" => Some(Interval::Day1),
            _ => None,
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Min5 => write!(f, "5m"),
            Interval::Min15 => write!(f, "15m"),
            Interval::Hour1 => write!(f, "1h"),
            Interval::Hour4 => write!(f, "4h"),
            Interval::Day1 => write!(f, "1d"),
        }
    }
}

/// Market family of an instrument, decides which source serves it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Forex,
    Crypto,
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Forex => write!(f, "forex"),
            AssetClass::Crypto => write!(f, "crypto"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid instrument '{0}': expected a pair of two 3-letter codes such as EURUSD")]
pub struct InstrumentError(pub String);

/// A tradable pair split into base and quote codes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Instrument {
    pub base: String,
    pub quote: String,
}

impl Instrument {
    /// Parse "EURUSD", "eur/usd" or "BTC-USD" style identifiers.
    ///
    /// Only the first six letters are used, so "BTCUSDT" resolves to BTC/USD.
    pub fn parse(raw: &str) -> Result<Self, InstrumentError> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && !matches!(c, '/' | '-' | '_'))
            .collect();

        let code: Vec<char> = compact.chars().take(6).collect();
        if code.len() < 6 || !code.iter().all(|c| c.is_ascii_alphabetic()) {
            return Err(InstrumentError(raw.to_string()));
        }

        let base: String = code[..3].iter().collect();
        let quote: String = code[3..].iter().collect();
        Ok(Self {
            base: base.to_uppercase(),
            quote: quote.to_uppercase(),
        })
    }

    /// Classify against a list of crypto base codes
    pub fn asset_class<S: AsRef<str>>(&self, crypto_bases: &[S]) -> AssetClass {
        if crypto_bases
            .iter()
            .any(|b| b.as_ref().eq_ignore_ascii_case(&self.base))
        {
            AssetClass::Crypto
        } else {
            AssetClass::Forex
        }
    }

    /// Symbol form used by REST APIs (e.g., "BTC/USD")
    pub fn slash_symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

impl FromStr for Instrument {
    type Err = InstrumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.quote)
    }
}
