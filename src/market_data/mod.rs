//! Market data module - OHLCV series from REST providers
//!
//! Forex pairs come from Alpha Vantage, crypto pairs from Twelve Data.
//! The snapshot assembler only sees the `CandleSource` trait, so tests and
//! other deployments can plug in any provider.

mod alpha_vantage;
mod router;
mod twelve_data;

pub use alpha_vantage::AlphaVantageClient;
pub use router::RoutedSource;
pub use twelve_data::TwelveDataClient;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use crate::types::{
    parse_decimal, parse_timestamp, AssetClass, Candle, Instrument, Interval, DEFAULT_CRYPTO_BASES,
};

/// Why a series could not be acquired
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request for {interval} timed out after {after_ms}ms")]
    Timeout { interval: Interval, after_ms: u64 },

    #[error("provider returned HTTP {status}")]
    Http { status: u16 },

    #[error("provider error: {0}")]
    Provider(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("{provider} does not serve the {interval} interval")]
    UnsupportedInterval {
        provider: &'static str,
        interval: Interval,
    },

    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
}

impl FetchError {
    /// Map transport failures from reqwest. Non-success statuses never reach
    /// here; the clients check them before decoding.
    pub(crate) fn from_reqwest(err: reqwest::Error, interval: Interval, after_ms: u64) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { interval, after_ms }
        } else if err.is_decode() {
            FetchError::MalformedPayload(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Fetch capability for raw candle series
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Fetch the raw series for one instrument and interval.
    ///
    /// Order of the returned candles is whatever the provider uses.
    async fn fetch(&self, instrument: &Instrument, interval: Interval)
        -> Result<Vec<Candle>, FetchError>;

    /// Market family the source files the instrument under
    fn asset_class(&self, instrument: &Instrument) -> AssetClass {
        instrument.asset_class(DEFAULT_CRYPTO_BASES)
    }
}

/// Build a candle from provider fields. Missing or non-numeric volume is zero.
pub(crate) fn candle_from_fields(
    timestamp: &str,
    open: Option<&Value>,
    high: Option<&Value>,
    low: Option<&Value>,
    close: Option<&Value>,
    volume: Option<&Value>,
) -> Result<Candle, FetchError> {
    let ts = parse_timestamp(timestamp)
        .ok_or_else(|| FetchError::MalformedPayload(format!("bad timestamp '{}'", timestamp)))?;

    let price = |field: &str, value: Option<&Value>| -> Result<Decimal, FetchError> {
        value.and_then(parse_decimal).ok_or_else(|| {
            FetchError::MalformedPayload(format!("missing {} at {}", field, timestamp))
        })
    };

    Ok(Candle {
        timestamp: ts,
        open: price("open", open)?,
        high: price("high", high)?,
        low: price("low", low)?,
        close: price("close", close)?,
        volume: volume.and_then(parse_decimal).unwrap_or(Decimal::ZERO),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_candle_from_text_fields() {
        let c = candle_from_fields(
            "2024-01-02 10:00:00",
            Some(&json!("1.1000")),
            Some(&json!("1.1050")),
            Some(&json!("1.0990")),
            Some(&json!("1.1020")),
            None,
        )
        .unwrap();
        assert_eq!(c.open, dec!(1.1000));
        assert_eq!(c.close, dec!(1.1020));
        assert_eq!(c.volume, Decimal::ZERO);
    }

    #[test]
    fn test_non_numeric_volume_is_zero() {
        let c = candle_from_fields(
            "2024-01-02",
            Some(&json!("1")),
            Some(&json!("2")),
            Some(&json!("0.5")),
            Some(&json!("1.5")),
            Some(&json!("")),
        )
        .unwrap();
        assert_eq!(c.volume, Decimal::ZERO);
    }

    #[test]
    fn test_missing_price_is_malformed() {
        let err = candle_from_fields(
            "2024-01-02 10:00:00",
            Some(&json!("1")),
            None,
            Some(&json!("1")),
            Some(&json!("1")),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::MalformedPayload(_)));

        let err = candle_from_fields("noon", None, None, None, None, None).unwrap_err();
        assert!(matches!(err, FetchError::MalformedPayload(_)));
    }

    #[test]
    fn test_transport_errors_map_to_network() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .unwrap_err();
        assert!(err.status().is_none());

        let mapped = FetchError::from_reqwest(err, Interval::Hour1, 1_000);
        assert!(matches!(mapped, FetchError::Network(_)), "{:?}", mapped);
    }
}
