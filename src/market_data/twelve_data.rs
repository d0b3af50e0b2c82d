//! Twelve Data REST client for crypto OHLCV series
//!
//! `time_series` returns candles newest-first under "values".

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::{candle_from_fields, CandleSource, FetchError};
use crate::config::TwelveDataConfig;
use crate::types::{Candle, Instrument, Interval};

const PROVIDER: &str = "Twelve Data";

#[derive(Debug, Clone)]
pub struct TwelveDataClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    output_size: usize,
    timeout_ms: u64,
}

impl TwelveDataClient {
    pub fn new(config: &TwelveDataConfig, timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            output_size: config.output_size,
            timeout_ms,
        }
    }

    fn interval_param(interval: Interval) -> &'static str {
        match interval {
            Interval::Min5 => "5min",
            Interval::Min15 => "15min",
            Interval::Hour1 => "1h",
            Interval::Hour4 => "4h",
            Interval::Day1 => "1day",
        }
    }

    /// Parse a `time_series` response body
    pub fn parse_payload(body: &Value) -> Result<Vec<Candle>, FetchError> {
        if body.get("status").and_then(Value::as_str) == Some("error") {
            let msg = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(FetchError::Provider(msg.to_string()));
        }

        let values = body
            .get("values")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::MalformedPayload("no values in response".into()))?;

        values
            .iter()
            .map(|v| {
                let ts = v.get("datetime").and_then(Value::as_str).ok_or_else(|| {
                    FetchError::MalformedPayload("value without datetime".into())
                })?;
                candle_from_fields(
                    ts,
                    v.get("open"),
                    v.get("high"),
                    v.get("low"),
                    v.get("close"),
                    v.get("volume"),
                )
            })
            .collect()
    }
}

#[async_trait]
impl CandleSource for TwelveDataClient {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn fetch(
        &self,
        instrument: &Instrument,
        interval: Interval,
    ) -> Result<Vec<Candle>, FetchError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(FetchError::MissingApiKey(PROVIDER))?;

        let url = format!("{}/time_series", self.base_url);
        let output_size = self.output_size.to_string();
        let symbol = instrument.slash_symbol();
        let params = [
            ("symbol", symbol.as_str()),
            ("interval", Self::interval_param(interval)),
            ("outputsize", output_size.as_str()),
            ("apikey", api_key),
        ];

        tracing::debug!(
            instrument = %instrument,
            interval = %interval,
            "📥 Fetching crypto candles from Twelve Data"
        );

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, interval, self.timeout_ms))?;

        if !response.status().is_success() {
            return Err(FetchError::Http {
                status: response.status().as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))?;

        Self::parse_payload(&body)
    }
}
