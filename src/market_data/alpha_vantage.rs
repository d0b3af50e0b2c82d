//! Alpha Vantage REST client for forex OHLC series
//!
//! Intraday intervals use FX_INTRADAY, the daily tier uses FX_DAILY.
//! FX series carry no volume, so every candle gets zero.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use super::{candle_from_fields, CandleSource, FetchError};
use crate::config::AlphaVantageConfig;
use crate::types::{Candle, Instrument, Interval};

const PROVIDER: &str = "Alpha Vantage";

#[derive(Debug, Clone)]
pub struct AlphaVantageClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    output_size: String,
    timeout_ms: u64,
}

impl AlphaVantageClient {
    pub fn new(config: &AlphaVantageConfig, timeout_ms: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            output_size: config.output_size.clone(),
            timeout_ms,
        }
    }

    /// Query parameters for an interval, `None` when the API has no such series
    fn query_for(
        &self,
        instrument: &Instrument,
        interval: Interval,
        api_key: &str,
    ) -> Option<Vec<(&'static str, String)>> {
        let mut params = vec![
            ("from_symbol", instrument.base.clone()),
            ("to_symbol", instrument.quote.clone()),
            ("outputsize", self.output_size.clone()),
            ("apikey", api_key.to_string()),
        ];
        match interval {
            Interval::Min5 | Interval::Min15 | Interval::Hour1 => {
                params.push(("function", "FX_INTRADAY".to_string()));
                params.push(("interval", Self::interval_param(interval)?.to_string()));
            }
            Interval::Day1 => params.push(("function", "FX_DAILY".to_string())),
            Interval::Hour4 => return None,
        }
        Some(params)
    }

    fn interval_param(interval: Interval) -> Option<&'static str> {
        match interval {
            Interval::Min5 => Some("5min"),
            Interval::Min15 => Some("15min"),
            Interval::Hour1 => Some("60min"),
            Interval::Hour4 | Interval::Day1 => None,
        }
    }

    /// Parse a time series response body.
    ///
    /// The series lives under a "Time Series FX (...)" key as an object keyed
    /// by timestamp; candles come back in map order, not time order.
    pub fn parse_payload(body: &Value) -> Result<Vec<Candle>, FetchError> {
        for key in ["Error Message", "Note", "Information"] {
            if let Some(msg) = body.get(key).and_then(Value::as_str) {
                return Err(FetchError::Provider(msg.to_string()));
            }
        }

        let series = body
            .as_object()
            .and_then(|obj| {
                obj.iter()
                    .find(|(k, _)| k.starts_with("Time Series"))
                    .map(|(_, v)| v)
            })
            .and_then(Value::as_object)
            .ok_or_else(|| FetchError::MalformedPayload("no time series in response".into()))?;

        series
            .iter()
            .map(|(ts, fields)| {
                candle_from_fields(
                    ts,
                    fields.get("1. open"),
                    fields.get("2. high"),
                    fields.get("3. low"),
                    fields.get("4. close"),
                    fields.get("5. volume"),
                )
            })
            .collect()
    }
}

#[async_trait]
impl CandleSource for AlphaVantageClient {
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
        let params = self
            .query_for(instrument, interval, api_key)
            .ok_or(FetchError::UnsupportedInterval {
                provider: PROVIDER,
                interval,
            })?;

        tracing::debug!(
            instrument = %instrument,
            interval = %interval,
            "📥 Fetching forex candles from Alpha Vantage"
        );

        let response = self
            .client
            .get(&self.base_url)
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
