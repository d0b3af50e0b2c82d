//! MTF Snapshot Library
//!
//! Multi-timeframe OHLCV snapshots for forex and crypto pairs

pub mod config;
pub mod market_data;
pub mod pipeline;
pub mod prompt;
pub mod types;

#[cfg(feature = "server")]
pub mod server;
