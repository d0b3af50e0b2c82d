//! Configuration management for the snapshot service
//!
//! Loads from YAML files + environment variables via .env

use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;

use crate::pipeline::plan::{default_specs, PlanError, TimeframePlan, TimeframeSpec};
use crate::pipeline::FailurePolicy;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub providers: ProvidersConfig,
    pub routing: RoutingConfig,
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP shell
    pub host: String,
    /// Listen port
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    pub alpha_vantage: AlphaVantageConfig,
    pub twelve_data: TwelveDataConfig,
    /// HTTP client timeout in milliseconds
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlphaVantageConfig {
    /// Filled from ALPHA_VANTAGE_KEY when present
    pub api_key: Option<String>,
    pub base_url: String,
    /// "compact" (latest 100 points) or "full"
    pub output_size: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TwelveDataConfig {
    /// Filled from TWELVE_DATA_KEY when present
    pub api_key: Option<String>,
    pub base_url: String,
    /// Number of candles requested per call
    pub output_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutingConfig {
    /// Base codes served by the crypto provider
    pub crypto_bases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    /// What a single failed fetch does to the request
    pub failure_policy: FailurePolicy,
    /// Upper bound for each source call in milliseconds
    pub fetch_timeout_ms: u64,
    /// Maximum source calls in flight per request
    pub max_concurrent_fetches: usize,
    /// Ordered timeframe slots
    #[serde(default = "default_specs")]
    pub timeframes: Vec<TimeframeSpec>,
}

impl SnapshotConfig {
    /// Validate the configured timeframes into a plan
    pub fn plan(&self) -> Result<TimeframePlan, PlanError> {
        TimeframePlan::new(self.timeframes.clone())
    }
}

impl AppConfig {
    /// Built-in defaults, before files and environment are layered on
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>> {
        let builder = Config::builder()
            // Server defaults
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3001)?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Provider defaults
            .set_default(
                "providers.alpha_vantage.base_url",
                "https://www.alphavantage.co/query",
            )?
            .set_default("providers.alpha_vantage.output_size", "compact")?
            .set_default("providers.twelve_data.base_url", "https://api.twelvedata.com")?
            .set_default("providers.twelve_data.output_size", 200)?
            .set_default("providers.request_timeout_ms", 15000)?
            // Routing defaults
            .set_default(
                "routing.crypto_bases",
                vec!["BTC", "ETH", "SOL", "DOG", "BNB", "XRP", "ADA", "LTC"],
            )?
            // Snapshot defaults
            .set_default("snapshot.failure_policy", "isolate")?
            .set_default("snapshot.fetch_timeout_ms", 20000)?
            .set_default("snapshot.max_concurrent_fetches", 4)?;
        Ok(builder)
    }

    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::defaults()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (MTF__*)
            .add_source(Environment::with_prefix("MTF").separator("__"))
            // Provider keys keep their conventional variable names
            .set_override_option(
                "providers.alpha_vantage.api_key",
                non_empty_env("ALPHA_VANTAGE_KEY"),
            )?
            .set_override_option(
                "providers.twelve_data.api_key",
                non_empty_env("TWELVE_DATA_KEY"),
            )?
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config
            .snapshot
            .plan()
            .context("Invalid snapshot.timeframes")?;

        Ok(app_config)
    }

    /// Generate a digest of the config (without secrets) for logging
    pub fn digest(&self) -> String {
        let labels: Vec<&str> = self
            .snapshot
            .timeframes
            .iter()
            .map(|t| t.label.as_str())
            .collect();
        format!(
            "port={} timeframes={:?} policy={:?} fetch_timeout_ms={} concurrency={} av_key={} td_key={}",
            self.server.port,
            labels,
            self.snapshot.failure_policy,
            self.snapshot.fetch_timeout_ms,
            self.snapshot.max_concurrent_fetches,
            self.providers.alpha_vantage.api_key.is_some(),
            self.providers.twelve_data.api_key.is_some(),
        )
    }

    /// Providers that have no API key configured
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.providers.alpha_vantage.api_key.is_none() {
            missing.push("ALPHA_VANTAGE_KEY");
        }
        if self.providers.twelve_data.api_key.is_none() {
            missing.push("TWELVE_DATA_KEY");
        }
        missing
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

fn non_empty_env(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interval;

    fn from_defaults() -> AppConfig {
        AppConfig::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_deserialize() {
        let cfg = from_defaults();
        assert_eq!(cfg.server.port, 3001);
        assert_eq!(cfg.snapshot.failure_policy, FailurePolicy::Isolate);
        assert_eq!(cfg.snapshot.max_concurrent_fetches, 4);
        assert!(cfg.providers.alpha_vantage.api_key.is_none());
        assert_eq!(cfg.missing_keys(), vec!["ALPHA_VANTAGE_KEY", "TWELVE_DATA_KEY"]);

        let plan = cfg.snapshot.plan().unwrap();
        assert_eq!(plan.len(), 5);
        assert_eq!(
            plan.fetch_intervals(),
            vec![Interval::Day1, Interval::Hour1, Interval::Min15, Interval::Min5]
        );
    }

    #[test]
    fn test_yaml_overrides() {
        let yaml = r#"
snapshot:
  failure_policy: abort
  timeframes:
    - label: 1H
      source:
        fetch: 1h
      limit: 24
    - label: 4H
      source:
        derive:
          from: 1H
          factor: 4
      limit: 6
"#;
        let cfg: AppConfig = AppConfig::defaults()
            .unwrap()
            .add_source(File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(cfg.snapshot.failure_policy, FailurePolicy::Abort);
        assert_eq!(cfg.snapshot.timeframes.len(), 2);
        assert_eq!(cfg.snapshot.timeframes[1], TimeframeSpec::derive("4H", "1H", 4, 6));
        assert!(cfg.digest().contains("\"4H\""));
    }
}
