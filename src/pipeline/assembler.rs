//! Snapshot assembler - turns per-interval fetches into one snapshot
//!
//! Directly fetched intervals are requested concurrently (bounded, each
//! under a timeout). Derived timeframes are then resolved in dependency
//! order from the normalized series of their source, and every slot is
//! trimmed to its own limit.

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::plan::{PlanError, TimeframePlan, TimeframeSource};
use super::snapshot::{SlotStatus, Snapshot, TimeframeSlot, Timeframes};
use super::{aggregate, normalize, trim_recent_owned};
use crate::config::SnapshotConfig;
use crate::market_data::{CandleSource, FetchError};
use crate::types::{Candle, Instrument, InstrumentError, Interval};

/// What one failed fetch does to the whole request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Mark the slot as failed and keep the other timeframes
    #[default]
    Isolate,
    /// Fail the request on the first failed fetch in plan order
    Abort,
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    InvalidInstrument(#[from] InstrumentError),

    #[error("fetch for timeframe '{label}' failed: {source}")]
    SourceFetchFailed {
        label: String,
        #[source]
        source: FetchError,
    },

    #[error("invalid timeframe plan: {0}")]
    Plan(#[from] PlanError),
}

#[derive(Debug, Clone)]
pub struct AssemblerOptions {
    pub failure_policy: FailurePolicy,
    pub fetch_timeout: Duration,
    pub max_concurrent_fetches: usize,
}

impl Default for AssemblerOptions {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Isolate,
            fetch_timeout: Duration::from_secs(20),
            max_concurrent_fetches: 4,
        }
    }
}

impl From<&SnapshotConfig> for AssemblerOptions {
    fn from(cfg: &SnapshotConfig) -> Self {
        Self {
            failure_policy: cfg.failure_policy,
            fetch_timeout: Duration::from_millis(cfg.fetch_timeout_ms),
            max_concurrent_fetches: cfg.max_concurrent_fetches,
        }
    }
}

/// Whole milliseconds, saturating for durations beyond `u64`
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// A resolved timeframe before trimming; errors are already rendered
type Resolved = Result<Vec<Candle>, String>;

pub struct SnapshotAssembler<S> {
    source: S,
    plan: TimeframePlan,
    options: AssemblerOptions,
}

impl<S: CandleSource> SnapshotAssembler<S> {
    pub fn new(source: S, plan: TimeframePlan, options: AssemblerOptions) -> Self {
        Self {
            source,
            plan,
            options,
        }
    }

    pub fn from_config(source: S, cfg: &SnapshotConfig) -> Result<Self, SnapshotError> {
        Ok(Self::new(source, cfg.plan()?, AssemblerOptions::from(cfg)))
    }

    pub fn plan(&self) -> &TimeframePlan {
        &self.plan
    }

    pub fn options(&self) -> &AssemblerOptions {
        &self.options
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Build a snapshot for a pair identifier such as "EURUSD".
    ///
    /// The identifier is validated before any fetch is issued.
    pub async fn assemble(&self, pair: &str) -> Result<Snapshot, SnapshotError> {
        let instrument = Instrument::parse(pair)?;
        let request_id = Uuid::new_v4();
        let asset_class = self.source.asset_class(&instrument);

        info!(
            request_id = %request_id,
            instrument = %instrument,
            asset_class = %asset_class,
            timeframes = self.plan.len(),
            "📊 Assembling snapshot"
        );

        let fetched = self.fetch_all(&instrument).await;

        if self.options.failure_policy == FailurePolicy::Abort {
            self.first_failure(&fetched)?;
        }

        let mut resolved = self.resolve(&fetched);

        let slots: Vec<TimeframeSlot> = self
            .plan
            .specs()
            .iter()
            .map(|spec| {
                // Labels are unique, so each resolved series is taken exactly once
                let status = match resolved.remove(spec.label.as_str()) {
                    Some(Ok(series)) if series.is_empty() => SlotStatus::InsufficientHistory,
                    Some(Ok(series)) => SlotStatus::Ready(trim_recent_owned(series, spec.limit)),
                    Some(Err(msg)) => SlotStatus::Failed(msg),
                    None => SlotStatus::Failed("timeframe was not resolved".to_string()),
                };
                TimeframeSlot {
                    label: spec.label.clone(),
                    status,
                }
            })
            .collect();

        let snapshot = Snapshot {
            request_id,
            instrument,
            asset_class,
            generated_at: Utc::now(),
            timeframes: Timeframes(slots),
        };

        let failed = snapshot.failures();
        if failed.is_empty() {
            info!(request_id = %request_id, "✅ Snapshot complete");
        } else {
            warn!(
                request_id = %request_id,
                failed = ?failed,
                "Snapshot assembled with failed timeframes"
            );
        }

        Ok(snapshot)
    }

    /// Fetch every distinct interval once, normalized on arrival
    async fn fetch_all(
        &self,
        instrument: &Instrument,
    ) -> HashMap<Interval, Result<Vec<Candle>, FetchError>> {
        let timeout = self.options.fetch_timeout;
        let limit = self.options.max_concurrent_fetches.max(1);

        stream::iter(self.plan.fetch_intervals())
            .map(|interval| async move {
                let outcome =
                    match tokio::time::timeout(timeout, self.source.fetch(instrument, interval))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(FetchError::Timeout {
                            interval,
                            after_ms: millis(timeout),
                        }),
                    };

                match &outcome {
                    Ok(raw) => debug!(
                        instrument = %instrument,
                        interval = %interval,
                        count = raw.len(),
                        "Fetched series"
                    ),
                    Err(e) => warn!(
                        instrument = %instrument,
                        interval = %interval,
                        error = %e,
                        "Fetch failed"
                    ),
                }

                (interval, outcome.map(|raw| normalize(&raw)))
            })
            .buffer_unordered(limit)
            .collect()
            .await
    }

    fn first_failure(
        &self,
        fetched: &HashMap<Interval, Result<Vec<Candle>, FetchError>>,
    ) -> Result<(), SnapshotError> {
        for spec in self.plan.specs() {
            if let TimeframeSource::Fetch(interval) = spec.source {
                if let Some(Err(e)) = fetched.get(&interval) {
                    return Err(SnapshotError::SourceFetchFailed {
                        label: spec.label.clone(),
                        source: e.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolve every timeframe, sources before dependents
    fn resolve<'a>(
        &'a self,
        fetched: &HashMap<Interval, Result<Vec<Candle>, FetchError>>,
    ) -> HashMap<&'a str, Resolved> {
        let mut resolved: HashMap<&str, Resolved> = HashMap::with_capacity(self.plan.len());

        for spec in self.plan.in_dependency_order() {
            let series = match &spec.source {
                TimeframeSource::Fetch(interval) => match fetched.get(interval) {
                    Some(Ok(series)) => Ok(series.clone()),
                    Some(Err(e)) => Err(e.to_string()),
                    None => Err(format!("{} was not fetched", interval)),
                },
                TimeframeSource::Derive { from, factor } => match resolved.get(from.as_str()) {
                    Some(Ok(source)) => {
                        let derived = aggregate(source, *factor);
                        debug!(
                            label = %spec.label,
                            from = %from,
                            source_count = source.len(),
                            count = derived.len(),
                            "Derived timeframe"
                        );
                        Ok(derived)
                    }
                    _ => Err(format!("source timeframe '{}' unavailable", from)),
                },
            };
            resolved.insert(spec.label.as_str(), series);
        }

        resolved
    }
}
