//! Timeframe plan - which series make up a snapshot and how each is obtained
//!
//! Every timeframe is either fetched directly from the data source or
//! derived from another timeframe of the same plan by aggregation. The plan
//! is validated once and stores a dependency order so the assembler can
//! resolve derived tiers after their sources, including multi-hop chains.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::types::Interval;

/// How a timeframe's series is produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeframeSource {
    /// Request the interval from the data source
    Fetch(Interval),
    /// Aggregate `factor` candles of another timeframe into one
    Derive { from: String, factor: usize },
}

/// One slot of the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeSpec {
    /// Snapshot key (e.g., "4H")
    pub label: String,
    pub source: TimeframeSource,
    /// Maximum candles kept after trimming
    pub limit: usize,
}

impl TimeframeSpec {
    pub fn fetch(label: impl Into<String>, interval: Interval, limit: usize) -> Self {
        Self {
            label: label.into(),
            source: TimeframeSource::Fetch(interval),
            limit,
        }
    }

    pub fn derive(
        label: impl Into<String>,
        from: impl Into<String>,
        factor: usize,
        limit: usize,
    ) -> Self {
        Self {
            label: label.into(),
            source: TimeframeSource::Derive {
                from: from.into(),
                factor,
            },
            limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("timeframe plan is empty")]
    Empty,

    #[error("duplicate timeframe label '{0}'")]
    DuplicateLabel(String),

    #[error("timeframe '{label}' derives from unknown timeframe '{from}'")]
    UnknownSource { label: String, from: String },

    #[error("timeframe '{0}' has an aggregation factor of zero")]
    ZeroFactor(String),

    #[error("timeframe '{0}' has a candle limit of zero")]
    ZeroLimit(String),

    #[error("timeframe '{0}' is part of a derivation cycle")]
    Cycle(String),
}

/// Validated, ordered set of timeframe specs
#[derive(Debug, Clone)]
pub struct TimeframePlan {
    specs: Vec<TimeframeSpec>,
    /// Indices into `specs`, every source before its dependents
    resolve_order: Vec<usize>,
}

impl TimeframePlan {
    pub fn new(specs: Vec<TimeframeSpec>) -> Result<Self, PlanError> {
        if specs.is_empty() {
            return Err(PlanError::Empty);
        }

        let parents = Self::link(&specs)?;
        let resolve_order = Self::dependency_order(&specs, &parents)?;

        Ok(Self {
            specs,
            resolve_order,
        })
    }

    /// Check each spec and find the index of the timeframe it derives from
    fn link(specs: &[TimeframeSpec]) -> Result<Vec<Option<usize>>, PlanError> {
        let mut index: HashMap<&str, usize> = HashMap::new();
        for (i, spec) in specs.iter().enumerate() {
            if index.insert(spec.label.as_str(), i).is_some() {
                return Err(PlanError::DuplicateLabel(spec.label.clone()));
            }
        }

        let mut parents: Vec<Option<usize>> = Vec::with_capacity(specs.len());
        for spec in specs {
            // An empty slot would read as a successful, empty series
            if spec.limit == 0 {
                return Err(PlanError::ZeroLimit(spec.label.clone()));
            }
            match &spec.source {
                TimeframeSource::Fetch(_) => parents.push(None),
                TimeframeSource::Derive { from, factor } => {
                    if *factor == 0 {
                        return Err(PlanError::ZeroFactor(spec.label.clone()));
                    }
                    let parent = index.get(from.as_str()).copied().ok_or_else(|| {
                        PlanError::UnknownSource {
                            label: spec.label.clone(),
                            from: from.clone(),
                        }
                    })?;
                    parents.push(Some(parent));
                }
            }
        }

        Ok(parents)
    }

    /// Each node has at most one parent, so walking up to a resolved
    /// ancestor and unwinding gives a valid order.
    fn dependency_order(
        specs: &[TimeframeSpec],
        parents: &[Option<usize>],
    ) -> Result<Vec<usize>, PlanError> {
        let mut order = Vec::with_capacity(specs.len());
        let mut placed = vec![false; specs.len()];

        for start in 0..specs.len() {
            let mut chain = Vec::new();
            let mut on_chain = HashSet::new();
            let mut cursor = Some(start);

            while let Some(i) = cursor {
                if placed[i] {
                    break;
                }
                if !on_chain.insert(i) {
                    return Err(PlanError::Cycle(specs[i].label.clone()));
                }
                chain.push(i);
                cursor = parents[i];
            }

            for i in chain.into_iter().rev() {
                placed[i] = true;
                order.push(i);
            }
        }

        Ok(order)
    }

    /// Specs in snapshot order
    pub fn specs(&self) -> &[TimeframeSpec] {
        &self.specs
    }

    /// Specs in an order where every derived timeframe follows its source
    pub fn in_dependency_order(&self) -> impl Iterator<Item = &TimeframeSpec> {
        self.resolve_order.iter().map(move |&i| &self.specs[i])
    }

    /// Distinct intervals requested from the data source, in first-seen order
    pub fn fetch_intervals(&self) -> Vec<Interval> {
        let mut seen = Vec::new();
        for spec in &self.specs {
            if let TimeframeSource::Fetch(interval) = spec.source {
                if !seen.contains(&interval) {
                    seen.push(interval);
                }
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl Default for TimeframePlan {
    /// Daily, 4-hour (from hourly), hourly, 15-minute and 5-minute tiers
    fn default() -> Self {
        let specs = default_specs();
        // The built-in specs always validate; see test_default_plan_matches_validated_plan
        let resolve_order = Self::link(&specs)
            .and_then(|parents| Self::dependency_order(&specs, &parents))
            .unwrap_or_else(|_| (0..specs.len()).collect());
        Self {
            specs,
            resolve_order,
        }
    }
}

pub fn default_specs() -> Vec<TimeframeSpec> {
    vec![
        TimeframeSpec::fetch("1D", Interval::Day1, 30),
        TimeframeSpec::derive("4H", "1H", 4, 30),
        TimeframeSpec::fetch("1H", Interval::Hour1, 48),
        TimeframeSpec::fetch("15M", Interval::Min15, 48),
        TimeframeSpec::fetch("5M", Interval::Min5, 60),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels<'a>(it: impl Iterator<Item = &'a TimeframeSpec>) -> Vec<&'a str> {
        it.map(|s| s.label.as_str()).collect()
    }

    #[test]
    fn test_default_plan_matches_validated_plan() {
        let validated = TimeframePlan::new(default_specs()).unwrap();
        let default = TimeframePlan::default();

        assert_eq!(validated.specs(), default.specs());
        assert_eq!(
            labels(validated.in_dependency_order()),
            labels(default.in_dependency_order())
        );
        assert_eq!(
            labels(default.in_dependency_order()),
            vec!["1D", "1H", "4H", "15M", "5M"]
        );
    }

    #[test]
    fn test_fetch_intervals_deduplicated() {
        let plan = TimeframePlan::new(vec![
            TimeframeSpec::fetch("1H", Interval::Hour1, 10),
            TimeframeSpec::fetch("1H-long", Interval::Hour1, 100),
            TimeframeSpec::fetch("15M", Interval::Min15, 10),
        ])
        .unwrap();
        assert_eq!(plan.fetch_intervals(), vec![Interval::Hour1, Interval::Min15]);
    }

    #[test]
    fn test_multi_hop_order() {
        let plan = TimeframePlan::new(vec![
            TimeframeSpec::derive("1D", "4H", 6, 10),
            TimeframeSpec::derive("4H", "1H", 4, 10),
            TimeframeSpec::fetch("1H", Interval::Hour1, 10),
        ])
        .unwrap();
        assert_eq!(labels(plan.in_dependency_order()), vec!["1H", "4H", "1D"]);
        assert_eq!(labels(plan.specs().iter()), vec!["1D", "4H", "1H"]);
    }

    #[test]
    fn test_rejects_invalid_plans() {
        assert_eq!(TimeframePlan::new(vec![]).unwrap_err(), PlanError::Empty);

        let dup = TimeframePlan::new(vec![
            TimeframeSpec::fetch("1H", Interval::Hour1, 10),
            TimeframeSpec::fetch("1H", Interval::Hour1, 10),
        ]);
        assert_eq!(dup.unwrap_err(), PlanError::DuplicateLabel("1H".into()));

        let unknown = TimeframePlan::new(vec![TimeframeSpec::derive("4H", "1H", 4, 10)]);
        assert!(matches!(unknown, Err(PlanError::UnknownSource { .. })));

        let zero = TimeframePlan::new(vec![
            TimeframeSpec::fetch("1H", Interval::Hour1, 10),
            TimeframeSpec::derive("4H", "1H", 0, 10),
        ]);
        assert_eq!(zero.unwrap_err(), PlanError::ZeroFactor("4H".into()));

        let cycle = TimeframePlan::new(vec![
            TimeframeSpec::derive("A", "B", 2, 10),
            TimeframeSpec::derive("B", "A", 2, 10),
        ]);
        assert!(matches!(cycle, Err(PlanError::Cycle(_))));

        let zero_limit = TimeframePlan::new(vec![
            TimeframeSpec::fetch("1H", Interval::Hour1, 10),
            TimeframeSpec::fetch("5M", Interval::Min5, 0),
        ]);
        assert_eq!(zero_limit.unwrap_err(), PlanError::ZeroLimit("5M".into()));

        let self_loop = TimeframePlan::new(vec![TimeframeSpec::derive("A", "A", 2, 10)]);
        assert!(matches!(self_loop, Err(PlanError::Cycle(_))));
    }

    #[test]
    fn test_deserialize_from_json() {
        let specs: Vec<TimeframeSpec> = serde_json::from_value(serde_json::json!([
            { "label": "1H", "source": { "fetch": "1h" }, "limit": 48 },
            { "label": "4H", "source": { "derive": { "from": "1H", "factor": 4 } }, "limit": 30 }
        ]))
        .unwrap();
        assert_eq!(specs[0], TimeframeSpec::fetch("1H", Interval::Hour1, 48));
        assert_eq!(specs[1], TimeframeSpec::derive("4H", "1H", 4, 30));
    }
}
