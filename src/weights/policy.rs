//! Engine-wide weighting policy, persisted as the document's `metadata` block.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;

/// Advisors with fewer evaluated predictions than this are treated as neutral.
pub const DEFAULT_MIN_PREDICTIONS: u64 = 3;

/// Share of the dynamic pool actually handed out each cycle.
pub const DEFAULT_POOL_DAMPING: Decimal = dec!(0.5);

/// Days between creation and eligibility for evaluation.
pub const DEFAULT_EVALUATION_HORIZON_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightLimits {
    #[serde(with = "rust_decimal::serde::float")]
    pub min: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub max: Decimal,
}

impl WeightLimits {
    pub fn clamp(&self, weight: Decimal) -> Decimal {
        weight.max(self.min).min(self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnginePolicy {
    #[serde(with = "rust_decimal::serde::float")]
    pub base_weight_per_advisor: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub dynamic_pool: Decimal,
    pub weight_limits: WeightLimits,
    pub next_rebalance: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default = "default_min_predictions")]
    pub min_predictions_for_scoring: u64,
    #[serde(
        default = "default_pool_damping",
        with = "rust_decimal::serde::float"
    )]
    pub pool_damping: Decimal,
    #[serde(default = "default_horizon_days")]
    pub evaluation_horizon_days: i64,
}

fn default_min_predictions() -> u64 {
    DEFAULT_MIN_PREDICTIONS
}

fn default_pool_damping() -> Decimal {
    DEFAULT_POOL_DAMPING
}

fn default_horizon_days() -> i64 {
    DEFAULT_EVALUATION_HORIZON_DAYS
}

impl EnginePolicy {
    /// Build the initial policy from configuration, scheduling the first
    /// rebalance for the start of the month after `now`.
    pub fn from_config(config: &PolicyConfig, now: DateTime<Utc>) -> Self {
        Self {
            base_weight_per_advisor: config.base_weight_per_advisor,
            dynamic_pool: config.dynamic_pool,
            weight_limits: WeightLimits {
                min: config.min_weight,
                max: config.max_weight,
            },
            next_rebalance: first_of_next_month(now.date_naive()),
            last_updated: None,
            min_predictions_for_scoring: config.min_predictions_for_scoring,
            pool_damping: config.pool_damping,
            evaluation_horizon_days: config.evaluation_horizon_days,
        }
    }

    pub fn rebalance_due(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() >= self.next_rebalance
    }
}

/// First calendar day of the month following `date`.
pub fn first_of_next_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_of_next_month() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day).unwrap();
        assert_eq!(first_of_next_month(d(2026, 1, 31)), d(2026, 2, 1));
        assert_eq!(first_of_next_month(d(2026, 2, 1)), d(2026, 3, 1));
        assert_eq!(first_of_next_month(d(2026, 12, 15)), d(2027, 1, 1));
    }

    #[test]
    fn test_clamp() {
        let limits = WeightLimits {
            min: dec!(5),
            max: dec!(20),
        };
        assert_eq!(limits.clamp(dec!(1)), dec!(5));
        assert_eq!(limits.clamp(dec!(12.5)), dec!(12.5));
        assert_eq!(limits.clamp(dec!(40)), dec!(20));
    }

    #[test]
    fn test_metadata_defaults_for_older_documents() {
        let json = r#"{
            "base_weight_per_advisor": 10,
            "dynamic_pool": 8,
            "weight_limits": {"min": 5, "max": 20},
            "next_rebalance": "2026-11-01"
        }"#;
        let policy: EnginePolicy = serde_json::from_str(json).unwrap();
        assert_eq!(policy.min_predictions_for_scoring, DEFAULT_MIN_PREDICTIONS);
        assert_eq!(policy.pool_damping, DEFAULT_POOL_DAMPING);
        assert_eq!(policy.evaluation_horizon_days, 30);
        assert_eq!(policy.weight_limits.max, dec!(20));
    }
}
