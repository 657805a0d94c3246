//! One rebalance cycle: allocate, apply, audit, reschedule.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::advisors::models::{AdvisorKind, WeightHistoryEntry};
use crate::db::snapshot::Snapshot;
use crate::weights::allocator::calculate_new_weights;
use crate::weights::policy::first_of_next_month;

pub const SCHEDULED_REASON: &str = "Scheduled monthly rebalance";

/// Per-advisor line of a rebalance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightChange {
    pub advisor: String,
    #[serde(rename = "type")]
    pub kind: AdvisorKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub old_weight: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_weight: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub change: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub accuracy: Decimal,
    pub total_predictions: u64,
}

/// Audit record of one rebalance, appended to `monthly_reports`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceReport {
    pub date: DateTime<Utc>,
    pub reason: String,
    pub changes: Vec<WeightChange>,
    /// Evaluated predictions across all ai advisors at the time of the cycle.
    pub total_predictions_evaluated: u64,
    pub next_rebalance: NaiveDate,
}

impl RebalanceReport {
    pub fn change_for(&self, advisor: &str) -> Option<&WeightChange> {
        self.changes.iter().find(|c| c.advisor == advisor)
    }

    /// Number of ai advisors whose weight moved this cycle.
    pub fn advisors_changed(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| c.kind == AdvisorKind::Ai && !c.change.is_zero())
            .count()
    }
}

impl fmt::Display for RebalanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== Rebalance {} ===\nReason: {}\nEvaluated predictions: {}",
            self.date.format("%Y-%m-%d %H:%M UTC"),
            self.reason,
            self.total_predictions_evaluated
        )?;
        for c in &self.changes {
            writeln!(
                f,
                "  {:<24} {:>5}  {:>6}% -> {:>6}% ({:+}) acc {:.1}% n={}",
                c.advisor,
                c.kind.to_string(),
                c.old_weight,
                c.new_weight,
                c.change,
                c.accuracy * Decimal::ONE_HUNDRED,
                c.total_predictions
            )?;
        }
        write!(f, "Next rebalance: {}", self.next_rebalance)
    }
}

/// Run one rebalance cycle against `snapshot`.
///
/// Ai advisors whose weight moves get a weight-history entry. Humans are
/// reported but never written. The report is always appended, even when no
/// weight moved, and the schedule advances to the first of next month.
pub fn rebalance(snapshot: &mut Snapshot, reason: &str, now: DateTime<Utc>) -> RebalanceReport {
    let new_weights = calculate_new_weights(&snapshot.metadata, &snapshot.advisors);

    let mut changes = Vec::with_capacity(snapshot.advisors.len());
    let mut total_evaluated = 0u64;

    for (advisor, allocated) in snapshot.advisors.iter_mut().zip(new_weights.iter()) {
        let old_weight = advisor.weight();
        let new_weight = allocated.weight;

        if advisor.is_ai() {
            total_evaluated += advisor.total_predictions;

            if new_weight != old_weight || advisor.current_weight.is_none() {
                advisor.current_weight = Some(new_weight);
                advisor.weight_history.push(WeightHistoryEntry {
                    date: now,
                    weight: new_weight,
                    reason: reason.to_string(),
                    accuracy: advisor.accuracy_rate,
                    predictions_evaluated: advisor.total_predictions,
                });
                info!(
                    advisor = %advisor.name,
                    old_weight = %old_weight,
                    new_weight = %new_weight,
                    accuracy = %advisor.accuracy_rate.round_dp(4),
                    "Advisor weight changed"
                );
            }
        }

        changes.push(WeightChange {
            advisor: advisor.name.clone(),
            kind: advisor.kind,
            old_weight,
            new_weight,
            change: new_weight - old_weight,
            accuracy: advisor.accuracy_rate,
            total_predictions: advisor.total_predictions,
        });
    }

    let next_rebalance = first_of_next_month(now.date_naive());
    snapshot.metadata.next_rebalance = next_rebalance;

    let report = RebalanceReport {
        date: now,
        reason: reason.to_string(),
        changes,
        total_predictions_evaluated: total_evaluated,
        next_rebalance,
    };
    snapshot.monthly_reports.push(report.clone());

    info!(
        reason,
        advisors_changed = report.advisors_changed(),
        total_predictions_evaluated = total_evaluated,
        next_rebalance = %next_rebalance,
        "Rebalance complete"
    );

    report
}
