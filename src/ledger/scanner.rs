//! Finds predictions whose evaluation horizon has elapsed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::snapshot::Snapshot;
use crate::ledger::models::{Direction, PredictionType};

/// A pending prediction that is ready for judgment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingEvaluation {
    pub prediction_id: String,
    pub advisor: String,
    pub prediction: String,
    pub prediction_type: PredictionType,
    pub asset: String,
    pub direction: Direction,
    pub confidence: Decimal,
    pub date_created: DateTime<Utc>,
    pub date_evaluate: DateTime<Utc>,
    /// Whole days elapsed since `date_evaluate`.
    pub days_overdue: i64,
}

/// Every pending ai prediction with `date_evaluate <= now`, in registry order,
/// oldest first within an advisor.
pub fn pending_evaluations(snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<PendingEvaluation> {
    snapshot
        .advisors
        .iter()
        .filter(|a| a.is_ai())
        .flat_map(|advisor| advisor.predictions.iter())
        .filter(|p| p.is_pending() && p.date_evaluate <= now)
        .map(|p| PendingEvaluation {
            prediction_id: p.id.clone(),
            advisor: p.advisor.clone(),
            prediction: p.prediction.clone(),
            prediction_type: p.prediction_type,
            asset: p.asset.clone(),
            direction: p.direction,
            confidence: p.confidence,
            date_created: p.date_created,
            date_evaluate: p.date_evaluate,
            days_overdue: (now - p.date_evaluate).num_days(),
        })
        .collect()
}
