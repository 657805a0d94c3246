//! Prediction ledger: creation and evaluation of advisor predictions.
//!
//! Operations here mutate a `Snapshot` in place and never touch storage; the
//! engine decides when a mutated snapshot is persisted.

pub mod models;
pub mod scanner;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::db::snapshot::Snapshot;
use crate::error::{ScoringError, ScoringResult};
use crate::ledger::models::{Evaluation, Prediction, PredictionRequest, PredictionStatus};

/// Upper bound on the free-form prediction text.
const MAX_TEXT_LEN: usize = 4000;

/// What happened when an evaluation was submitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvaluationOutcome {
    Evaluated(EvaluationSummary),
    /// The prediction was already terminal; nothing changed.
    AlreadyEvaluated {
        prediction_id: String,
        was_correct: Option<bool>,
        evaluation_date: Option<DateTime<Utc>>,
    },
    /// The prediction belongs to a human advisor, whose record is never scored.
    Skipped {
        prediction_id: String,
        advisor: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub prediction_id: String,
    pub advisor: String,
    pub was_correct: bool,
    pub accuracy_rate: Decimal,
    pub total_predictions: u64,
    pub pending_predictions: u64,
}

/// Reject requests that would put bad data into the ledger.
pub fn validate_request(request: &PredictionRequest) -> ScoringResult<()> {
    if request.confidence < Decimal::ZERO || request.confidence > Decimal::ONE {
        return Err(ScoringError::InvalidInput(format!(
            "confidence {} is outside [0, 1]",
            request.confidence
        )));
    }
    if request.asset.trim().is_empty() {
        return Err(ScoringError::InvalidInput("asset must not be empty".to_string()));
    }
    if request.text.trim().is_empty() {
        return Err(ScoringError::InvalidInput(
            "prediction text must not be empty".to_string(),
        ));
    }
    if request.text.len() > MAX_TEXT_LEN {
        return Err(ScoringError::InvalidInput(format!(
            "prediction text exceeds {MAX_TEXT_LEN} bytes"
        )));
    }
    if let Some(price) = request.price_at_prediction {
        if price < Decimal::ZERO {
            return Err(ScoringError::InvalidInput(format!(
                "price_at_prediction {price} is negative"
            )));
        }
    }
    Ok(())
}

/// Build a prediction id from the advisor name and creation time.
///
/// Ids are `<slug>_<YYYYmmdd_HHMMSS>`; a numeric suffix is appended if the same
/// advisor already has a prediction with that id.
pub fn prediction_id(snapshot: &Snapshot, advisor: &str, created: DateTime<Utc>) -> String {
    let slug: String = advisor
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let base = format!("{slug}_{}", created.format("%Y%m%d_%H%M%S"));

    if !snapshot.contains_prediction(&base) {
        return base;
    }
    (2u32..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !snapshot.contains_prediction(candidate))
        .unwrap_or(base)
}

/// Append a pending prediction for `request.advisor`. Returns the new id.
pub fn add_prediction(
    snapshot: &mut Snapshot,
    request: PredictionRequest,
    now: DateTime<Utc>,
) -> ScoringResult<String> {
    if snapshot.advisor(&request.advisor).is_none() {
        return Err(ScoringError::UnknownAdvisor(request.advisor));
    }
    validate_request(&request)?;

    let id = prediction_id(snapshot, &request.advisor, now);
    let horizon = Duration::days(snapshot.metadata.evaluation_horizon_days);

    let prediction = Prediction {
        id: id.clone(),
        advisor: request.advisor.clone(),
        prediction: request.text,
        prediction_type: request.prediction_type,
        asset: request.asset,
        direction: request.direction,
        confidence: request.confidence,
        date_created: now,
        date_evaluate: now + horizon,
        status: PredictionStatus::Pending,
        was_correct: None,
        outcome: None,
        evaluation_date: None,
        price_at_prediction: request.price_at_prediction,
        price_at_evaluation: None,
        metadata: request.metadata,
    };

    let advisor = snapshot
        .advisor_mut(&request.advisor)
        .ok_or_else(|| ScoringError::UnknownAdvisor(request.advisor.clone()))?;

    info!(
        advisor = %advisor.name,
        prediction_id = %id,
        prediction_type = %prediction.prediction_type,
        asset = %prediction.asset,
        confidence = %prediction.confidence,
        "Prediction added"
    );

    advisor.predictions.push(prediction);
    advisor.pending_predictions += 1;

    Ok(id)
}

/// Record the external judge's verdict on a prediction.
///
/// Terminal predictions are refused rather than overwritten, and predictions of
/// human advisors are skipped.
pub fn evaluate_prediction(
    snapshot: &mut Snapshot,
    prediction_id: &str,
    evaluation: Evaluation,
    now: DateTime<Utc>,
) -> ScoringResult<EvaluationOutcome> {
    let advisor = snapshot
        .advisors
        .iter_mut()
        .find(|a| a.predictions.iter().any(|p| p.id == prediction_id))
        .ok_or_else(|| ScoringError::NotFound(prediction_id.to_string()))?;

    if !advisor.is_ai() {
        info!(
            advisor = %advisor.name,
            prediction_id,
            "Skipping evaluation of human advisor prediction"
        );
        return Ok(EvaluationOutcome::Skipped {
            prediction_id: prediction_id.to_string(),
            advisor: advisor.name.clone(),
        });
    }

    let prediction = advisor
        .predictions
        .iter_mut()
        .find(|p| p.id == prediction_id)
        .ok_or_else(|| ScoringError::NotFound(prediction_id.to_string()))?;

    if prediction.is_evaluated() {
        warn!(prediction_id, "Prediction already evaluated");
        return Ok(EvaluationOutcome::AlreadyEvaluated {
            prediction_id: prediction_id.to_string(),
            was_correct: prediction.was_correct,
            evaluation_date: prediction.evaluation_date,
        });
    }

    prediction.status = PredictionStatus::Evaluated;
    prediction.was_correct = Some(evaluation.was_correct);
    prediction.outcome = Some(evaluation.notes.unwrap_or_default());
    prediction.evaluation_date = Some(now);
    if evaluation.price_at_evaluation.is_some() {
        prediction.price_at_evaluation = evaluation.price_at_evaluation;
    }

    advisor.recompute_stats();

    info!(
        advisor = %advisor.name,
        prediction_id,
        correct = evaluation.was_correct,
        accuracy_rate = %advisor.accuracy_rate.round_dp(4),
        total_predictions = advisor.total_predictions,
        "Prediction evaluated"
    );

    Ok(EvaluationOutcome::Evaluated(EvaluationSummary {
        prediction_id: prediction_id.to_string(),
        advisor: advisor.name.clone(),
        was_correct: evaluation.was_correct,
        accuracy_rate: advisor.accuracy_rate,
        total_predictions: advisor.total_predictions,
        pending_predictions: advisor.pending_predictions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisors::models::AdvisorRecord;
    use crate::ledger::models::{Direction, PredictionType};
    use crate::weights::policy::{EnginePolicy, WeightLimits};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    fn snapshot() -> Snapshot {
        let policy = EnginePolicy {
            base_weight_per_advisor: dec!(10),
            dynamic_pool: dec!(8),
            weight_limits: WeightLimits {
                min: dec!(5),
                max: dec!(20),
            },
            next_rebalance: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            last_updated: None,
            min_predictions_for_scoring: 3,
            pool_damping: dec!(0.5),
            evaluation_horizon_days: 30,
        };
        Snapshot::new(
            vec![
                AdvisorRecord::human("Operator", dec!(30)),
                AdvisorRecord::ai("Quant Bot", dec!(10)),
            ],
            policy,
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    fn request(advisor: &str, confidence: Decimal) -> PredictionRequest {
        PredictionRequest::new(
            advisor,
            "BTC up",
            PredictionType::PriceMovement,
            "BTC",
            Direction::Up,
            confidence,
        )
    }

    #[test]
    fn test_add_prediction_appends_pending() {
        let mut snap = snapshot();
        let id = add_prediction(&mut snap, request("Quant Bot", dec!(0.8)), now()).unwrap();

        assert_eq!(id, "quant_bot_20261001_120000");
        let advisor = snap.advisor("Quant Bot").unwrap();
        assert_eq!(advisor.pending_predictions, 1);
        assert_eq!(advisor.total_predictions, 0);
        let p = &advisor.predictions[0];
        assert_eq!(p.status, PredictionStatus::Pending);
        assert_eq!(p.date_evaluate, now() + Duration::days(30));
    }

    #[test]
    fn test_add_prediction_unknown_advisor() {
        let mut snap = snapshot();
        let err = add_prediction(&mut snap, request("Nobody", dec!(0.5)), now()).unwrap_err();
        assert!(matches!(err, ScoringError::UnknownAdvisor(name) if name == "Nobody"));
    }

    #[test]
    fn test_add_prediction_rejects_bad_confidence() {
        let mut snap = snapshot();
        for confidence in [dec!(-0.1), dec!(1.01)] {
            let err = add_prediction(&mut snap, request("Quant Bot", confidence), now()).unwrap_err();
            assert!(matches!(err, ScoringError::InvalidInput(_)));
        }
        assert!(snap.advisor("Quant Bot").unwrap().predictions.is_empty());

        // Bounds are inclusive.
        add_prediction(&mut snap, request("Quant Bot", Decimal::ZERO), now()).unwrap();
        add_prediction(&mut snap, request("Quant Bot", Decimal::ONE), now()).unwrap();
    }

    #[test]
    fn test_same_second_ids_are_unique() {
        let mut snap = snapshot();
        let a = add_prediction(&mut snap, request("Quant Bot", dec!(0.6)), now()).unwrap();
        let b = add_prediction(&mut snap, request("Quant Bot", dec!(0.6)), now()).unwrap();
        let c = add_prediction(&mut snap, request("Quant Bot", dec!(0.6)), now()).unwrap();
        assert_ne!(a, b);
        assert_eq!(b, format!("{a}_2"));
        assert_eq!(c, format!("{a}_3"));
    }

    #[test]
    fn test_evaluate_updates_stats() {
        let mut snap = snapshot();
        let first = add_prediction(&mut snap, request("Quant Bot", dec!(0.8)), now()).unwrap();
        let later = now() + Duration::seconds(1);
        let second = add_prediction(&mut snap, request("Quant Bot", dec!(0.4)), later).unwrap();

        let outcome =
            evaluate_prediction(&mut snap, &first, Evaluation::correct().with_notes("hit"), later)
                .unwrap();
        assert!(matches!(outcome, EvaluationOutcome::Evaluated(ref s) if s.was_correct));
        evaluate_prediction(&mut snap, &second, Evaluation::incorrect(), later).unwrap();

        let advisor = snap.advisor("Quant Bot").unwrap();
        assert_eq!(advisor.total_predictions, 2);
        assert_eq!(advisor.correct_predictions, 1);
        assert_eq!(advisor.incorrect_predictions, 1);
        assert_eq!(advisor.pending_predictions, 0);
        assert_eq!(advisor.accuracy_rate, dec!(0.5));
        assert_eq!(advisor.confidence_avg, dec!(0.6));
        assert_eq!(advisor.predictions[0].outcome.as_deref(), Some("hit"));
        assert_eq!(advisor.predictions[1].outcome.as_deref(), Some(""));
    }

    #[test]
    fn test_second_evaluation_is_refused() {
        let mut snap = snapshot();
        let id = add_prediction(&mut snap, request("Quant Bot", dec!(0.8)), now()).unwrap();
        evaluate_prediction(&mut snap, &id, Evaluation::correct(), now()).unwrap();
        let before = snap.advisor("Quant Bot").unwrap().clone();

        let outcome = evaluate_prediction(&mut snap, &id, Evaluation::incorrect(), now()).unwrap();
        assert!(matches!(
            outcome,
            EvaluationOutcome::AlreadyEvaluated { was_correct: Some(true), .. }
        ));
        assert_eq!(snap.advisor("Quant Bot").unwrap(), &before);
    }

    #[test]
    fn test_evaluate_unknown_id() {
        let mut snap = snapshot();
        let err =
            evaluate_prediction(&mut snap, "missing", Evaluation::correct(), now()).unwrap_err();
        assert!(matches!(err, ScoringError::NotFound(_)));
    }

    #[test]
    fn test_human_predictions_are_not_scored() {
        let mut snap = snapshot();
        let id = add_prediction(&mut snap, request("Operator", dec!(0.9)), now()).unwrap();
        let outcome = evaluate_prediction(&mut snap, &id, Evaluation::correct(), now()).unwrap();

        assert!(matches!(outcome, EvaluationOutcome::Skipped { .. }));
        let human = snap.advisor("Operator").unwrap();
        assert_eq!(human.total_predictions, 0);
        assert_eq!(human.pending_predictions, 1);
        assert!(human.predictions[0].is_pending());
    }
}
