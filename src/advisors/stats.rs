//! Per-advisor statistics view.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::advisors::models::{AdvisorKind, AdvisorRecord, WeightHistoryEntry};
use crate::ledger::models::PredictionType;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeBreakdown {
    pub prediction_type: PredictionType,
    pub total: u64,
    pub evaluated: u64,
    pub correct: u64,
    pub accuracy: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdvisorStats {
    pub advisor: String,
    pub kind: AdvisorKind,
    pub weight: Decimal,
    pub total_predictions: u64,
    pub correct_predictions: u64,
    pub incorrect_predictions: u64,
    pub pending_predictions: u64,
    pub accuracy_rate: Decimal,
    pub confidence_avg: Decimal,
    /// Only types the advisor has predicted at least once.
    pub by_type: Vec<TypeBreakdown>,
    pub recent_history: Vec<WeightHistoryEntry>,
}

impl AdvisorStats {
    pub fn from_record(record: &AdvisorRecord, history_limit: usize) -> Self {
        let by_type = PredictionType::ALL
            .into_iter()
            .filter_map(|t| {
                let of_type: Vec<_> = record
                    .predictions
                    .iter()
                    .filter(|p| p.prediction_type == t)
                    .collect();
                if of_type.is_empty() {
                    return None;
                }
                let evaluated = of_type.iter().filter(|p| p.is_evaluated()).count() as u64;
                let correct = of_type
                    .iter()
                    .filter(|p| p.is_evaluated() && p.was_correct == Some(true))
                    .count() as u64;
                let accuracy = if evaluated > 0 {
                    Decimal::from(correct) / Decimal::from(evaluated)
                } else {
                    Decimal::ZERO
                };
                Some(TypeBreakdown {
                    prediction_type: t,
                    total: of_type.len() as u64,
                    evaluated,
                    correct,
                    accuracy,
                })
            })
            .collect();

        let skip = record.weight_history.len().saturating_sub(history_limit);
        let recent_history = record.weight_history.iter().skip(skip).cloned().collect();

        Self {
            advisor: record.name.clone(),
            kind: record.kind,
            weight: record.weight(),
            total_predictions: record.total_predictions,
            correct_predictions: record.correct_predictions,
            incorrect_predictions: record.incorrect_predictions,
            pending_predictions: record.pending_predictions,
            accuracy_rate: record.accuracy_rate,
            confidence_avg: record.confidence_avg,
            by_type,
            recent_history,
        }
    }
}

impl fmt::Display for AdvisorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} ({}) ===", self.advisor, self.kind)?;
        writeln!(f, "Weight: {}%", self.weight.round_dp(2))?;
        writeln!(
            f,
            "Predictions: {} evaluated ({}W/{}L), {} pending",
            self.total_predictions,
            self.correct_predictions,
            self.incorrect_predictions,
            self.pending_predictions
        )?;
        write!(
            f,
            "Accuracy: {:.1}% | Avg confidence: {:.2}",
            self.accuracy_rate * Decimal::ONE_HUNDRED,
            self.confidence_avg
        )?;
        for t in &self.by_type {
            write!(
                f,
                "\n  {:<18} {}/{} correct of {} ({:.1}%)",
                t.prediction_type.as_str(),
                t.correct,
                t.evaluated,
                t.total,
                t.accuracy * Decimal::ONE_HUNDRED
            )?;
        }
        for h in &self.recent_history {
            write!(
                f,
                "\n  {} -> {}% ({}, acc {:.1}%, n={})",
                h.date.format("%Y-%m-%d"),
                h.weight,
                h.reason,
                h.accuracy * Decimal::ONE_HUNDRED,
                h.predictions_evaluated
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::models::{Direction, Prediction, PredictionStatus};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn prediction(id: &str, t: PredictionType, correct: Option<bool>) -> Prediction {
        let created = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        Prediction {
            id: id.to_string(),
            advisor: "Quant".to_string(),
            prediction: "text".to_string(),
            prediction_type: t,
            asset: "SPY".to_string(),
            direction: Direction::Buy,
            confidence: dec!(0.7),
            date_created: created,
            date_evaluate: created,
            status: if correct.is_some() {
                PredictionStatus::Evaluated
            } else {
                PredictionStatus::Pending
            },
            was_correct: correct,
            outcome: None,
            evaluation_date: None,
            price_at_prediction: None,
            price_at_evaluation: None,
            metadata: None,
        }
    }

    #[test]
    fn test_breakdown_by_type() {
        let mut record = AdvisorRecord::ai("Quant", dec!(10));
        record.predictions = vec![
            prediction("a", PredictionType::PriceMovement, Some(true)),
            prediction("b", PredictionType::PriceMovement, Some(false)),
            prediction("c", PredictionType::PriceMovement, None),
            prediction("d", PredictionType::RiskWarning, Some(true)),
        ];
        record.recompute_stats();
        let stats = AdvisorStats::from_record(&record, 5);

        assert_eq!(stats.by_type.len(), 2);
        let price = &stats.by_type[0];
        assert_eq!(price.prediction_type, PredictionType::PriceMovement);
        assert_eq!((price.total, price.evaluated, price.correct), (3, 2, 1));
        assert_eq!(price.accuracy, dec!(0.5));
        assert_eq!(stats.by_type[1].accuracy, Decimal::ONE);
        assert_eq!(stats.total_predictions, 3);
        assert_eq!(stats.pending_predictions, 1);
    }

    #[test]
    fn test_history_limited_to_most_recent() {
        let mut record = AdvisorRecord::ai("Quant", dec!(10));
        for i in 0..4 {
            record.weight_history.push(WeightHistoryEntry {
                date: Utc.with_ymd_and_hms(2026, 1 + i, 1, 0, 0, 0).unwrap(),
                weight: Decimal::from(10 + i),
                reason: format!("cycle {i}"),
                accuracy: dec!(0.5),
                predictions_evaluated: 3,
            });
        }
        let stats = AdvisorStats::from_record(&record, 2);
        assert_eq!(stats.recent_history.len(), 2);
        assert_eq!(stats.recent_history[0].reason, "cycle 2");
        assert!(stats.to_string().contains("cycle 3"));
    }
}
