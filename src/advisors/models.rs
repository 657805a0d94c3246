use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ScoringError;
use crate::ledger::models::Prediction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisorKind {
    Human,
    Ai,
}

impl fmt::Display for AdvisorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => write!(f, "human"),
            Self::Ai => write!(f, "ai"),
        }
    }
}

impl FromStr for AdvisorKind {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "ai" => Ok(Self::Ai),
            other => Err(ScoringError::InvalidInput(format!(
                "unknown advisor type '{other}'"
            ))),
        }
    }
}

/// One entry of an advisor's append-only weight audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightHistoryEntry {
    pub date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub weight: Decimal,
    pub reason: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub accuracy: Decimal,
    pub predictions_evaluated: u64,
}

/// Persisted state of one advisor: roster entry, running statistics and ledger.
///
/// `name` is the key of the `advisors` map in the stored document, so it is not
/// serialized as a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorRecord {
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AdvisorKind,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub fixed_weight: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub current_weight: Option<Decimal>,
    #[serde(default)]
    pub predictions: Vec<Prediction>,
    #[serde(default)]
    pub pending_predictions: u64,
    #[serde(default)]
    pub total_predictions: u64,
    #[serde(default)]
    pub correct_predictions: u64,
    #[serde(default)]
    pub incorrect_predictions: u64,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub accuracy_rate: Decimal,
    #[serde(default, with = "rust_decimal::serde::float")]
    pub confidence_avg: Decimal,
    #[serde(default)]
    pub weight_history: Vec<WeightHistoryEntry>,
}

impl AdvisorRecord {
    pub fn human(name: impl Into<String>, fixed_weight: Decimal) -> Self {
        Self::blank(name.into(), AdvisorKind::Human, Some(fixed_weight), None)
    }

    pub fn ai(name: impl Into<String>, starting_weight: Decimal) -> Self {
        Self::blank(name.into(), AdvisorKind::Ai, None, Some(starting_weight))
    }

    fn blank(
        name: String,
        kind: AdvisorKind,
        fixed_weight: Option<Decimal>,
        current_weight: Option<Decimal>,
    ) -> Self {
        Self {
            name,
            kind,
            fixed_weight,
            current_weight,
            predictions: Vec::new(),
            pending_predictions: 0,
            total_predictions: 0,
            correct_predictions: 0,
            incorrect_predictions: 0,
            accuracy_rate: Decimal::ZERO,
            confidence_avg: Decimal::ZERO,
            weight_history: Vec::new(),
        }
    }

    pub fn is_ai(&self) -> bool {
        self.kind == AdvisorKind::Ai
    }

    /// Weight used in consensus voting. Missing values degrade to zero.
    pub fn weight(&self) -> Decimal {
        match self.kind {
            AdvisorKind::Human => self.fixed_weight.unwrap_or(Decimal::ZERO),
            AdvisorKind::Ai => self.current_weight.unwrap_or(Decimal::ZERO),
        }
    }

    /// Recompute counters, accuracy and average confidence from the ledger.
    pub fn recompute_stats(&mut self) {
        let mut pending = 0u64;
        let mut correct = 0u64;
        let mut incorrect = 0u64;
        let mut confidence_sum = Decimal::ZERO;

        for prediction in &self.predictions {
            if prediction.is_pending() {
                pending += 1;
                continue;
            }
            if prediction.was_correct == Some(true) {
                correct += 1;
            } else {
                incorrect += 1;
            }
            confidence_sum += prediction.confidence;
        }

        let total = correct + incorrect;
        self.pending_predictions = pending;
        self.total_predictions = total;
        self.correct_predictions = correct;
        self.incorrect_predictions = incorrect;

        if total > 0 {
            self.accuracy_rate = Decimal::from(correct) / Decimal::from(total);
            self.confidence_avg = confidence_sum / Decimal::from(total);
        } else {
            self.accuracy_rate = Decimal::ZERO;
            self.confidence_avg = Decimal::ZERO;
        }
    }
}
