use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ScoringError;

/// What kind of claim a prediction makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    PriceMovement,
    PortfolioAction,
    MarketTiming,
    RiskWarning,
}

impl PredictionType {
    pub const ALL: [PredictionType; 4] = [
        Self::PriceMovement,
        Self::PortfolioAction,
        Self::MarketTiming,
        Self::RiskWarning,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceMovement => "price_movement",
            Self::PortfolioAction => "portfolio_action",
            Self::MarketTiming => "market_timing",
            Self::RiskWarning => "risk_warning",
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionType {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ScoringError::InvalidInput(format!("unknown prediction type '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Buy,
    Sell,
    Hold,
    ReduceExposure,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Self::Up,
        Self::Down,
        Self::Buy,
        Self::Sell,
        Self::Hold,
        Self::ReduceExposure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
            Self::ReduceExposure => "reduce_exposure",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ScoringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ScoringError::InvalidInput(format!("unknown direction '{s}'")))
    }
}

/// Lifecycle state. `Evaluated` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Pending,
    Evaluated,
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Evaluated => write!(f, "evaluated"),
        }
    }
}

/// A single forward-looking claim made by an advisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub advisor: String,
    /// Free-form prediction text as produced by the advisor.
    pub prediction: String,
    pub prediction_type: PredictionType,
    pub asset: String,
    pub direction: Direction,
    #[serde(with = "rust_decimal::serde::float")]
    pub confidence: Decimal,
    pub date_created: DateTime<Utc>,
    /// Earliest moment the prediction may be judged.
    pub date_evaluate: DateTime<Utc>,
    pub status: PredictionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_correct: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub price_at_prediction: Option<Decimal>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub price_at_evaluation: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Prediction {
    pub fn is_pending(&self) -> bool {
        self.status == PredictionStatus::Pending
    }

    pub fn is_evaluated(&self) -> bool {
        self.status == PredictionStatus::Evaluated
    }
}

/// Input for creating a prediction. Validated by the ledger before any mutation.
#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub advisor: String,
    pub text: String,
    pub prediction_type: PredictionType,
    pub asset: String,
    pub direction: Direction,
    pub confidence: Decimal,
    pub price_at_prediction: Option<Decimal>,
    pub metadata: Option<serde_json::Value>,
}

impl PredictionRequest {
    pub fn new(
        advisor: impl Into<String>,
        text: impl Into<String>,
        prediction_type: PredictionType,
        asset: impl Into<String>,
        direction: Direction,
        confidence: Decimal,
    ) -> Self {
        Self {
            advisor: advisor.into(),
            text: text.into(),
            prediction_type,
            asset: asset.into(),
            direction,
            confidence,
            price_at_prediction: None,
            metadata: None,
        }
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price_at_prediction = Some(price);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Judgment supplied by the external evaluator.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub was_correct: bool,
    pub notes: Option<String>,
    pub price_at_evaluation: Option<Decimal>,
}

impl Evaluation {
    pub fn correct() -> Self {
        Self {
            was_correct: true,
            notes: None,
            price_at_evaluation: None,
        }
    }

    pub fn incorrect() -> Self {
        Self {
            was_correct: false,
            ..Self::correct()
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price_at_evaluation = Some(price);
        self
    }
}
