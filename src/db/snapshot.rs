//! The persisted scoring document.
//!
//! Advisors are held in an ordered `Vec` and written as the `advisors` map of
//! the on-disk document, keyed by name, preserving registry order both ways.
//! Advisor counters are rebuilt from each ledger on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::advisors::models::AdvisorRecord;
use crate::ledger::models::Prediction;
use crate::weights::policy::EnginePolicy;
use crate::weights::rebalancer::RebalanceReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(with = "advisor_map")]
    pub advisors: Vec<AdvisorRecord>,
    pub metadata: EnginePolicy,
    #[serde(default)]
    pub monthly_reports: Vec<RebalanceReport>,
}

impl Snapshot {
    pub fn new(advisors: Vec<AdvisorRecord>, metadata: EnginePolicy) -> Self {
        Self {
            advisors,
            metadata,
            monthly_reports: Vec::new(),
        }
    }

    pub fn advisor(&self, name: &str) -> Option<&AdvisorRecord> {
        self.advisors.iter().find(|a| a.name == name)
    }

    pub fn advisor_mut(&mut self, name: &str) -> Option<&mut AdvisorRecord> {
        self.advisors.iter_mut().find(|a| a.name == name)
    }

    /// Locate a prediction by id across every advisor.
    pub fn find_prediction(&self, id: &str) -> Option<(&AdvisorRecord, &Prediction)> {
        self.advisors.iter().find_map(|advisor| {
            advisor
                .predictions
                .iter()
                .find(|p| p.id == id)
                .map(|p| (advisor, p))
        })
    }

    pub fn contains_prediction(&self, id: &str) -> bool {
        self.find_prediction(id).is_some()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.metadata.last_updated = Some(now);
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }
}

mod advisor_map {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use crate::advisors::models::AdvisorRecord;

    pub fn serialize<S: Serializer>(
        advisors: &[AdvisorRecord],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(advisors.len()))?;
        for advisor in advisors {
            map.serialize_entry(&advisor.name, advisor)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<AdvisorRecord>, D::Error> {
        deserializer.deserialize_map(AdvisorMapVisitor)
    }

    struct AdvisorMapVisitor;

    impl<'de> Visitor<'de> for AdvisorMapVisitor {
        type Value = Vec<AdvisorRecord>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of advisor name to advisor record")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
            let mut advisors = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((name, mut record)) = access.next_entry::<String, AdvisorRecord>()? {
                if advisors.iter().any(|a: &AdvisorRecord| a.name == name) {
                    return Err(serde::de::Error::custom(format!(
                        "duplicate advisor '{name}'"
                    )));
                }
                record.name = name;
                // Counters always come from the ledger, not the stored values.
                record.recompute_stats();
                advisors.push(record);
            }
            Ok(advisors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::policy::WeightLimits;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
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
                AdvisorRecord::ai("Zeta", dec!(10)),
                AdvisorRecord::human("Alpha", dec!(30)),
                AdvisorRecord::ai("Mid", dec!(10)),
            ],
            policy,
        )
    }

    #[test]
    fn test_document_preserves_advisor_order() {
        let original = snapshot();
        let json = original.to_json_pretty().unwrap();
        let parsed = Snapshot::from_json(&json).unwrap();

        let names: Vec<&str> = parsed.advisors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Zeta", "Alpha", "Mid"]);
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_document_shape() {
        let value = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(value["advisors"]["Alpha"]["type"], "human");
        assert_eq!(value["advisors"]["Zeta"]["current_weight"], 10.0);
        assert_eq!(value["metadata"]["weight_limits"]["min"], 5.0);
        assert_eq!(value["metadata"]["next_rebalance"], "2026-11-01");
        assert!(value["monthly_reports"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_loads_minimal_document() {
        let json = r#"{
            "advisors": {
                "Quant": {"type": "ai", "current_weight": 12.5},
                "Operator": {"type": "human", "fixed_weight": 30}
            },
            "metadata": {
                "base_weight_per_advisor": 10,
                "dynamic_pool": 8,
                "weight_limits": {"min": 5, "max": 20},
                "next_rebalance": "2026-11-01"
            }
        }"#;
        let parsed = Snapshot::from_json(json).unwrap();
        assert_eq!(parsed.advisors.len(), 2);
        assert_eq!(parsed.advisors[0].name, "Quant");
        assert_eq!(parsed.advisors[0].current_weight, Some(dec!(12.5)));
        assert!(parsed.monthly_reports.is_empty());
    }

    #[test]
    fn test_stored_counters_rebuilt_from_ledger() {
        let prediction = |id: &str, correct: bool| {
            format!(
                r#"{{"id": "{id}", "advisor": "Quant", "prediction": "BTC up",
                    "prediction_type": "price_movement", "asset": "BTC", "direction": "up",
                    "confidence": 0.7, "date_created": "2026-09-01T00:00:00Z",
                    "date_evaluate": "2026-10-01T00:00:00Z", "status": "evaluated",
                    "was_correct": {correct}}}"#
            )
        };
        let json = format!(
            r#"{{
                "advisors": {{
                    "Quant": {{
                        "type": "ai",
                        "current_weight": 10,
                        "predictions": [{}, {}, {}],
                        "total_predictions": 7,
                        "correct_predictions": 5,
                        "accuracy_rate": 0.33333333333333337
                    }}
                }},
                "metadata": {{
                    "base_weight_per_advisor": 10,
                    "dynamic_pool": 8,
                    "weight_limits": {{"min": 5, "max": 20}},
                    "next_rebalance": "2026-11-01"
                }}
            }}"#,
            prediction("a", true),
            prediction("b", false),
            prediction("c", false)
        );

        let parsed = Snapshot::from_json(&json).unwrap();
        let quant = &parsed.advisors[0];
        assert_eq!(quant.total_predictions, 3);
        assert_eq!(quant.correct_predictions, 1);
        assert_eq!(quant.incorrect_predictions, 2);
        assert_eq!(quant.accuracy_rate, Decimal::ONE / Decimal::from(3));
        assert_eq!(quant.confidence_avg, dec!(0.7));
    }
}
