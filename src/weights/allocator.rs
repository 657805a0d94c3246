//! Weight allocation from realized accuracy.
//!
//! Splits the dynamic pool among ai advisors in proportion to their signed
//! performance relative to a coin flip, then clamps to the policy limits.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::advisors::models::{AdvisorKind, AdvisorRecord};
use crate::weights::policy::EnginePolicy;

/// Accuracy that earns no pool share.
const NEUTRAL_ACCURACY: Decimal = dec!(0.5);

/// Weights are stored with two decimal places.
const WEIGHT_DP: u32 = 2;

/// Net deltas smaller than this are division residue and count as zero.
const TOTAL_DELTA_EPSILON: Decimal = dec!(0.000000000001);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocatedWeight {
    pub advisor: String,
    pub kind: AdvisorKind,
    pub weight: Decimal,
    pub performance_delta: Decimal,
}

/// Result of one allocation pass, in registry order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NewWeights {
    pub weights: Vec<AllocatedWeight>,
    pub total_delta: Decimal,
}

impl NewWeights {
    pub fn get(&self, advisor: &str) -> Option<Decimal> {
        self.weights
            .iter()
            .find(|w| w.advisor == advisor)
            .map(|w| w.weight)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AllocatedWeight> {
        self.weights.iter()
    }
}

/// Signed performance of an advisor relative to `NEUTRAL_ACCURACY`.
///
/// Humans and advisors below the policy's sample threshold are neutral.
pub fn performance_delta(policy: &EnginePolicy, advisor: &AdvisorRecord) -> Decimal {
    if !advisor.is_ai()
        || advisor.total_predictions == 0
        || advisor.total_predictions < policy.min_predictions_for_scoring
    {
        return Decimal::ZERO;
    }
    let accuracy =
        Decimal::from(advisor.correct_predictions) / Decimal::from(advisor.total_predictions);
    accuracy - NEUTRAL_ACCURACY
}

/// Unclamped weight for one ai advisor. Saturates to the policy limit on the
/// side of `delta` if the pool share does not fit in a `Decimal`.
fn raw_weight(policy: &EnginePolicy, delta: Decimal, total_delta: Decimal) -> Decimal {
    if total_delta.abs() < TOTAL_DELTA_EPSILON {
        return policy.base_weight_per_advisor;
    }
    delta
        .checked_div(total_delta.abs())
        .and_then(|ratio| ratio.checked_mul(policy.dynamic_pool))
        .and_then(|share| share.checked_mul(policy.pool_damping))
        .and_then(|share| share.checked_add(policy.base_weight_per_advisor))
        .unwrap_or(if delta.is_sign_negative() {
            policy.weight_limits.min
        } else {
            policy.weight_limits.max
        })
}

/// Compute the next weight for every advisor.
///
/// # Formula
/// ```text
/// delta_i     = correct_i / total_i - 0.5   (0 below the sample threshold)
/// total_delta = sum(delta_i)
/// share_i     = delta_i / |total_delta| * dynamic_pool * pool_damping   (0 if |total_delta| < 1e-12)
/// weight_i    = round2(clamp(base + share_i, min, max))
/// ```
/// Human advisors keep their `fixed_weight`. Pure: reads nothing but its inputs.
pub fn calculate_new_weights(policy: &EnginePolicy, advisors: &[AdvisorRecord]) -> NewWeights {
    let deltas: Vec<Decimal> = advisors
        .iter()
        .map(|a| performance_delta(policy, a))
        .collect();

    let total_delta: Decimal = advisors
        .iter()
        .zip(&deltas)
        .filter(|(a, _)| a.is_ai())
        .map(|(_, d)| *d)
        .sum();

    let weights = advisors
        .iter()
        .zip(deltas)
        .map(|(advisor, delta)| {
            let weight = match advisor.kind {
                AdvisorKind::Human => advisor.fixed_weight.unwrap_or(Decimal::ZERO),
                AdvisorKind::Ai => policy
                    .weight_limits
                    .clamp(raw_weight(policy, delta, total_delta))
                    .round_dp(WEIGHT_DP),
            };
            AllocatedWeight {
                advisor: advisor.name.clone(),
                kind: advisor.kind,
                weight,
                performance_delta: delta,
            }
        })
        .collect();

    NewWeights {
        weights,
        total_delta,
    }
}
