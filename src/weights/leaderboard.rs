//! Sorted read-only view of advisor weights and accuracy.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::advisors::models::AdvisorKind;
use crate::db::snapshot::Snapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub advisor: String,
    pub kind: AdvisorKind,
    pub weight: Decimal,
    pub accuracy: Decimal,
    pub total_predictions: u64,
    pub pending_predictions: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Leaderboard {
    pub entries: Vec<LeaderboardEntry>,
}

impl Leaderboard {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all listed weights.
    pub fn total_weight(&self) -> Decimal {
        self.entries.iter().map(|e| e.weight).sum()
    }
}

/// Weight descending; equal weights keep registry order.
pub fn leaderboard(snapshot: &Snapshot) -> Leaderboard {
    let mut entries: Vec<LeaderboardEntry> = snapshot
        .advisors
        .iter()
        .map(|a| LeaderboardEntry {
            rank: 0,
            advisor: a.name.clone(),
            kind: a.kind,
            weight: a.weight(),
            accuracy: a.accuracy_rate,
            total_predictions: a.total_predictions,
            pending_predictions: a.pending_predictions,
        })
        .collect();

    // Vec::sort_by is stable.
    entries.sort_by(|a, b| b.weight.cmp(&a.weight));
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.rank = i + 1;
    }

    Leaderboard { entries }
}

impl fmt::Display for Leaderboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Advisor Leaderboard ===")?;
        writeln!(
            f,
            "{:>4}  {:<24} {:>5} {:>8} {:>9} {:>6} {:>8}",
            "#", "Advisor", "Type", "Weight", "Accuracy", "Total", "Pending"
        )?;
        for e in &self.entries {
            let accuracy = if e.kind == AdvisorKind::Human {
                "-".to_string()
            } else {
                format!("{:.1}%", e.accuracy * Decimal::ONE_HUNDRED)
            };
            writeln!(
                f,
                "{:>4}  {:<24} {:>5} {:>7}% {:>9} {:>6} {:>8}",
                e.rank,
                e.advisor,
                e.kind.to_string(),
                e.weight.round_dp(2),
                accuracy,
                e.total_predictions,
                e.pending_predictions
            )?;
        }
        write!(f, "Total weight: {}%", self.total_weight().round_dp(2))
    }
}
