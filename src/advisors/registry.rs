//! Static advisor roster loaded from configuration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::info;

use crate::advisors::models::{AdvisorKind, AdvisorRecord};
use crate::config::{AdvisorConfig, PolicyConfig};
use crate::db::snapshot::Snapshot;
use crate::weights::policy::EnginePolicy;

/// Ordered roster. Iteration order is registry order everywhere in the engine.
#[derive(Debug, Clone)]
pub struct AdvisorRegistry {
    entries: Vec<AdvisorConfig>,
}

impl AdvisorRegistry {
    pub fn new(entries: Vec<AdvisorConfig>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record_for(entry: &AdvisorConfig, base_weight: Decimal) -> AdvisorRecord {
        match entry.kind {
            AdvisorKind::Human => {
                AdvisorRecord::human(&entry.name, entry.fixed_weight.unwrap_or(Decimal::ZERO))
            }
            AdvisorKind::Ai => AdvisorRecord::ai(&entry.name, base_weight),
        }
    }

    /// Fresh document for a store that has never been written.
    pub fn seed_snapshot(&self, policy: &PolicyConfig, now: DateTime<Utc>) -> Snapshot {
        let metadata = EnginePolicy::from_config(policy, now);
        let advisors = self
            .entries
            .iter()
            .map(|e| Self::record_for(e, metadata.base_weight_per_advisor))
            .collect();
        Snapshot::new(advisors, metadata)
    }

    /// Append roster advisors missing from a loaded document.
    ///
    /// Advisors already in the document are left alone, including ones that are
    /// no longer in the roster. Returns the names that were added.
    pub fn reconcile(&self, snapshot: &mut Snapshot) -> Vec<String> {
        let base = snapshot.metadata.base_weight_per_advisor;
        let mut added = Vec::new();

        for entry in &self.entries {
            if snapshot.advisor(&entry.name).is_some() {
                continue;
            }
            info!(advisor = %entry.name, kind = %entry.kind, "Registering new advisor");
            snapshot.advisors.push(Self::record_for(entry, base));
            added.push(entry.name.clone());
        }

        added
    }
}
