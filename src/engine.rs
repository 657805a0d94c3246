//! Scoring engine: the single writer over the ledger and policy.
//!
//! Every mutation runs under one lock as load-clone, mutate, save, swap. If the
//! save fails the in-memory snapshot is left exactly as it was.

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::advisors::registry::AdvisorRegistry;
use crate::advisors::stats::AdvisorStats;
use crate::config::PolicyConfig;
use crate::db::snapshot::Snapshot;
use crate::db::Repository;
use crate::error::{ScoringError, ScoringResult};
use crate::ledger::models::{Evaluation, PredictionRequest};
use crate::ledger::scanner::{self, PendingEvaluation};
use crate::ledger::{self, EvaluationOutcome};
use crate::weights::leaderboard::{self, Leaderboard};
use crate::weights::rebalancer::{self, RebalanceReport, SCHEDULED_REASON};

/// Weight-history entries included in `advisor_stats`.
const STATS_HISTORY_LIMIT: usize = 12;

pub struct ScoringEngine<R: Repository> {
    repository: R,
    state: Mutex<Snapshot>,
}

impl<R: Repository> ScoringEngine<R> {
    /// Load the stored document, seeding it from the roster on first use and
    /// registering any roster advisors the document does not know yet.
    pub async fn open(
        repository: R,
        registry: &AdvisorRegistry,
        policy: &PolicyConfig,
        now: DateTime<Utc>,
    ) -> ScoringResult<Self> {
        let loaded = repository.load().await.map_err(ScoringError::Persistence)?;

        let snapshot = match loaded {
            Some(mut snapshot) => {
                let added = registry.reconcile(&mut snapshot);
                if !added.is_empty() {
                    snapshot.touch(now);
                    repository
                        .save(&snapshot)
                        .await
                        .map_err(ScoringError::Persistence)?;
                }
                snapshot
            }
            None => {
                info!(
                    store = %repository.describe(),
                    advisors = registry.len(),
                    "No scoring document found, seeding from roster"
                );
                let mut snapshot = registry.seed_snapshot(policy, now);
                snapshot.touch(now);
                repository
                    .save(&snapshot)
                    .await
                    .map_err(ScoringError::Persistence)?;
                snapshot
            }
        };

        info!(
            store = %repository.describe(),
            advisors = snapshot.advisors.len(),
            next_rebalance = %snapshot.metadata.next_rebalance,
            "Scoring engine ready"
        );

        Ok(Self::from_snapshot(repository, snapshot))
    }

    /// Wrap an already-loaded snapshot without touching storage.
    pub fn from_snapshot(repository: R, snapshot: Snapshot) -> Self {
        Self {
            repository,
            state: Mutex::new(snapshot),
        }
    }

    /// Run `f` against a copy of the current snapshot. The copy is persisted and
    /// installed only if `f` reports a change and the save succeeds.
    async fn mutate<T>(
        &self,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Snapshot) -> ScoringResult<(T, bool)>,
    ) -> ScoringResult<T> {
        let mut current = self.state.lock().await;
        let mut next = current.clone();

        let (value, changed) = f(&mut next)?;
        if !changed {
            return Ok(value);
        }

        next.touch(now);
        if let Err(e) = self.repository.save(&next).await {
            error!(
                store = %self.repository.describe(),
                error = %format!("{e:#}"),
                "Failed to persist scoring document, change discarded"
            );
            return Err(ScoringError::Persistence(e));
        }

        *current = next;
        Ok(value)
    }

    pub async fn add_prediction(
        &self,
        request: PredictionRequest,
        now: DateTime<Utc>,
    ) -> ScoringResult<String> {
        self.mutate(now, |snapshot| {
            ledger::add_prediction(snapshot, request, now).map(|id| (id, true))
        })
        .await
    }

    pub async fn evaluate_prediction(
        &self,
        prediction_id: &str,
        evaluation: Evaluation,
        now: DateTime<Utc>,
    ) -> ScoringResult<EvaluationOutcome> {
        self.mutate(now, |snapshot| {
            let outcome = ledger::evaluate_prediction(snapshot, prediction_id, evaluation, now)?;
            let changed = matches!(outcome, EvaluationOutcome::Evaluated(_));
            Ok((outcome, changed))
        })
        .await
    }

    pub async fn rebalance(&self, reason: &str, now: DateTime<Utc>) -> ScoringResult<RebalanceReport> {
        self.mutate(now, |snapshot| {
            Ok((rebalancer::rebalance(snapshot, reason, now), true))
        })
        .await
    }

    /// Rebalance only if `now` has reached the scheduled date.
    pub async fn rebalance_if_due(&self, now: DateTime<Utc>) -> ScoringResult<Option<RebalanceReport>> {
        self.mutate(now, |snapshot| {
            if !snapshot.metadata.rebalance_due(now) {
                info!(
                    next_rebalance = %snapshot.metadata.next_rebalance,
                    "Rebalance not yet due"
                );
                return Ok((None, false));
            }
            let report = rebalancer::rebalance(snapshot, SCHEDULED_REASON, now);
            Ok((Some(report), true))
        })
        .await
    }

    pub async fn pending_evaluations(&self, now: DateTime<Utc>) -> Vec<PendingEvaluation> {
        scanner::pending_evaluations(&*self.state.lock().await, now)
    }

    pub async fn leaderboard(&self) -> Leaderboard {
        leaderboard::leaderboard(&*self.state.lock().await)
    }

    pub async fn advisor_stats(&self, name: &str) -> ScoringResult<AdvisorStats> {
        let state = self.state.lock().await;
        state
            .advisor(name)
            .map(|a| AdvisorStats::from_record(a, STATS_HISTORY_LIMIT))
            .ok_or_else(|| ScoringError::UnknownAdvisor(name.to_string()))
    }

    pub async fn reports(&self) -> Vec<RebalanceReport> {
        self.state.lock().await.monthly_reports.clone()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.clone()
    }
}
