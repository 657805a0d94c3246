use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

use crate::db::snapshot::Snapshot;
use crate::db::Repository;

/// SQLite-backed repository. The whole document lives in one row of
/// `scoring_state`; `rebalance_log` mirrors `monthly_reports` for querying.
pub struct SqliteStore {
    pool: SqlitePool,
    database_path: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RebalanceLogRecord {
    pub report_index: i64,
    pub rebalanced_at: String,
    pub reason: String,
    pub total_predictions_evaluated: i64,
    pub report: String,
}

impl SqliteStore {
    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn new(database_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{database_path}"))
            .context("Invalid database path")?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Every connection to :memory: is a separate database.
        let max_connections = if database_path == ":memory:" { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        let store = Self {
            pool,
            database_path: database_path.to_string(),
        };
        store.migrate().await?;

        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let migration_sql = include_str!("../../migrations/001_init.sql");
        // Execute each statement separately (sqlx doesn't support multiple statements in one call)
        for statement in migration_sql.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("Failed to execute migration: {trimmed}"))?;
            }
        }
        Ok(())
    }

    /// Rebalance history as stored in `rebalance_log`, oldest first.
    pub async fn get_rebalance_log(&self) -> Result<Vec<RebalanceLogRecord>> {
        let rows = sqlx::query_as::<_, RebalanceLogRecord>(
            "SELECT * FROM rebalance_log ORDER BY report_index",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch rebalance log")?;
        Ok(rows)
    }
}

#[async_trait]
impl Repository for SqliteStore {
    async fn load(&self) -> Result<Option<Snapshot>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT document FROM scoring_state WHERE id = 1")
                .fetch_optional(&self.pool)
                .await
                .context("Failed to fetch scoring document")?;

        match row {
            Some((document,)) => {
                let snapshot = Snapshot::from_json(&document)
                    .context("Failed to parse stored scoring document")?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let document = serde_json::to_string(snapshot)
            .context("Failed to serialize scoring document")?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query(
            "INSERT INTO scoring_state (id, document, updated_at) VALUES (1, ?, datetime('now'))
             ON CONFLICT(id) DO UPDATE SET document = excluded.document, updated_at = excluded.updated_at",
        )
        .bind(&document)
        .execute(&mut *tx)
        .await
        .context("Failed to write scoring document")?;

        // Reports are append-only, so only the tail beyond what's logged is new.
        let (logged,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rebalance_log")
            .fetch_one(&mut *tx)
            .await
            .context("Failed to count rebalance log")?;

        for (index, report) in snapshot
            .monthly_reports
            .iter()
            .enumerate()
            .skip(logged.max(0) as usize)
        {
            let body = serde_json::to_string(report).context("Failed to serialize report")?;
            sqlx::query(
                "INSERT INTO rebalance_log (report_index, rebalanced_at, reason, total_predictions_evaluated, report)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(index as i64)
            .bind(report.date.to_rfc3339())
            .bind(&report.reason)
            .bind(report.total_predictions_evaluated as i64)
            .bind(body)
            .execute(&mut *tx)
            .await
            .context("Failed to append rebalance log")?;
        }

        tx.commit().await.context("Failed to commit scoring document")?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisors::models::AdvisorRecord;
    use crate::weights::policy::{EnginePolicy, WeightLimits};
    use crate::weights::rebalancer::rebalance;
    use chrono::{NaiveDate, TimeZone, Utc};
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
                AdvisorRecord::ai("Quant", dec!(10)),
            ],
            policy,
        )
    }

    #[tokio::test]
    async fn test_store_create_and_migrate() {
        let store = SqliteStore::new(":memory:").await.expect("should create store");
        assert!(store.load().await.unwrap().is_none());
        assert_eq!(store.describe(), "sqlite::memory:");
    }

    #[tokio::test]
    async fn test_save_overwrites_single_document() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let mut snap = snapshot();
        store.save(&snap).await.unwrap();

        snap.advisors[1].current_weight = Some(dec!(12));
        store.save(&snap).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.advisors[1].current_weight, Some(dec!(12)));
        assert_eq!(loaded.advisors[0].name, "Operator");

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scoring_state")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_rebalance_log_mirrors_reports() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let mut snap = snapshot();
        let now = Utc.with_ymd_and_hms(2026, 10, 14, 0, 0, 0).unwrap();

        rebalance(&mut snap, "first", now);
        store.save(&snap).await.unwrap();
        rebalance(&mut snap, "second", now);
        rebalance(&mut snap, "second", now);
        store.save(&snap).await.unwrap();
        store.save(&snap).await.unwrap();

        let log = store.get_rebalance_log().await.unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].reason, "first");
        assert_eq!(log[2].report_index, 2);
    }
}
