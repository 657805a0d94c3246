//! Single JSON document on disk.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::db::snapshot::Snapshot;
use crate::db::Repository;

pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "advisor_scores.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl Repository for JsonFileRepository {
    async fn load(&self) -> Result<Option<Snapshot>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        let snapshot = Snapshot::from_json(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(snapshot))
    }

    /// Write to a sibling temp file, fsync, then rename over the target.
    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let json = snapshot
            .to_json_pretty()
            .context("Failed to serialize scoring document")?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(json.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        file.sync_all()
            .await
            .with_context(|| format!("Failed to sync {}", tmp.display()))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), bytes = json.len(), "Scoring document saved");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisors::models::AdvisorRecord;
    use crate::weights::policy::{EnginePolicy, WeightLimits};
    use chrono::NaiveDate;
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
        Snapshot::new(vec![AdvisorRecord::ai("Quant", dec!(10))], policy)
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("scores.json"));
        assert!(repo.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let repo = JsonFileRepository::new(dir.path().join("nested/scores.json"));
        repo.save(&snapshot()).await.unwrap();

        let loaded = repo.load().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot());
        assert!(!repo.temp_path().exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        std::fs::write(&path, "{ not json").unwrap();

        let repo = JsonFileRepository::new(&path);
        let err = repo.load().await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse"));
    }

    #[tokio::test]
    async fn test_failed_save_keeps_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        let repo = JsonFileRepository::new(&path);
        repo.save(&snapshot()).await.unwrap();

        // A directory squatting on the temp path makes the write fail.
        std::fs::create_dir(repo.temp_path()).unwrap();
        let mut changed = snapshot();
        changed.advisors[0].current_weight = Some(dec!(15));
        assert!(repo.save(&changed).await.is_err());

        let loaded = repo.load().await.unwrap().unwrap();
        assert_eq!(loaded.advisors[0].current_weight, Some(dec!(10)));
    }
}
