use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::advisors::models::AdvisorKind;
use crate::weights::policy::{
    DEFAULT_EVALUATION_HORIZON_DAYS, DEFAULT_MIN_PREDICTIONS, DEFAULT_POOL_DAMPING,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "ADVISOR_SCORING_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub policy: PolicyConfig,
    pub advisors: Vec<AdvisorConfig>,
    pub storage: StorageConfig,
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    pub base_weight_per_advisor: Decimal,
    pub dynamic_pool: Decimal,
    pub min_weight: Decimal,
    pub max_weight: Decimal,
    #[serde(default = "default_min_predictions")]
    pub min_predictions_for_scoring: u64,
    #[serde(default = "default_pool_damping")]
    pub pool_damping: Decimal,
    #[serde(default = "default_horizon_days")]
    pub evaluation_horizon_days: i64,
}

fn default_min_predictions() -> u64 {
    DEFAULT_MIN_PREDICTIONS
}

fn default_pool_damping() -> Decimal {
    DEFAULT_POOL_DAMPING
}

fn default_horizon_days() -> i64 {
    DEFAULT_EVALUATION_HORIZON_DAYS
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvisorConfig {
    pub name: String,
    pub kind: AdvisorKind,
    /// Required for humans, ignored for ai advisors.
    pub fixed_weight: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8088,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// How often `serve` checks whether a scheduled rebalance is due.
    pub check_interval_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: 3600,
        }
    }
}

impl AppConfig {
    /// Load configuration from `path`, the `ADVISOR_SCORING_CONFIG` variable,
    /// or config/default.toml, in that order.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var(CONFIG_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH)),
        };

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.policy;
        let hundred = Decimal::ONE_HUNDRED;

        for (label, value) in [
            ("base_weight_per_advisor", p.base_weight_per_advisor),
            ("dynamic_pool", p.dynamic_pool),
            ("min_weight", p.min_weight),
            ("max_weight", p.max_weight),
        ] {
            if value < Decimal::ZERO || value > hundred {
                bail!("policy.{label} must be within [0, 100], got {value}");
            }
        }
        if p.min_weight > p.max_weight {
            bail!(
                "policy.min_weight ({}) exceeds policy.max_weight ({})",
                p.min_weight,
                p.max_weight
            );
        }
        if p.base_weight_per_advisor < p.min_weight || p.base_weight_per_advisor > p.max_weight {
            bail!(
                "policy.base_weight_per_advisor ({}) must lie within [{}, {}]",
                p.base_weight_per_advisor,
                p.min_weight,
                p.max_weight
            );
        }
        if p.pool_damping < Decimal::ZERO || p.pool_damping > Decimal::ONE {
            bail!("policy.pool_damping must be within [0, 1], got {}", p.pool_damping);
        }
        if p.evaluation_horizon_days < 0 {
            bail!("policy.evaluation_horizon_days must not be negative");
        }

        for (i, advisor) in self.advisors.iter().enumerate() {
            if advisor.name.trim().is_empty() {
                bail!("advisors[{i}] has an empty name");
            }
            if self.advisors[..i].iter().any(|a| a.name == advisor.name) {
                bail!("duplicate advisor name '{}'", advisor.name);
            }
            if advisor.kind == AdvisorKind::Human {
                match advisor.fixed_weight {
                    Some(w) if w >= Decimal::ZERO && w <= hundred => {}
                    Some(w) => bail!(
                        "advisor '{}' fixed_weight must be within [0, 100], got {w}",
                        advisor.name
                    ),
                    None => bail!("human advisor '{}' requires a fixed_weight", advisor.name),
                }
            }
        }

        if self.scheduler.check_interval_seconds == 0 {
            bail!("scheduler.check_interval_seconds must be positive");
        }

        if self.storage.path.trim().is_empty() {
            bail!("storage.path must not be empty");
        }

        Ok(())
    }
}
