use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use advisor_scoring::advisors::registry::AdvisorRegistry;
use advisor_scoring::config::{AppConfig, StorageBackend, StorageConfig};
use advisor_scoring::db::json_file::JsonFileRepository;
use advisor_scoring::db::store::SqliteStore;
use advisor_scoring::db::Repository;
use advisor_scoring::engine::ScoringEngine;
use advisor_scoring::error::ScoringError;
use advisor_scoring::ledger::models::{Direction, Evaluation, PredictionRequest, PredictionType};
use advisor_scoring::ledger::scanner::PendingEvaluation;
use advisor_scoring::ledger::EvaluationOutcome;
use advisor_scoring::monitoring::dashboard::{self, DashboardState};
use advisor_scoring::monitoring::logger;

type Engine = ScoringEngine<Box<dyn Repository>>;

#[derive(Parser)]
#[command(name = "advisor-scoring")]
#[command(about = "Advisor prediction scoring and consensus weight rebalancing")]
struct Cli {
    /// Path to configuration file (defaults to $ADVISOR_SCORING_CONFIG or config/default.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show advisors sorted by current weight
    Leaderboard,
    /// List pending predictions whose evaluation date has passed
    Pending,
    /// Recompute ai advisor weights from realized accuracy
    Rebalance {
        /// Reason recorded in the weight history
        #[arg(default_value = "Manual rebalance")]
        reason: String,
        /// Only rebalance if the scheduled date has been reached
        #[arg(long)]
        if_due: bool,
    },
    /// Record a new prediction for an advisor
    AddPrediction {
        advisor: String,
        text: String,
        /// price_movement, portfolio_action, market_timing or risk_warning
        prediction_type: String,
        asset: String,
        /// up, down, buy, sell, hold or reduce_exposure
        direction: String,
        /// Between 0.0 and 1.0
        confidence: String,
        /// Asset price when the prediction was made
        #[arg(long)]
        price: Option<String>,
        /// Extra JSON object stored with the prediction
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Record the verdict on a prediction
    Evaluate {
        prediction_id: String,
        /// correct or incorrect
        #[arg(value_parser = parse_verdict, action = clap::ArgAction::Set)]
        verdict: bool,
        notes: Option<String>,
        /// Asset price at evaluation time
        #[arg(long)]
        price: Option<String>,
    },
    /// Show detailed statistics for one advisor
    Stats { advisor: String },
    /// Show the rebalance history
    Reports,
    /// Serve the read-only JSON API and run scheduled rebalances
    Serve,
}

fn parse_verdict(s: &str) -> Result<bool, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "correct" | "true" | "yes" | "1" => Ok(true),
        "incorrect" | "false" | "no" | "0" => Ok(false),
        other => Err(format!("expected 'correct' or 'incorrect', got '{other}'")),
    }
}

fn parse_decimal(label: &str, value: &str) -> Result<Decimal, ScoringError> {
    Decimal::from_str(value.trim())
        .map_err(|e| ScoringError::InvalidInput(format!("{label} '{value}' is not a number: {e}")))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    logger::init_logging(&config.monitoring)?;

    let repository = open_repository(&config.storage).await?;
    let registry = AdvisorRegistry::new(config.advisors.clone());
    let engine = match ScoringEngine::open(repository, &registry, &config.policy, Utc::now()).await {
        Ok(engine) => engine,
        Err(e) => return report(e),
    };

    match run(cli.command, engine, &config).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => report(e),
    }
}

/// Domain conditions are printed and exit 1; persistence failures propagate.
fn report(e: ScoringError) -> Result<ExitCode> {
    if e.is_reportable() {
        eprintln!("{e}");
        Ok(ExitCode::from(1))
    } else {
        Err(anyhow::Error::new(e))
    }
}

async fn open_repository(storage: &StorageConfig) -> Result<Box<dyn Repository>> {
    let repository: Box<dyn Repository> = match storage.backend {
        StorageBackend::Json => Box::new(JsonFileRepository::new(&storage.path)),
        StorageBackend::Sqlite => Box::new(SqliteStore::new(&storage.path).await?),
    };
    tracing::debug!(store = %repository.describe(), "Repository opened");
    Ok(repository)
}

async fn run(command: Commands, engine: Engine, config: &AppConfig) -> Result<(), ScoringError> {
    match command {
        Commands::Leaderboard => {
            println!("{}", engine.leaderboard().await);
        }
        Commands::Pending => {
            print_pending(&engine.pending_evaluations(Utc::now()).await);
        }
        Commands::Rebalance { reason, if_due } => {
            let report = if if_due {
                engine.rebalance_if_due(Utc::now()).await?
            } else {
                Some(engine.rebalance(&reason, Utc::now()).await?)
            };
            match report {
                Some(report) => println!("{report}\n"),
                None => println!(
                    "Rebalance not due until {}\n",
                    engine.snapshot().await.metadata.next_rebalance
                ),
            }
            println!("{}", engine.leaderboard().await);
        }
        Commands::AddPrediction {
            advisor,
            text,
            prediction_type,
            asset,
            direction,
            confidence,
            price,
            metadata,
        } => {
            let mut request = PredictionRequest::new(
                advisor,
                text,
                PredictionType::from_str(&prediction_type)?,
                asset,
                Direction::from_str(&direction)?,
                parse_decimal("confidence", &confidence)?,
            );
            if let Some(price) = price {
                request = request.with_price(parse_decimal("price", &price)?);
            }
            if let Some(raw) = metadata {
                let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
                    ScoringError::InvalidInput(format!("metadata is not valid JSON: {e}"))
                })?;
                request = request.with_metadata(value);
            }
            let id = engine.add_prediction(request, Utc::now()).await?;
            println!("{id}");
        }
        Commands::Evaluate {
            prediction_id,
            verdict,
            notes,
            price,
        } => {
            let mut evaluation = if verdict {
                Evaluation::correct()
            } else {
                Evaluation::incorrect()
            };
            if let Some(notes) = notes {
                evaluation = evaluation.with_notes(notes);
            }
            if let Some(price) = price {
                evaluation = evaluation.with_price(parse_decimal("price", &price)?);
            }

            match engine
                .evaluate_prediction(&prediction_id, evaluation, Utc::now())
                .await?
            {
                EvaluationOutcome::Evaluated(summary) => println!(
                    "Evaluated {} as {} ({} now {:.1}% over {} predictions)\n",
                    summary.prediction_id,
                    if summary.was_correct { "correct" } else { "incorrect" },
                    summary.advisor,
                    summary.accuracy_rate * Decimal::ONE_HUNDRED,
                    summary.total_predictions
                ),
                EvaluationOutcome::AlreadyEvaluated { prediction_id, .. } => {
                    println!("Prediction {prediction_id} was already evaluated\n")
                }
                EvaluationOutcome::Skipped {
                    prediction_id,
                    advisor,
                } => println!(
                    "Prediction {prediction_id} belongs to human advisor {advisor}; not scored\n"
                ),
            }
            println!("{}", engine.leaderboard().await);
        }
        Commands::Stats { advisor } => {
            println!("{}", engine.advisor_stats(&advisor).await?);
        }
        Commands::Reports => {
            let reports = engine.reports().await;
            if reports.is_empty() {
                println!("No rebalances recorded");
            }
            for report in reports {
                println!("{report}\n");
            }
        }
        Commands::Serve => serve(engine, config).await?,
    }
    Ok(())
}

fn print_pending(pending: &[PendingEvaluation]) {
    if pending.is_empty() {
        println!("No predictions awaiting evaluation");
        return;
    }
    println!("=== Pending Evaluations ({}) ===", pending.len());
    for p in pending {
        println!(
            "{}  {:<20} {:<16} {:<8} {:<15} conf {:.2}  due {} ({}d overdue)\n    {}",
            p.prediction_id,
            p.advisor,
            p.prediction_type.as_str(),
            p.asset,
            p.direction.as_str(),
            p.confidence,
            p.date_evaluate.format("%Y-%m-%d"),
            p.days_overdue,
            p.prediction
        );
    }
}

/// Run the dashboard and check the rebalance schedule until interrupted.
async fn serve(engine: Engine, config: &AppConfig) -> Result<(), ScoringError> {
    let engine = Arc::new(engine);
    let handle = dashboard::spawn_dashboard(
        DashboardState::new(engine.clone()),
        &config.dashboard.bind,
        config.dashboard.port,
    );
    let interval = std::time::Duration::from_secs(config.scheduler.check_interval_seconds);

    tracing::info!(
        interval_s = config.scheduler.check_interval_seconds,
        "Rebalance scheduler started"
    );

    loop {
        match engine.rebalance_if_due(Utc::now()).await {
            Ok(Some(report)) => tracing::info!(
                advisors_changed = report.advisors_changed(),
                next_rebalance = %report.next_rebalance,
                "Scheduled rebalance applied"
            ),
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "Scheduled rebalance failed"),
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}
