//! Read-only JSON API over the scoring engine.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::db::Repository;
use crate::engine::ScoringEngine;

pub type SharedEngine = Arc<ScoringEngine<Box<dyn Repository>>>;

/// Shared state accessible by all dashboard route handlers.
#[derive(Clone)]
pub struct DashboardState {
    engine: SharedEngine,
}

impl DashboardState {
    pub fn new(engine: SharedEngine) -> Self {
        Self { engine }
    }
}

pub fn router(state: DashboardState) -> Router {
    Router::new()
        .route("/api/leaderboard", get(leaderboard_handler))
        .route("/api/pending", get(pending_handler))
        .route("/api/advisors/{name}", get(advisor_handler))
        .route("/api/reports", get(reports_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Spawn the dashboard HTTP server. Returns a handle that can be aborted.
pub fn spawn_dashboard(state: DashboardState, bind: &str, port: u16) -> JoinHandle<()> {
    let addr = format!("{bind}:{port}");

    tokio::spawn(async move {
        let app = router(state);

        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(l) => {
                info!(addr = %addr, "Dashboard server listening");
                l
            }
            Err(e) => {
                warn!(error = %e, addr = %addr, "Failed to bind dashboard server");
                return;
            }
        };

        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "Dashboard server error");
        }
    })
}

// -- Route Handlers --

async fn leaderboard_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let board = state.engine.leaderboard().await;
    Json(serde_json::to_value(&board).unwrap_or_default())
}

async fn pending_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let pending = state.engine.pending_evaluations(Utc::now()).await;
    Json(serde_json::to_value(&pending).unwrap_or_default())
}

async fn advisor_handler(
    State(state): State<DashboardState>,
    Path(name): Path<String>,
) -> Response {
    match state.engine.advisor_stats(&name).await {
        Ok(stats) => Json(serde_json::to_value(&stats).unwrap_or_default()).into_response(),
        Err(e) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response(),
    }
}

async fn reports_handler(State(state): State<DashboardState>) -> impl IntoResponse {
    let reports = state.engine.reports().await;
    Json(serde_json::to_value(&reports).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisors::models::AdvisorRecord;
    use crate::db::snapshot::Snapshot;
    use crate::db::MemoryRepository;
    use crate::weights::policy::{EnginePolicy, WeightLimits};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn state() -> DashboardState {
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
        let snapshot = Snapshot::new(
            vec![
                AdvisorRecord::ai("Quant", dec!(12)),
                AdvisorRecord::human("Operator", dec!(30)),
            ],
            policy,
        );
        let repo: Box<dyn Repository> = Box::new(MemoryRepository::with_snapshot(snapshot.clone()));
        DashboardState::new(Arc::new(ScoringEngine::from_snapshot(repo, snapshot)))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_leaderboard_route() {
        let response = leaderboard_handler(State(state())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["entries"][0]["advisor"], "Operator");
        assert_eq!(json["entries"][1]["advisor"], "Quant");
    }

    #[tokio::test]
    async fn test_unknown_advisor_route_is_404() {
        let response = advisor_handler(State(state()), Path("Ghost".to_string())).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert!(json["error"].as_str().unwrap().contains("Ghost"));
    }

    #[tokio::test]
    async fn test_reports_route_empty() {
        let response = reports_handler(State(state())).await.into_response();
        let json = body_json(response).await;
        assert!(json.as_array().unwrap().is_empty());
    }
}
