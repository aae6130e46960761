//! HTTP scoring endpoint.
//!
//! All state is loaded once at startup and shared read-only behind
//! `Arc`s; handlers never mutate the bundle.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::metrics::PipelineMetrics;
use crate::model::scorer::Scorer;
use crate::types::{Prediction, ScoreRequest};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub scorer: Arc<Scorer>,
    pub metrics: Arc<PipelineMetrics>,
}

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Classify one network flow.
async fn predict(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<Prediction>, (StatusCode, String)> {
    let start = Instant::now();

    match state.scorer.score(&request.features) {
        Ok(scored) => {
            state
                .metrics
                .record_scored(start.elapsed(), scored.prediction.confidence);
            if scored.defaulted > 0 {
                state
                    .metrics
                    .record_defaulted_features(scored.defaulted as u64);
            }
            Ok(Json(scored.prediction))
        }
        Err(e) => {
            state.metrics.record_failure();
            error!(error = %e, "Scoring failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("scoring failed: {e}"),
            ))
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    model_id: String,
    features: usize,
    timestamp: i64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        model_id: state.scorer.model_id(),
        features: state.scorer.feature_names().len(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::fit_scale;
    use crate::model::bundle::ModelBundle;
    use crate::model::forest::{ForestParams, RandomForest};
    use std::collections::HashMap;

    fn test_state() -> AppState {
        let matrix = vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]];
        let labels = vec!["BENIGN".to_string(), "DDoS".to_string(), "DDoS".to_string()];
        let (scaled, scaler) = fit_scale(&matrix);
        let params = ForestParams {
            n_trees: 10,
            ..ForestParams::default()
        };
        let forest = RandomForest::fit(&scaled, &labels, &params, 42).unwrap();
        let bundle = ModelBundle {
            forest,
            scaler,
            feature_names: vec!["a".to_string(), "b".to_string()],
            trained_at: "20260101-000000".to_string(),
        };
        AppState {
            scorer: Arc::new(Scorer::new(bundle)),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    #[tokio::test]
    async fn predict_returns_label_and_confidence() {
        let state = test_state();
        let mut features = HashMap::new();
        features.insert("a".to_string(), 2.0);
        features.insert("b".to_string(), 20.0);

        let Json(prediction) = predict(State(state.clone()), Json(ScoreRequest { features }))
            .await
            .unwrap();

        assert!(["BENIGN", "DDoS"].contains(&prediction.prediction.as_str()));
        assert!((0.0..=1.0).contains(&prediction.confidence));
        assert_eq!(
            state
                .metrics
                .flows_scored
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn predict_tolerates_empty_feature_map() {
        let state = test_state();
        let response = predict(
            State(state.clone()),
            Json(ScoreRequest {
                features: HashMap::new(),
            }),
        )
        .await;

        assert!(response.is_ok());
        assert_eq!(
            state
                .metrics
                .features_defaulted
                .load(std::sync::atomic::Ordering::Relaxed),
            2
        );
    }

    #[tokio::test]
    async fn health_reports_the_loaded_model() {
        let state = test_state();
        let Json(health) = health(State(state)).await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.model_id, "rf-20260101-000000");
        assert_eq!(health.features, 2);
    }
}
