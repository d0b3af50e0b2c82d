//! HTTP shell
//!
//! `POST /analyze` with `{ "pair": "EURUSD" }` returns the snapshot and the
//! analysis prompt built from it.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::market_data::CandleSource;
use crate::pipeline::{Snapshot, SnapshotAssembler, SnapshotError};
use crate::prompt::build_analysis_prompt;

/// Envelope shared by every endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub pair: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub snapshot: Snapshot,
    pub prompt: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    source: &'static str,
    timeframes: Vec<String>,
}

/// Create the API router with all endpoints
pub fn create_router<S>(assembler: Arc<SnapshotAssembler<S>>) -> Router
where
    S: CandleSource + 'static,
{
    Router::new()
        .route("/analyze", post(analyze::<S>))
        .route("/api/health", get(health::<S>))
        .with_state(assembler)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

/// POST /analyze - Snapshot plus analysis prompt
async fn analyze<S: CandleSource + 'static>(
    State(assembler): State<Arc<SnapshotAssembler<S>>>,
    Json(req): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    let snapshot = match assembler.assemble(&req.pair).await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            let status = match e {
                SnapshotError::InvalidInstrument(_) => StatusCode::BAD_REQUEST,
                SnapshotError::SourceFetchFailed { .. } => StatusCode::BAD_GATEWAY,
                SnapshotError::Plan(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!(pair = %req.pair, error = %e, "Analyze request rejected");
            return (
                status,
                Json(ApiResponse::<AnalyzeResponse>::error(e.to_string())),
            );
        }
    };

    match build_analysis_prompt(&snapshot) {
        Ok(prompt) => (
            StatusCode::OK,
            Json(ApiResponse::success(AnalyzeResponse { snapshot, prompt })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render analysis prompt");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error("An error occurred. Please try again.")),
            )
        }
    }
}

/// GET /api/health - Liveness and configured timeframes
async fn health<S: CandleSource + 'static>(
    State(assembler): State<Arc<SnapshotAssembler<S>>>,
) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "ok",
        source: assembler.source().name(),
        timeframes: assembler
            .plan()
            .specs()
            .iter()
            .map(|s| s.label.clone())
            .collect(),
    }))
}

/// Bind and serve until shutdown
pub async fn start_server<S>(
    assembler: Arc<SnapshotAssembler<S>>,
    host: &str,
    port: u16,
) -> anyhow::Result<()>
where
    S: CandleSource + 'static,
{
    let app = create_router(assembler);
    let addr = format!("{}:{}", host, port);

    tracing::info!("🖥️ Snapshot API starting on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::FetchError;
    use crate::pipeline::{AssemblerOptions, TimeframePlan};
    use crate::types::{Candle, Instrument, Interval};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct Down;

    #[async_trait]
    impl CandleSource for Down {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn fetch(&self, _: &Instrument, _: Interval) -> Result<Vec<Candle>, FetchError> {
            Err(FetchError::Network("connection refused".into()))
        }
    }

    fn app() -> Router {
        create_router(Arc::new(SnapshotAssembler::new(
            Down,
            TimeframePlan::default(),
            AssemblerOptions::default(),
        )))
    }

    fn analyze_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_pair_is_bad_request() {
        let res = app().oneshot(analyze_request(r#"{"pair":"EU"}"#)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_isolated_failures_still_answer() {
        let res = app()
            .oneshot(analyze_request(r#"{"pair":"EURUSD"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health() {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
