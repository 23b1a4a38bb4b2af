//! Frame Solver HTTP Server

use axum::{
    extract::Json,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};

use frame_solver::prelude::*;

const DEFAULT_PORT: u16 = 8086;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    model: StructuralModel,
    #[serde(default)]
    request: AnalysisRequest,
}

#[derive(Debug, Serialize)]
struct AnalyzeResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Individual validation issues when the model was rejected
    #[serde(skip_serializing_if = "Vec::is_empty")]
    issues: Vec<ValidationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<AnalysisReport>,
}

impl AnalyzeResponse {
    fn failure(error: String, issues: Vec<ValidationError>) -> Self {
        Self {
            success: false,
            error: Some(error),
            issues,
            results: None,
        }
    }
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn analyze(Json(body): Json<AnalyzeRequest>) -> impl IntoResponse {
    // Analysis is CPU bound; keep it off the async workers
    let outcome = tokio::task::spawn_blocking(move || body.model.analyze(&body.request)).await;

    match outcome {
        Ok(Ok(report)) => (
            StatusCode::OK,
            Json(AnalyzeResponse {
                success: true,
                error: None,
                issues: Vec::new(),
                results: Some(report),
            }),
        ),
        Ok(Err(e)) => {
            log::warn!("Analysis rejected: {}", e);
            let issues = e.validation_issues().map(<[_]>::to_vec).unwrap_or_default();
            (StatusCode::BAD_REQUEST, Json(AnalyzeResponse::failure(e.to_string(), issues)))
        }
        Err(e) => {
            log::error!("Analysis task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(AnalyzeResponse::failure(e.to_string(), Vec::new())),
            )
        }
    }
}

fn port() -> u16 {
    std::env::var("FRAME_SOLVER_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/v1/analyze", post(analyze))
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], port()));
    println!("Frame Solver Server listening on http://{}", addr);
    println!("  Health check: GET  /health");
    println!("  Analysis:     POST /api/v1/analyze");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
