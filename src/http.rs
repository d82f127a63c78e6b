//! HTTP transport for wellbeing-report
//!
//! Axum router exposing the suggestions and report endpoints. Health and info
//! are plain JSON/text. Error bodies are always `{"error": "..."}`.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::{ReportError, Result};
use crate::orchestrator::{Orchestrator, ReportRequest, SuggestionsRequest};

/// Shared state for HTTP server
#[derive(Clone)]
pub struct HttpState {
    pub config: Arc<Config>,
    pub orchestrator: Orchestrator,
}

/// A route-scoped error: client errors keep their message, server errors are
/// reported with the route's generic failure text.
struct ApiError {
    err: ReportError,
    failure: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.err.status_code();
        let message = if self.err.is_client_error() {
            self.err.to_string()
        } else {
            self.failure.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn rejection_error(rejection: JsonRejection) -> ReportError {
    ReportError::invalid_request(rejection.body_text())
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    "ok"
}

/// Info endpoint
pub async fn info_handler(State(state): State<HttpState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json!({
            "generation": {
                "model": state.orchestrator.generator().model(),
                "api_key_configured": state.config.runtime.gemini_api_key.is_some(),
            },
            "storage": {
                "backend": state.orchestrator.store().backend(),
                "ns": state.config.storage.database_ns,
                "db": state.config.storage.database_db,
            },
            "server": {
                "bind": state.config.runtime.http_bind.to_string(),
                "request_timeout_ms": state.config.runtime.request_timeout_ms,
            }
        })
        .to_string(),
    )
}

/// POST /api/suggestions
async fn suggestions_handler(
    State(state): State<HttpState>,
    payload: std::result::Result<Json<SuggestionsRequest>, JsonRejection>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    const FAILURE: &str = "Failed to generate suggestions";
    let Json(req) = payload.map_err(|r| ApiError {
        err: rejection_error(r),
        failure: FAILURE,
    })?;
    let resp = state
        .orchestrator
        .generate_suggestions(req)
        .await
        .map_err(|err| ApiError {
            err,
            failure: FAILURE,
        })?;
    Ok(Json(resp))
}

/// POST /api/report
async fn report_handler(
    State(state): State<HttpState>,
    payload: std::result::Result<Json<ReportRequest>, JsonRejection>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    const FAILURE: &str = "Failed to generate report";
    let Json(req) = payload.map_err(|r| ApiError {
        err: rejection_error(r),
        failure: FAILURE,
    })?;
    let resp = state
        .orchestrator
        .generate_report(req)
        .await
        .map_err(|err| ApiError {
            err,
            failure: FAILURE,
        })?;
    Ok(Json(resp))
}

/// Build the application router
pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/info", get(info_handler))
        .route("/api/suggestions", post(suggestions_handler))
        .route("/api/report", post(report_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_http_server(state: HttpState) -> Result<()> {
    let bind = state.config.runtime.http_bind;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .map_err(|e| ReportError::Internal {
            message: format!("Failed to bind HTTP listener on {}: {}", bind, e),
        })?;

    tracing::info!("Starting HTTP server on {}", bind);

    axum::serve(listener, app)
        .await
        .map_err(|e| ReportError::Internal {
            message: format!("HTTP server error: {}", e),
        })?;

    Ok(())
}
