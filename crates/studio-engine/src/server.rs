//! Mock generation endpoint served over HTTP.
//!
//! Routes:
//! - `POST /api/generate`: delayed echo of the submitted image, or an overload error
//! - `GET /health`: liveness probe

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use studio_contracts::generation::{ErrorBody, GenerateBody, GENERATE_PATH, OVERLOADED_MESSAGE};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mock::{MockGenerationService, MockOutcome};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn router(service: Arc<MockGenerationService>) -> Router {
    Router::new()
        .route(GENERATE_PATH, post(generate))
        .route("/health", get(health))
        .with_state(service)
}

/// Binds `config` and serves until `shutdown` is cancelled.
pub async fn serve(
    config: &ServerConfig,
    service: Arc<MockGenerationService>,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind mock endpoint to {addr}"))?;
    serve_on(listener, service, shutdown).await
}

pub async fn serve_on(
    listener: TcpListener,
    service: Arc<MockGenerationService>,
    shutdown: CancellationToken,
) -> Result<()> {
    let local = listener
        .local_addr()
        .context("mock endpoint listener has no local address")?;
    info!(addr = %local, path = GENERATE_PATH, "mock endpoint listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("mock endpoint server error")?;
    info!(addr = %local, "mock endpoint stopped");
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn generate(State(service): State<Arc<MockGenerationService>>, body: Bytes) -> Response {
    let body: GenerateBody = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "unparsable generate body");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };
    let request = match body.into_request() {
        Ok(request) => request,
        Err(err) => {
            debug!(error = %err, "rejected generate body");
            return error_response(StatusCode::BAD_REQUEST, err.to_string());
        }
    };

    match service.respond(&request).await {
        MockOutcome::Generated(result) => {
            info!(id = %result.id, style = %result.style, "mock generation succeeded");
            (StatusCode::OK, Json(result)).into_response()
        }
        MockOutcome::Overloaded => {
            info!(style = %request.style, "mock generation overloaded");
            error_response(StatusCode::TOO_MANY_REQUESTS, OVERLOADED_MESSAGE)
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}
