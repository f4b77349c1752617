use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequest, Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tower_http::services::ServeDir;

use crate::config::Config;
use crate::error::ApiError;
use crate::handler::GenerateService;
use crate::llm::GeminiClient;
use crate::models::{ErrorBody, GenerateRequest, GenerateResponse};
use crate::telemetry;

/** \brief Largest accepted request body; inline attachments travel base64-encoded. */
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/**
 * \brief Wire the Gemini client and model table described by `config`.
 */
pub fn build_service(config: &Config) -> Result<GenerateService> {
    config.report_missing_credential();
    let registry = config.load_registry()?;
    let client = GeminiClient::new(&config.api_base, config.api_key.clone());
    telemetry::log_event(
        "server.config",
        &format!(
            "api_base={} models={}",
            client.api_base(),
            registry.keys().join(",")
        ),
    );
    Ok(GenerateService::new(Arc::new(registry), Arc::new(client)))
}

/**
 * \brief API routes plus the static front-end as fallback.
 */
pub fn router(service: GenerateService, ui_dir: &Path) -> Router {
    let static_service = ServeDir::new(ui_dir).append_index_html_on_directories(true);

    Router::new()
        .route("/api/generate", any(generate))
        .route("/api/models", get(list_models))
        .route("/api/health", get(health_check))
        .fallback_service(static_service)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(service)
}

/**
 * \brief Bind `addr` and serve until the process exits.
 * \param addr listen address, e.g. "127.0.0.1:3000"
 */
pub async fn run(addr: &str, service: GenerateService, ui_dir: &Path) -> Result<()> {
    let app = router(service, ui_dir);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {} failed", addr))?;
    telemetry::log_event("server", &format!("listening on http://{}", addr));
    axum::serve(listener, app).await?;
    Ok(())
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/**
 * \brief `/api/generate`: POST only; every other verb gets 405 before the body is read.
 */
async fn generate(State(service): State<GenerateService>, request: Request) -> Response {
    match handle_generate(&service, request).await {
        Ok(resp) => (StatusCode::OK, Json(resp)).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn handle_generate(
    service: &GenerateService,
    request: Request,
) -> Result<GenerateResponse, ApiError> {
    if *request.method() != Method::POST {
        return Err(ApiError::MethodNotAllowed);
    }
    let body = Bytes::from_request(request, &()).await.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(MAX_BODY_BYTES)
        } else {
            ApiError::MalformedBody(rejection.body_text())
        }
    })?;
    let request: GenerateRequest =
        serde_json::from_slice(&body).map_err(|e| ApiError::MalformedBody(e.to_string()))?;
    service.generate(request).await
}

async fn list_models(State(service): State<GenerateService>) -> Json<serde_json::Value> {
    let registry = service.registry();
    let models: Vec<_> = registry
        .entries()
        .iter()
        .map(|e| {
            json!({
                "key": e.key,
                "upstreamModel": e.upstream_model,
                "supportsInlineData": e.supports_inline_data,
            })
        })
        .collect();
    Json(json!({
        "models": models,
        "default": registry.default_entry().key,
    }))
}

async fn health_check(State(service): State<GenerateService>) -> Json<serde_json::Value> {
    Json(json!({
        "ok": true,
        "apiKeyConfigured": service.backend().is_configured(),
        "models": service.registry().entries().len(),
    }))
}
