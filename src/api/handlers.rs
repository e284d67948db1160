use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::StatusCode,
};
use tracing::{info, info_span, warn, Instrument};
use utoipa::OpenApi;
use uuid::Uuid;

use super::errors::AppError;
use crate::powermetrics::{
    decode::{self, DecodeError},
    model::{PowerMetrics, Task},
    service::PowerMetricsService,
};

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Ingest one powermetrics report.
///
/// The body is decoded strictly (unknown fields and trailing data are
/// rejected), validated, and written as one `total_consumption` row plus
/// one `task_consumption` row per task.
#[utoipa::path(
    post,
    path = "/powermetrics",
    request_body(content = PowerMetrics, content_type = "application/json"),
    responses(
        (status = 201, description = "Report stored"),
        (status = 400, description = "Malformed body, failed validation, or duplicate (pc_id, start_time)", body = String),
        (status = 413, description = "Body larger than 1MB", body = String),
        (status = 500, description = "Internal server error"),
    ),
    tag = "powermetrics"
)]
pub async fn post_powermetrics(
    State(service): State<PowerMetricsService>,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, AppError> {
    let span = info_span!("ingest", request_id = %Uuid::new_v4());
    ingest_body(&service, body).instrument(span).await
}

async fn ingest_body(
    service: &PowerMetricsService,
    body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, AppError> {
    let body = body.map_err(rejection_to_decode_error)?;
    let payload = decode::decode(&body)?;
    service.validate(&payload)?;
    service.ingest(&payload).await?;

    match serde_json::to_string_pretty(&payload) {
        Ok(pretty) => info!("Decoded and validated powermetrics payload:\n{pretty}"),
        Err(e) => warn!(error = %e, "Failed to pretty-print powermetrics payload"),
    }

    Ok(StatusCode::CREATED)
}

fn rejection_to_decode_error(rejection: BytesRejection) -> DecodeError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DecodeError::PayloadTooLarge
    } else {
        DecodeError::Internal(rejection.body_text())
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(post_powermetrics, health),
    components(schemas(PowerMetrics, Task)),
    tags(
        (name = "powermetrics", description = "Power consumption ingestion"),
        (name = "system",       description = "System endpoints"),
    ),
    info(
        title = "Powermetrics Ingestion API",
        version = "0.1.0",
        description = "Accepts powermetrics reports and stores them exactly once"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
