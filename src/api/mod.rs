pub mod errors;
pub mod handlers;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::powermetrics::{decode::MAX_BODY_BYTES, service::PowerMetricsService};
use handlers::ApiDoc;

pub fn router(service: PowerMetricsService) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route(
            "/powermetrics",
            post(handlers::post_powermetrics).layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(service)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
