pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::{control::ControlService, db::Store, state_cache::StateCache};

/// Shared by every handler. All fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: StateCache,
    pub control: ControlService,
    /// Rows returned by `GET /api/led/history`.
    pub control_history_limit: i64,
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/api/sensors", get(handlers::get_latest_reading))
        .route("/api/sensors/history", get(handlers::get_reading_history))
        .route(
            "/api/led",
            get(handlers::get_actuator_state).post(handlers::post_actuator_command),
        )
        .route("/api/led/history", get(handlers::get_control_history))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        // The dashboard is served from a different origin.
        .layer(CorsLayer::permissive())
}
