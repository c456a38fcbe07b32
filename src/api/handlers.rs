use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use tracing::warn;
use utoipa::OpenApi;

use super::{
    dto::{CommandResponse, ControlEventDto, HistoryParams, SensorReadingDto},
    errors::AppError,
    AppState,
};
use crate::{
    control::models::{ActuatorCommand, ActuatorState, Switch},
    db::history::{HistoryQuery, SortField, SortOrder},
};

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Latest sensor reading.
///
/// Served from the store when it is reachable and has at least one row;
/// otherwise from the in-memory cache. Never fails.
#[utoipa::path(
    get,
    path = "/api/sensors",
    responses(
        (status = 200, description = "Most recent reading", body = SensorReadingDto),
    ),
    tag = "sensors"
)]
pub async fn get_latest_reading(State(state): State<AppState>) -> Json<SensorReadingDto> {
    match state.store.latest_reading().await {
        Ok(Some(row)) => return Json(row.into()),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Latest reading query failed; serving cached value"),
    }
    Json(state.cache.latest_reading().await.into())
}

/// Stored readings, sorted and optionally filtered by a substring search.
///
/// Out-of-whitelist `sortField`, `order` and `searchField` values are replaced
/// with their defaults. No row limit is applied.
#[utoipa::path(
    get,
    path = "/api/sensors/history",
    params(
        ("sortField"   = Option<String>, Query, description = "id | temperature | humidity | light | timestamp (default id)"),
        ("order"       = Option<String>, Query, description = "asc | desc, case-insensitive (default desc)"),
        ("searchField" = Option<String>, Query, description = "all or one of the sort fields (default all)"),
        ("searchQuery" = Option<String>, Query, description = "Case-insensitive substring; empty disables filtering"),
    ),
    responses(
        (status = 200, description = "Matching readings", body = Vec<SensorReadingDto>),
        (status = 500, description = "Store unavailable"),
    ),
    tag = "sensors"
)]
pub async fn get_reading_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<SensorReadingDto>>, AppError> {
    let query = HistoryQuery::resolve(
        params.sort_field.as_deref(),
        params.order.as_deref(),
        params.search_field.as_deref(),
        params.search_query.as_deref(),
    );

    let rows = state.store.reading_history(&query).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

/// Current actuator state as last commanded.
#[utoipa::path(
    get,
    path = "/api/led",
    responses(
        (status = 200, description = "Cached actuator state", body = ActuatorState),
    ),
    tag = "actuators"
)]
pub async fn get_actuator_state(State(state): State<AppState>) -> Json<ActuatorState> {
    Json(state.control.state().await)
}

/// Publish a new actuator state.
///
/// Each channel must be exactly `"ON"` or `"OFF"`; one bad value rejects the
/// whole request before anything is published.
#[utoipa::path(
    post,
    path = "/api/led",
    request_body = ActuatorCommand,
    responses(
        (status = 200, description = "Command published", body = CommandResponse),
        (status = 400, description = "Invalid channel value or body"),
        (status = 502, description = "Broker unavailable"),
    ),
    tag = "actuators"
)]
pub async fn post_actuator_command(
    State(state): State<AppState>,
    payload: Result<Json<ActuatorCommand>, JsonRejection>,
) -> Result<Json<CommandResponse>, AppError> {
    let Json(command) = payload?;
    let applied = state.control.apply(&command).await?;

    Ok(Json(CommandResponse {
        message: "Actuator command sent".to_owned(),
        state: applied,
    }))
}

/// Most recent control events, newest first.
#[utoipa::path(
    get,
    path = "/api/led/history",
    responses(
        (status = 200, description = "Control events", body = Vec<ControlEventDto>),
        (status = 500, description = "Store unavailable"),
    ),
    tag = "actuators"
)]
pub async fn get_control_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<ControlEventDto>>, AppError> {
    let rows = state.store.control_history(state.control_history_limit).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
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
    paths(
        get_latest_reading,
        get_reading_history,
        get_actuator_state,
        post_actuator_command,
        get_control_history,
        health
    ),
    components(schemas(
        SensorReadingDto,
        ControlEventDto,
        CommandResponse,
        ActuatorCommand,
        ActuatorState,
        Switch,
        SortField,
        SortOrder
    )),
    tags(
        (name = "sensors",   description = "Sensor reading endpoints"),
        (name = "actuators", description = "Actuator control endpoints"),
        (name = "system",    description = "System endpoints"),
    ),
    info(
        title = "Telemetry Relay API",
        version = "0.1.0",
        description = "REST API for IoT sensor telemetry and actuator control"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
