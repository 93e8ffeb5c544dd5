use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::application::commands::{
    add_cycle_item_impl, delete_cycle_item_impl, get_settings_impl, get_timer_impl,
    reorder_cycle_items_impl, timer_action_impl, toggle_cycle_item_impl, update_settings_impl,
    update_timer_settings_impl,
};
use crate::domain::models::{
    DashboardSettings, NewCycleItem, SettingsPatch, TimerActionRequest, TimerSettingsUpdate,
    TimerSnapshot,
};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub order: Vec<String>,
}

pub async fn require_bearer(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> ApiResult<Response> {
    check_bearer(request.headers(), &state.api_token).inspect_err(|_| {
        warn!(path = %request.uri().path(), "rejected unauthorized request");
    })?;
    Ok(next.run(request).await)
}

fn check_bearer(headers: &HeaderMap, expected: &str) -> ApiResult<()> {
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if !token.is_empty() && tokens_match(token, expected) => Ok(()),
        Some(_) => Err(ApiError::Unauthorized("invalid bearer token".to_string())),
        None => Err(ApiError::Unauthorized("missing bearer token".to_string())),
    }
}

fn tokens_match(presented: &str, expected: &str) -> bool {
    let presented = presented.as_bytes();
    let expected = expected.as_bytes();
    let mut difference = presented.len() ^ expected.len();
    for (index, byte) in expected.iter().enumerate() {
        let other = presented.get(index).copied().unwrap_or(0);
        difference |= usize::from(byte ^ other);
    }
    difference == 0
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn get_settings(State(state): State<ApiState>) -> ApiResult<Json<DashboardSettings>> {
    Ok(Json(get_settings_impl(&state.app)?))
}

pub async fn update_settings(
    State(state): State<ApiState>,
    payload: Result<Json<SettingsPatch>, JsonRejection>,
) -> ApiResult<Json<DashboardSettings>> {
    let Json(patch) = payload?;
    Ok(Json(update_settings_impl(&state.app, patch)?))
}

pub async fn add_cycle_item(
    State(state): State<ApiState>,
    payload: Result<Json<NewCycleItem>, JsonRejection>,
) -> ApiResult<Json<DashboardSettings>> {
    let Json(new_item) = payload?;
    Ok(Json(add_cycle_item_impl(&state.app, new_item)?))
}

pub async fn toggle_cycle_item(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DashboardSettings>> {
    Ok(Json(toggle_cycle_item_impl(&state.app, &id)?))
}

pub async fn delete_cycle_item(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DashboardSettings>> {
    Ok(Json(delete_cycle_item_impl(&state.app, &id)?))
}

pub async fn reorder_cycle_items(
    State(state): State<ApiState>,
    payload: Result<Json<ReorderRequest>, JsonRejection>,
) -> ApiResult<Json<DashboardSettings>> {
    let Json(request) = payload?;
    Ok(Json(reorder_cycle_items_impl(&state.app, request.order)?))
}

pub async fn get_timer(State(state): State<ApiState>) -> ApiResult<Json<TimerSnapshot>> {
    Ok(Json(get_timer_impl(&state.app)?))
}

pub async fn timer_action(
    State(state): State<ApiState>,
    payload: Result<Json<TimerActionRequest>, JsonRejection>,
) -> ApiResult<Json<TimerSnapshot>> {
    let Json(request) = payload?;
    Ok(Json(timer_action_impl(&state.app, request.action)?))
}

pub async fn update_timer_settings(
    State(state): State<ApiState>,
    payload: Result<Json<TimerSettingsUpdate>, JsonRejection>,
) -> ApiResult<Json<TimerSnapshot>> {
    let Json(update) = payload?;
    Ok(Json(update_timer_settings_impl(&state.app, update)?))
}
