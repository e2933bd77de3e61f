//! HTTP endpoint handlers for the controller surface

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{
    overlay::board::DEFAULT_HIDE_AFTER,
    state::{AppState, Field},
    sync::DisplaySettings,
    timer::{format::parse_duration, TimerId, TimerUpdate, TimerVariant},
};
use super::responses::{
    ApiError, ApiResponse, HealthResponse, MessagesView, StatusResponse, TimersView,
};

type TimersResult = Result<Json<ApiResponse<TimersView>>, ApiError>;
type MessagesResult = Result<Json<ApiResponse<MessagesView>>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTimerRequest {
    pub name: String,
    /// Seconds
    pub duration: Option<f64>,
    /// `90`, `MM:SS` or `HH:MM:SS`
    pub duration_text: Option<String>,
    #[serde(default = "default_variant")]
    pub variant: TimerVariant,
    pub scheduled_start_time: Option<String>,
}

fn default_variant() -> TimerVariant {
    TimerVariant::Countdown
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationRequest {
    pub seconds: Option<f64>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustRequest {
    pub delta_seconds: f64,
}

#[derive(Debug, Deserialize)]
pub struct TypeRequest {
    pub variant: TimerVariant,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub order: Vec<TimerId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowMessageRequest {
    pub text: String,
    #[serde(default)]
    pub auto_hide: bool,
    pub hide_after: Option<f64>,
}

fn resolve_duration(seconds: Option<f64>, text: Option<&str>) -> Result<f64, ApiError> {
    match (seconds, text) {
        (Some(seconds), _) => Ok(seconds),
        (None, Some(text)) => Ok(parse_duration(text)?),
        (None, None) => Err(ApiError::BadRequest(
            "Either a duration in seconds or a duration text is required".to_string(),
        )),
    }
}

async fn timers_response(state: &AppState, message: String) -> Json<ApiResponse<TimersView>> {
    let (timers, preview) = state.timers_view().await;
    Json(ApiResponse::ok(message, TimersView { timers, preview }))
}

/// Handle GET /timers
pub async fn list_timers_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse<TimersView>> {
    timers_response(&state, "Timers".to_string()).await
}

/// Handle POST /timers
pub async fn add_timer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddTimerRequest>,
) -> TimersResult {
    let duration = resolve_duration(request.duration, request.duration_text.as_deref())?;
    state
        .run_command("add_timer", &[Field::Timers], |c, _| {
            c.add_timer(
                &request.name,
                duration,
                request.variant,
                request.scheduled_start_time.as_deref(),
            )
        })
        .await?;
    info!(name = %request.name, duration, "Timer added");
    Ok(timers_response(&state, format!("Timer '{}' added", request.name.trim())).await)
}

/// Handle DELETE /timers/:id
pub async fn delete_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> TimersResult {
    state
        .run_command("delete_timer", &[Field::Timers], |c, _| c.delete_timer(id))
        .await?;
    Ok(timers_response(&state, "Timer deleted".to_string()).await)
}

/// Handle PATCH /timers/:id
pub async fn update_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
    Json(update): Json<TimerUpdate>,
) -> TimersResult {
    state
        .run_command("update_timer", &[Field::Timers], |c, now| c.update_timer(id, update, now))
        .await?;
    Ok(timers_response(&state, "Timer updated".to_string()).await)
}

/// Handle POST /timers/:id/select
pub async fn select_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> TimersResult {
    state
        .run_command("select_timer", &[Field::Timers], |c, _| c.select_timer(id))
        .await?;
    Ok(timers_response(&state, "Timer selected".to_string()).await)
}

/// Handle POST /timers/:id/start
pub async fn start_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> TimersResult {
    state
        .run_command("start_timer", &[Field::Timers], |c, now| c.start_timer(id, now))
        .await?;
    info!(timer_id = %id, "Start endpoint called");
    Ok(timers_response(&state, "Timer started".to_string()).await)
}

/// Handle POST /timers/:id/pause
pub async fn pause_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> TimersResult {
    state
        .run_command("pause_timer", &[Field::Timers], |c, now| c.pause_timer(id, now))
        .await?;
    info!(timer_id = %id, "Pause endpoint called");
    Ok(timers_response(&state, "Timer paused".to_string()).await)
}

/// Handle POST /timers/:id/reset
pub async fn reset_timer_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
) -> TimersResult {
    state
        .run_command("reset_timer", &[Field::Timers], |c, _| c.reset_timer(id))
        .await?;
    Ok(timers_response(&state, "Timer reset".to_string()).await)
}

/// Handle POST /timers/:id/adjust
pub async fn adjust_time_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
    Json(request): Json<AdjustRequest>,
) -> TimersResult {
    state
        .run_command("adjust_time", &[Field::Timers], |c, now| {
            c.adjust_time(id, request.delta_seconds, now)
        })
        .await?;
    Ok(timers_response(&state, format!("Timer adjusted by {}s", request.delta_seconds)).await)
}

/// Handle PUT /timers/:id/duration
pub async fn update_duration_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
    Json(request): Json<DurationRequest>,
) -> TimersResult {
    let seconds = resolve_duration(request.seconds, request.text.as_deref())?;
    state
        .run_command("update_timer_duration", &[Field::Timers], |c, now| {
            c.update_timer_duration(id, seconds, now)
        })
        .await?;
    Ok(timers_response(&state, "Duration updated".to_string()).await)
}

/// Handle PUT /timers/:id/type
pub async fn update_type_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<TimerId>,
    Json(request): Json<TypeRequest>,
) -> TimersResult {
    state
        .run_command("update_timer_type", &[Field::Timers], |c, _| {
            c.update_timer_type(id, request.variant)
        })
        .await?;
    Ok(timers_response(&state, "Timer type updated".to_string()).await)
}

/// Handle PUT /timers/order
pub async fn reorder_timers_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReorderRequest>,
) -> TimersResult {
    state
        .run_command("reorder_timers", &[Field::Timers], |c, _| c.reorder_timers(&request.order))
        .await?;
    Ok(timers_response(&state, "Timers reordered".to_string()).await)
}

/// Handle GET /messages
pub async fn list_messages_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse<MessagesView>> {
    let view = state.with_controller(|c| MessagesView::from(c.messages())).await;
    Json(ApiResponse::ok("Messages", view))
}

/// Handle POST /messages
pub async fn show_message_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ShowMessageRequest>,
) -> MessagesResult {
    let hide_after = request.hide_after.unwrap_or(DEFAULT_HIDE_AFTER);
    let view = state
        .run_command("show_message", &[Field::Messages], |c, now| {
            c.show_message(&request.text, request.auto_hide, hide_after, now)?;
            Ok(MessagesView::from(c.messages()))
        })
        .await?;
    Ok(Json(ApiResponse::ok("Message shown", view)))
}

/// Handle POST /messages/preset/:index
pub async fn show_preset_handler(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> MessagesResult {
    let view = state
        .run_command("show_preset_message", &[Field::Messages], |c, now| {
            c.show_preset_message(index, now)?;
            Ok(MessagesView::from(c.messages()))
        })
        .await?;
    Ok(Json(ApiResponse::ok(format!("Preset {} shown", index), view)))
}

/// Handle DELETE /messages/current
pub async fn clear_message_handler(State(state): State<Arc<AppState>>) -> MessagesResult {
    let view = state
        .run_command("clear_message", &[Field::Messages], |c, now| {
            c.clear_message(now);
            Ok(MessagesView::from(c.messages()))
        })
        .await?;
    Ok(Json(ApiResponse::ok("Message cleared", view)))
}

/// Handle DELETE /messages
pub async fn clear_all_messages_handler(State(state): State<Arc<AppState>>) -> MessagesResult {
    let view = state
        .run_command("clear_all_messages", &[Field::Messages], |c, _| {
            c.clear_all_messages();
            Ok(MessagesView::from(c.messages()))
        })
        .await?;
    Ok(Json(ApiResponse::ok("All messages cleared", view)))
}

/// Handle POST /blackout
pub async fn toggle_blackout_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    let enabled = state
        .run_command("toggle_blackout", &[Field::Blackout], |c, _| Ok(c.toggle_blackout()))
        .await?;
    let message = if enabled { "Blackout enabled" } else { "Blackout disabled" };
    Ok(Json(ApiResponse::ok(message, enabled)))
}

/// Handle POST /flash
pub async fn toggle_flash_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<bool>>, ApiError> {
    let enabled = state
        .run_command("toggle_flash", &[Field::Flash], |c, _| Ok(c.toggle_flash()))
        .await?;
    let message = if enabled { "Flash enabled" } else { "Flash disabled" };
    Ok(Json(ApiResponse::ok(message, enabled)))
}

/// Handle GET /settings
pub async fn get_settings_handler(State(state): State<Arc<AppState>>) -> Json<ApiResponse<DisplaySettings>> {
    let settings = state.snapshot().await.settings;
    Json(ApiResponse::ok("Display settings", settings))
}

/// Handle PUT /settings
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    Json(settings): Json<DisplaySettings>,
) -> Result<Json<ApiResponse<DisplaySettings>>, ApiError> {
    let settings = state
        .run_command("update_settings", &[Field::Settings], |c, _| c.update_settings(settings))
        .await?;
    Ok(Json(ApiResponse::ok("Display settings updated", settings)))
}

/// Handle GET /status - Server and channel diagnostics
pub async fn status_handler(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.snapshot().await;
    let (last_action, last_action_time) = state.get_last_action();

    Json(StatusResponse {
        connection: state.channel.status(),
        origin: state.channel.origin(),
        document_path: state.channel.path().to_string(),
        faults: state.channel.faults(),
        timer_count: snapshot.timers.timers.len(),
        active_timer_id: snapshot.timers.active_timer_id,
        running_timers: snapshot.timers.running_count(),
        display_enabled: state.display_enabled,
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    })
}

/// Handle GET /health - Health check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
