//! Embedded display endpoints

use std::sync::Arc;
use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
};
use futures::stream::{self, Stream};
use tracing::info;

use crate::{display::DisplayFrame, state::AppState};
use super::responses::ApiError;

/// Handle GET /display - Latest rendered frame
pub async fn display_handler(State(state): State<Arc<AppState>>) -> Result<Json<DisplayFrame>, ApiError> {
    if !state.display_enabled {
        return Err(ApiError::DisplayDisabled);
    }
    Ok(Json(state.display_frame()))
}

/// Handle GET /display/events - Frame stream, current frame first
pub async fn display_events_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    if !state.display_enabled {
        return Err(ApiError::DisplayDisabled);
    }
    info!("Display event stream opened");

    let frames = stream::unfold((state.subscribe_frames(), true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let event = {
            let frame = rx.borrow_and_update();
            Event::default().event("frame").json_data(&*frame)
        };
        Some((event, (rx, false)))
    });

    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}
