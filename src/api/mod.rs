//! HTTP API module
//!
//! Controller commands, the hosted document and the embedded display, all
//! behind one router.

pub mod display;
pub mod document;
pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use display::*;
use document::*;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Controller
        .route("/timers", get(list_timers_handler).post(add_timer_handler))
        .route("/timers/order", put(reorder_timers_handler))
        .route("/timers/:id", delete(delete_timer_handler).patch(update_timer_handler))
        .route("/timers/:id/select", post(select_timer_handler))
        .route("/timers/:id/start", post(start_timer_handler))
        .route("/timers/:id/pause", post(pause_timer_handler))
        .route("/timers/:id/reset", post(reset_timer_handler))
        .route("/timers/:id/adjust", post(adjust_time_handler))
        .route("/timers/:id/duration", put(update_duration_handler))
        .route("/timers/:id/type", put(update_type_handler))
        .route(
            "/messages",
            get(list_messages_handler)
                .post(show_message_handler)
                .delete(clear_all_messages_handler),
        )
        .route("/messages/current", delete(clear_message_handler))
        .route("/messages/preset/:index", post(show_preset_handler))
        .route("/blackout", post(toggle_blackout_handler))
        .route("/flash", post(toggle_flash_handler))
        .route("/settings", get(get_settings_handler).put(update_settings_handler))
        // Hosted document
        .route("/auth/anonymous", post(sign_in_handler))
        .route(
            "/document",
            get(read_document_handler)
                .put(set_document_handler)
                .patch(merge_document_handler),
        )
        .route("/document/events", get(document_events_handler))
        // Embedded display
        .route("/display", get(display_handler))
        .route("/display/events", get(display_events_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use chrono::Utc;
    use serde_json::{json, Value};
    use tokio::sync::watch;
    use tower::ServiceExt;

    use crate::display::DisplayFrame;
    use crate::overlay::MessagePreset;
    use crate::sync::{ConnectionStatus, DocumentStore, DEFAULT_DOCUMENT_PATH};

    async fn test_app(display_enabled: bool) -> Router {
        let (_tx, rx) = watch::channel(DisplayFrame::waiting(ConnectionStatus::Disconnected, Utc::now()));
        let state = Arc::new(AppState::new(
            0,
            "127.0.0.1".into(),
            Arc::new(DocumentStore::new()),
            DEFAULT_DOCUMENT_PATH,
            vec![MessagePreset::new("Five minutes")],
            rx,
            display_enabled,
        ));
        state.bootstrap().await.unwrap();
        create_router(state)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(value) => {
                builder = builder.header("content-type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn add_timer(app: &Router, name: &str, duration: f64) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/timers",
            Some(json!({ "name": name, "duration": duration })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let timers = body["data"]["timers"]["timers"].as_array().unwrap();
        timers.last().unwrap()["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let app = test_app(false).await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_timer_lifecycle() {
        let app = test_app(false).await;
        let id = add_timer(&app, "Keynote", 600.0).await;

        let (status, body) = send(&app, Method::POST, &format!("/timers/{}/start", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["timers"]["timers"][0]["state"]["status"], "running");
        assert_eq!(body["data"]["timers"]["activeTimerId"], id.as_str());
        assert_eq!(body["data"]["preview"]["displayText"], "10:00");

        let (status, body) = send(&app, Method::POST, &format!("/timers/{}/pause", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["timers"]["timers"][0]["state"]["status"], "paused");

        let (status, body) = send(&app, Method::POST, &format!("/timers/{}/reset", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["timers"]["timers"][0]["state"]["status"], "idle");
        assert_eq!(body["data"]["timers"]["timers"][0]["state"]["currentTime"], 600.0);
    }

    #[tokio::test]
    async fn test_duration_text_and_adjust() {
        let app = test_app(false).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/timers",
            Some(json!({ "name": "Panel", "durationText": "05:00" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["timers"]["timers"][0]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["timers"]["timers"][0]["state"]["initialTime"], 300.0);

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/timers/{}/adjust", id),
            Some(json!({ "deltaSeconds": -30.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["timers"]["timers"][0]["state"]["currentTime"], 270.0);
    }

    #[tokio::test]
    async fn test_rejections_map_to_status_codes() {
        let app = test_app(false).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/timers",
            Some(json!({ "name": "Bad", "duration": -5.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) = send(
            &app,
            Method::POST,
            "/timers",
            Some(json!({ "name": "No duration" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = format!("/timers/{}/start", uuid::Uuid::new_v4());
        let (status, _) = send(&app, Method::POST, &missing, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::POST, "/messages/preset/7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reorder_route() {
        let app = test_app(false).await;
        let first = add_timer(&app, "One", 60.0).await;
        let second = add_timer(&app, "Two", 60.0).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/timers/order",
            Some(json!({ "order": [second, first] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let timers = body["data"]["timers"]["timers"].as_array().unwrap();
        let names: Vec<_> = timers
            .iter()
            .map(|t| (t["name"].as_str().unwrap(), t["order"].as_u64().unwrap()))
            .collect();
        assert!(names.contains(&("Two", 0)));
        assert!(names.contains(&("One", 1)));
    }

    #[tokio::test]
    async fn test_messages_queue_and_presets() {
        let app = test_app(false).await;
        send(&app, Method::POST, "/messages", Some(json!({ "text": "First" }))).await;
        let (_, body) = send(&app, Method::POST, "/messages/preset/0", None).await;
        assert_eq!(body["data"]["currentMessage"]["text"], "First");
        assert_eq!(body["data"]["messageQueue"][0]["text"], "Five minutes");

        let (_, body) = send(&app, Method::DELETE, "/messages/current", None).await;
        assert_eq!(body["data"]["currentMessage"]["text"], "Five minutes");

        let (_, body) = send(&app, Method::DELETE, "/messages", None).await;
        assert!(body["data"]["currentMessage"].is_null());
    }

    #[tokio::test]
    async fn test_toggles() {
        let app = test_app(false).await;
        let (_, body) = send(&app, Method::POST, "/blackout", None).await;
        assert_eq!(body["data"], true);
        let (_, body) = send(&app, Method::POST, "/blackout", None).await;
        assert_eq!(body["data"], false);
        let (_, body) = send(&app, Method::POST, "/flash", None).await;
        assert_eq!(body["data"], true);
    }

    #[tokio::test]
    async fn test_document_surface() {
        let app = test_app(false).await;

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/document?uid={}", uuid::Uuid::new_v4()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (_, identity) = send(&app, Method::POST, "/auth/anonymous", None).await;
        let uid = identity["uid"].as_str().unwrap().to_string();

        let (status, document) = send(&app, Method::GET, &format!("/document?uid={}", uid), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(document["controllerActive"], true);
        assert!(document["lastUpdated"].is_string());

        let (status, written) = send(
            &app,
            Method::PATCH,
            &format!("/document?uid={}", uid),
            Some(json!({ "flashMode": true })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(written["lastUpdated"].is_string());

        let (_, document) = send(&app, Method::GET, &format!("/document?uid={}", uid), None).await;
        assert_eq!(document["flashMode"], true);
        assert_eq!(document["controllerActive"], true);
    }

    #[tokio::test]
    async fn test_status_and_disabled_display() {
        let app = test_app(false).await;
        let (status, body) = send(&app, Method::GET, "/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connection"], "connected");
        assert_eq!(body["document_path"], DEFAULT_DOCUMENT_PATH);

        let (status, _) = send(&app, Method::GET, "/display", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_display_frame_when_enabled() {
        let app = test_app(true).await;
        let (status, body) = send(&app, Method::GET, "/display", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connection"], "disconnected");
    }
}
