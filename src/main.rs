//! Stage Timer - A stage countdown timer with a synchronized display
//!
//! This is the main entry point for the stage-timer application.

use std::sync::Arc;
use chrono::Utc;
use tokio::{
    net::TcpListener,
    sync::{broadcast, watch},
};
use tracing::{error, info, warn};

use stage_timer::{
    api::create_router,
    config::Config,
    display::DisplayFrame,
    state::AppState,
    sync::{DocumentStore, SyncChannel},
    tasks::{controller_tick_task, display_projection_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("stage_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting stage-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, document={}, tick={}ms, sync={}ms, display={}",
        config.host,
        config.port,
        config.document,
        config.tick_ms,
        config.sync_interval_ms,
        config.display_enabled()
    );

    let store = Arc::new(DocumentStore::new());
    let display_channel = SyncChannel::new(Arc::clone(&store), config.document.clone());
    let (frame_tx, frame_rx) = watch::channel(DisplayFrame::waiting(display_channel.status(), Utc::now()));

    // Create application state
    let state = Arc::new(AppState::new(
        config.port,
        config.host.clone(),
        Arc::clone(&store),
        &config.document,
        config.presets(),
        frame_rx,
        config.display_enabled(),
    ));

    // The controller keeps working locally if the channel cannot come up
    if let Err(e) = state.bootstrap().await {
        error!("Sync bootstrap failed, running local-only: {}", e);
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Start the background tasks
    let tick_state = Arc::clone(&state);
    let tick_task = tokio::spawn(controller_tick_task(
        tick_state,
        config.tick(),
        config.sync_interval(),
        shutdown_tx.subscribe(),
    ));

    let display_task = if config.display_enabled() {
        Some(tokio::spawn(display_projection_task(
            display_channel,
            frame_tx,
            config.tick(),
            shutdown_tx.subscribe(),
        )))
    } else {
        None
    };

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET/POST      /timers              - List or add timers");
    info!("  PATCH/DELETE  /timers/:id          - Update or delete a timer");
    info!("  POST          /timers/:id/<action> - select, start, pause, reset, adjust");
    info!("  PUT           /timers/order        - Reorder timers");
    info!("  GET/POST/DEL  /messages            - Message overlay");
    info!("  POST          /blackout, /flash    - Display toggles");
    info!("  GET/PUT/PATCH /document            - Shared document");
    info!("  GET           /display/events      - Embedded display frames");
    info!("  GET           /status              - Check current status");
    info!("  GET           /health              - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = tick_task.await {
        warn!("Tick task ended abnormally: {}", e);
    }
    if let Some(task) = display_task {
        if let Err(e) = task.await {
            warn!("Display task ended abnormally: {}", e);
        }
    }
    state.sign_off().await;

    info!("Server shutdown complete");
    Ok(())
}
