//! Controller tick background task

use std::{sync::Arc, time::{Duration, Instant}};
use tokio::{sync::broadcast, time::MissedTickBehavior};
use tracing::{debug, info};

use crate::state::AppState;

/// Advances running timers and auto-hides messages while there is anything
/// to advance; sleeps until the next command otherwise.
///
/// Timers are pushed on expiry and every `sync_interval` while running;
/// messages are pushed when one is auto-hidden.
pub async fn controller_tick_task(
    state: Arc<AppState>,
    tick: Duration,
    sync_interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("Starting controller tick task");

    let mut wake_rx = state.subscribe_wake();

    'outer: loop {
        wake_rx.borrow_and_update();

        if !state.needs_tick().await {
            debug!("Nothing to advance, tick task idle");
            tokio::select! {
                changed = wake_rx.changed() => {
                    if changed.is_err() {
                        break 'outer;
                    }
                    continue 'outer;
                }
                _ = shutdown.recv() => break 'outer,
            }
        }

        debug!("Tick task active");
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_sync = Instant::now();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let sync_due = last_sync.elapsed() >= sync_interval;
                    let report = state.tick(sync_due).await;

                    if sync_due || !report.expired.is_empty() {
                        last_sync = Instant::now();
                    }
                    for id in &report.expired {
                        info!(timer_id = %id, "Timer expired");
                    }
                    if report.message_hidden {
                        debug!("Message auto-hidden");
                    }
                    if !report.pending {
                        continue 'outer;
                    }
                }
                _ = shutdown.recv() => break 'outer,
            }
        }
    }

    info!("Controller tick task stopped");
}
