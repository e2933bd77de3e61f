//! Display projection background task
//!
//! Follows the shared document through its own channel, feeds every remote
//! snapshot to a [`Reconciler`] and publishes frames: one per accepted
//! snapshot, plus one per refresh tick while the active timer advances.

use std::time::Duration;
use chrono::Utc;
use tokio::{
    sync::{broadcast, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, error, info, warn};

use crate::{
    display::{ApplyOutcome, DisplayFrame, Reconciler},
    sync::{SyncBackend, SyncChannel},
};

fn publish<B: SyncBackend>(
    frames: &watch::Sender<DisplayFrame>,
    reconciler: &Reconciler,
    channel: &SyncChannel<B>,
) {
    frames.send_replace(reconciler.frame(Utc::now(), channel.status()));
}

pub async fn display_projection_task<B: SyncBackend>(
    channel: SyncChannel<B>,
    frames: watch::Sender<DisplayFrame>,
    refresh: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!(path = channel.path(), "Starting display projection task");

    let mut reconciler = Reconciler::new();
    publish(&frames, &reconciler, &channel);

    // Subscribe before the initial read so no write falls in between.
    let mut subscription = match channel.subscribe().await {
        Ok(subscription) => subscription,
        Err(e) => {
            error!("Display could not subscribe: {}", e);
            publish(&frames, &reconciler, &channel);
            let _ = shutdown.recv().await;
            return;
        }
    };

    match channel.fetch_existing().await {
        Ok(Some(snapshot)) => {
            reconciler.apply(snapshot, Utc::now());
        }
        Ok(None) => debug!("No document yet, waiting for the controller"),
        Err(e) => warn!("Initial read failed: {}", e),
    }
    publish(&frames, &reconciler, &channel);

    let mut interval = tokio::time::interval(refresh);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            incoming = subscription.next() => match incoming {
                Some(snapshot) => {
                    if reconciler.apply(snapshot, Utc::now()) == ApplyOutcome::Applied {
                        publish(&frames, &reconciler, &channel);
                    }
                }
                None => {
                    warn!("Document feed closed");
                    publish(&frames, &reconciler, &channel);
                    break;
                }
            },
            _ = interval.tick(), if reconciler.is_advancing() => {
                publish(&frames, &reconciler, &channel);
            }
            _ = shutdown.recv() => break,
        }
    }

    info!("Display projection task stopped");
}
