//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use super::{CommandError, Controller, ControllerTick, Field};
use crate::{
    display::{DisplayFrame, RenderableTimer},
    overlay::MessagePreset,
    sync::{DocumentStore, PushOutcome, SharedSnapshot, SyncChannel, SyncError},
    timer::TimerCollection,
};

/// Shared state behind every HTTP handler and background task
pub struct AppState {
    /// Authoritative controller state; commands run under this lock so that
    /// pushes leave in the same order the mutations happened
    controller: AsyncMutex<Controller>,
    /// Controller's channel to the shared document
    pub channel: SyncChannel<DocumentStore>,
    /// Hosted document store, also served to remote clients
    pub store: Arc<DocumentStore>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    pub display_enabled: bool,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Bumped after every command so the tick task re-checks its work
    wake_tx: watch::Sender<u64>,
    /// Keep the receiver alive to prevent channel closure
    _wake_rx: watch::Receiver<u64>,
    /// Latest frame from the embedded display
    frames: watch::Receiver<DisplayFrame>,
}

impl AppState {
    pub fn new(
        port: u16,
        host: String,
        store: Arc<DocumentStore>,
        document_path: &str,
        presets: Vec<MessagePreset>,
        frames: watch::Receiver<DisplayFrame>,
        display_enabled: bool,
    ) -> Self {
        let (wake_tx, wake_rx) = watch::channel(0);

        Self {
            controller: AsyncMutex::new(Controller::new(presets)),
            channel: SyncChannel::new(Arc::clone(&store), document_path),
            store,
            start_time: Instant::now(),
            port,
            host,
            display_enabled,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            wake_tx,
            _wake_rx: wake_rx,
            frames,
        }
    }

    /// Sign in and either resume the existing document or seed a new one.
    pub async fn bootstrap(&self) -> Result<(), SyncError> {
        self.channel.authenticate().await?;

        let mut controller = self.controller.lock().await;
        match self.channel.fetch_existing().await? {
            Some(snapshot) => {
                controller.restore(snapshot);
                self.push_locked(&mut controller, &[Field::ControllerActive], Utc::now()).await;
            }
            None => {
                info!(path = self.channel.path(), "No existing session, seeding document");
                self.channel.initialize(&controller.snapshot()).await?;
            }
        }
        drop(controller);

        self.wake();
        Ok(())
    }

    /// Tell displays the controller went away.
    pub async fn sign_off(&self) {
        let mut controller = self.controller.lock().await;
        controller.set_active(false);
        self.push_locked(&mut controller, &[Field::ControllerActive], Utc::now()).await;
        info!("Controller signed off");
    }

    /// Run a controller command and push the touched fields.
    ///
    /// A command that fails validation changes nothing and pushes nothing. A
    /// push that fails is logged; the command still stands locally.
    pub async fn run_command<T, F>(
        &self,
        action: &str,
        groups: &[Field],
        command: F,
    ) -> Result<T, CommandError>
    where
        F: FnOnce(&mut Controller, DateTime<Utc>) -> Result<T, CommandError> + Send,
        T: Send,
    {
        let mut controller = self.controller.lock().await;
        let now = Utc::now();
        let output = match command(&mut *controller, now) {
            Ok(output) => output,
            Err(e) => {
                warn!(action, "Command rejected: {}", e);
                return Err(e);
            }
        };
        self.push_locked(&mut controller, groups, now).await;
        drop(controller);

        self.record_action(action);
        self.wake();
        Ok(output)
    }

    async fn push_locked(&self, controller: &mut Controller, groups: &[Field], now: DateTime<Utc>) {
        let groups = controller.push_groups(groups, now);
        let patch = match controller.patch(&groups) {
            Ok(patch) => patch,
            Err(e) => {
                error!("Failed to encode snapshot patch: {}", e);
                return;
            }
        };

        match self.channel.push(patch).await {
            Ok(PushOutcome::Sent(stamp)) => debug!(?groups, %stamp, "Snapshot pushed"),
            Ok(PushOutcome::Dropped) => debug!(?groups, "Snapshot not pushed, channel offline"),
            Err(e) => warn!("Push failed, continuing locally: {}", e),
        }
    }

    /// Advance running timers and expire messages; push what changed.
    ///
    /// `sync_due` re-pushes the timers even without a status change so that
    /// displays re-anchor their projection.
    pub async fn tick(&self, sync_due: bool) -> ControllerTick {
        let mut controller = self.controller.lock().await;
        let now = Utc::now();
        let report = controller.tick(now);

        let mut groups = Vec::new();
        if sync_due || !report.expired.is_empty() {
            groups.push(Field::Timers);
        }
        if report.message_hidden {
            groups.push(Field::Messages);
        }
        if !groups.is_empty() {
            self.push_locked(&mut controller, &groups, now).await;
        }
        report
    }

    pub async fn needs_tick(&self) -> bool {
        self.controller.lock().await.needs_tick()
    }

    /// Read-only access to the controller.
    pub async fn with_controller<T>(&self, read: impl FnOnce(&Controller) -> T) -> T {
        read(&*self.controller.lock().await)
    }

    pub async fn snapshot(&self) -> SharedSnapshot {
        self.controller.lock().await.snapshot()
    }

    /// Timer collection plus the operator preview of the active timer.
    pub async fn timers_view(&self) -> (TimerCollection, RenderableTimer) {
        let controller = self.controller.lock().await;
        (controller.timers().clone(), controller.preview(Utc::now()))
    }

    /// Latest frame produced by the embedded display.
    pub fn display_frame(&self) -> DisplayFrame {
        self.frames.borrow().clone()
    }

    pub fn subscribe_frames(&self) -> watch::Receiver<DisplayFrame> {
        self.frames.clone()
    }

    pub fn subscribe_wake(&self) -> watch::Receiver<u64> {
        self.wake_tx.subscribe()
    }

    fn wake(&self) {
        self.wake_tx.send_modify(|n| *n = n.wrapping_add(1));
    }

    fn record_action(&self, action: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
