//! Controller-side authoritative state
//!
//! Owns the timer collection, the message board and the display toggles, and
//! knows how to express any of them as a document patch.

use chrono::{DateTime, Utc};
use tracing::info;

use super::CommandError;
use crate::display::RenderableTimer;
use crate::overlay::{Message, MessageBoard, MessagePreset};
use crate::sync::snapshot::fields;
use crate::sync::{DisplaySettings, SharedSnapshot, SnapshotPatch};
use crate::timer::clock::{apply_start_grace, validate_duration};
use crate::timer::{TimerCollection, TimerId, TimerStatus, TimerUpdate, TimerVariant};

/// Document field groups a command can touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Timers,
    Messages,
    Settings,
    Blackout,
    Flash,
    ControllerActive,
}

/// What a controller tick changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerTick {
    pub expired: Vec<TimerId>,
    pub message_hidden: bool,
    /// Whether another tick is needed
    pub pending: bool,
}

#[derive(Debug, Clone)]
pub struct Controller {
    timers: TimerCollection,
    messages: MessageBoard,
    settings: DisplaySettings,
    blackout_mode: bool,
    flash_mode: bool,
    active: bool,
}

type Result<T> = std::result::Result<T, CommandError>;

impl Controller {
    pub fn new(presets: Vec<MessagePreset>) -> Self {
        Self {
            timers: TimerCollection::new(),
            messages: MessageBoard::with_presets(presets),
            settings: DisplaySettings::default(),
            blackout_mode: false,
            flash_mode: false,
            active: true,
        }
    }

    /// Resume a session found in the shared document.
    pub fn restore(&mut self, snapshot: SharedSnapshot) {
        info!(
            timers = snapshot.timers.timers.len(),
            active = ?snapshot.timers.active_timer_id,
            "Resuming existing session"
        );
        self.timers = snapshot.timers;
        self.messages.restore(snapshot.current_message, snapshot.message_queue);
        self.settings = snapshot.settings;
        self.blackout_mode = snapshot.blackout_mode;
        self.flash_mode = snapshot.flash_mode;
        self.active = true;
    }

    pub fn timers(&self) -> &TimerCollection {
        &self.timers
    }

    pub fn messages(&self) -> &MessageBoard {
        &self.messages
    }

    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    pub fn snapshot(&self) -> SharedSnapshot {
        SharedSnapshot {
            timers: self.timers.clone(),
            current_message: self.messages.current_message.clone(),
            message_queue: self.messages.message_queue.iter().cloned().collect(),
            settings: self.settings.clone(),
            blackout_mode: self.blackout_mode,
            flash_mode: self.flash_mode,
            last_updated: None,
            controller_active: self.active,
        }
    }

    /// Patch carrying the current value of each field group.
    pub fn patch(&self, groups: &[Field]) -> serde_json::Result<SnapshotPatch> {
        let mut patch = SnapshotPatch::new();
        for group in groups {
            patch = match group {
                Field::Timers => patch.set(fields::TIMERS, &self.timers)?,
                Field::Messages => patch
                    .set(fields::CURRENT_MESSAGE, &self.messages.current_message)?
                    .set(fields::MESSAGE_QUEUE, &self.messages.message_queue)?,
                Field::Settings => patch.set(fields::SETTINGS, &self.settings)?,
                Field::Blackout => patch.set(fields::BLACKOUT_MODE, &self.blackout_mode)?,
                Field::Flash => patch.set(fields::FLASH_MODE, &self.flash_mode)?,
                Field::ControllerActive => patch.set(fields::CONTROLLER_ACTIVE, &self.active)?,
            };
        }
        Ok(patch)
    }

    /// Field groups to push for a change touching `groups`.
    ///
    /// Every push restamps the document and displays measure data age from
    /// that stamp, so while a timer advances the timers are brought up to
    /// `now` and ride along with any push.
    pub fn push_groups(&mut self, groups: &[Field], now: DateTime<Utc>) -> Vec<Field> {
        let mut groups = groups.to_vec();
        if self.timers.timers.iter().any(|t| t.state.status.is_advancing()) {
            self.timers.tick(now);
            if !groups.contains(&Field::Timers) {
                groups.push(Field::Timers);
            }
        }
        groups
    }

    /// Active timer as the operator preview shows it.
    pub fn preview(&self, now: DateTime<Utc>) -> RenderableTimer {
        match self.timers.active_timer() {
            Some(timer) => {
                let elapsed = match timer.state.status {
                    TimerStatus::Running | TimerStatus::Paused => apply_start_grace(timer.state.elapsed_time),
                    TimerStatus::Idle | TimerStatus::Expired => timer.state.elapsed_time,
                };
                RenderableTimer::render(timer, elapsed, &self.settings, now)
            }
            None => RenderableTimer::empty(),
        }
    }

    pub fn add_timer(
        &mut self,
        name: &str,
        duration: f64,
        variant: TimerVariant,
        scheduled_start_time: Option<&str>,
    ) -> Result<TimerCollection> {
        Ok(self.timers.add_timer(name, duration, variant, scheduled_start_time)?)
    }

    pub fn delete_timer(&mut self, id: TimerId) -> Result<TimerCollection> {
        Ok(self.timers.delete_timer(id)?)
    }

    pub fn select_timer(&mut self, id: TimerId) -> Result<TimerCollection> {
        Ok(self.timers.select_timer(id)?)
    }

    pub fn start_timer(&mut self, id: TimerId, now: DateTime<Utc>) -> Result<TimerCollection> {
        Ok(self.timers.start_timer(id, now)?)
    }

    pub fn pause_timer(&mut self, id: TimerId, now: DateTime<Utc>) -> Result<TimerCollection> {
        Ok(self.timers.pause_timer(id, now)?)
    }

    pub fn reset_timer(&mut self, id: TimerId) -> Result<TimerCollection> {
        Ok(self.timers.reset_timer(id)?)
    }

    pub fn update_timer(&mut self, id: TimerId, update: TimerUpdate, now: DateTime<Utc>) -> Result<TimerCollection> {
        Ok(self.timers.update_timer(id, update, now)?)
    }

    pub fn update_timer_duration(
        &mut self,
        id: TimerId,
        seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<TimerCollection> {
        Ok(self.timers.update_timer_duration(id, seconds, now)?)
    }

    pub fn update_timer_type(&mut self, id: TimerId, variant: TimerVariant) -> Result<TimerCollection> {
        Ok(self.timers.update_timer_type(id, variant)?)
    }

    pub fn reorder_timers(&mut self, order: &[TimerId]) -> Result<TimerCollection> {
        Ok(self.timers.reorder_timers(order)?)
    }

    pub fn adjust_time(&mut self, id: TimerId, delta_seconds: f64, now: DateTime<Utc>) -> Result<TimerCollection> {
        Ok(self.timers.adjust_time(id, delta_seconds, now)?)
    }

    pub fn show_message(
        &mut self,
        text: &str,
        auto_hide: bool,
        hide_after: f64,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        Ok(self.messages.show_message(text, auto_hide, hide_after, now)?)
    }

    pub fn show_preset_message(&mut self, index: usize, now: DateTime<Utc>) -> Result<Message> {
        Ok(self.messages.show_preset_message(index, now)?)
    }

    pub fn clear_message(&mut self, now: DateTime<Utc>) -> Option<Message> {
        self.messages.clear_message(now).cloned()
    }

    pub fn clear_all_messages(&mut self) {
        self.messages.clear_all_messages();
    }

    pub fn toggle_blackout(&mut self) -> bool {
        self.blackout_mode = !self.blackout_mode;
        info!(blackout = self.blackout_mode, "Blackout toggled");
        self.blackout_mode
    }

    pub fn toggle_flash(&mut self) -> bool {
        self.flash_mode = !self.flash_mode;
        info!(flash = self.flash_mode, "Flash toggled");
        self.flash_mode
    }

    pub fn update_settings(&mut self, settings: DisplaySettings) -> Result<DisplaySettings> {
        validate_duration(settings.warning_seconds)?;
        validate_duration(settings.critical_seconds)?;
        self.settings = settings;
        Ok(self.settings.clone())
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether anything needs the tick loop.
    pub fn needs_tick(&self) -> bool {
        let advancing = self.timers.timers.iter().any(|t| t.state.status.is_advancing());
        let auto_hide = self
            .messages
            .current_message
            .as_ref()
            .is_some_and(|m| m.auto_hide);
        advancing || auto_hide
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> ControllerTick {
        let report = self.timers.tick(now);
        let message_hidden = self.messages.expire(now);
        ControllerTick {
            expired: report.expired,
            message_hidden,
            pending: self.needs_tick(),
        }
    }
}
