//! Renderable output handed to display UIs

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::overlay::Message;
use crate::sync::{ConnectionStatus, DisplaySettings};
use crate::timer::clock::{derive_current_time, progress_for};
use crate::timer::format::{format_clock, format_overrun};
use crate::timer::{Timer, TimerId, TimerState, TimerStatus, TimerVariant};

/// Colour band a display should use for the timer text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    Warning,
    Critical,
    Overrun,
}

/// One timer, ready to draw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderableTimer {
    pub timer_id: Option<TimerId>,
    pub name: Option<String>,
    pub variant: Option<TimerVariant>,
    pub status: TimerStatus,
    pub display_text: String,
    /// Seconds shown, after projection
    pub current_time: f64,
    pub progress_fraction: f64,
    pub urgency: Urgency,
}

impl RenderableTimer {
    /// Nothing selected
    pub fn empty() -> Self {
        Self {
            timer_id: None,
            name: None,
            variant: None,
            status: TimerStatus::Idle,
            display_text: String::new(),
            current_time: 0.0,
            progress_fraction: 0.0,
            urgency: Urgency::Normal,
        }
    }

    /// Render `timer` as if `elapsed` seconds had run.
    pub fn render(
        timer: &Timer,
        elapsed: f64,
        settings: &DisplaySettings,
        now: DateTime<Utc>,
    ) -> Self {
        let state = &timer.state;
        let current_time = derive_current_time(state.variant, state.initial_time, elapsed);
        let display_text = display_text(state, elapsed, current_time, now);
        let progress_fraction = progress_for(state.variant, state.status, state.initial_time, elapsed);

        Self {
            timer_id: Some(timer.id),
            name: settings.show_timer_name.then(|| timer.name.clone()),
            variant: Some(state.variant),
            status: state.status,
            display_text,
            current_time,
            progress_fraction: if settings.show_progress { progress_fraction } else { 0.0 },
            urgency: urgency(state, current_time, settings),
        }
    }
}

fn display_text(state: &TimerState, elapsed: f64, current_time: f64, now: DateTime<Utc>) -> String {
    match state.variant {
        TimerVariant::Hidden => String::new(),
        TimerVariant::TimeOfDay => now.with_timezone(&Local).format("%H:%M:%S").to_string(),
        TimerVariant::Countdown if state.status == TimerStatus::Expired => {
            format_overrun(elapsed - state.initial_time)
        }
        TimerVariant::Countdown | TimerVariant::Countup => format_clock(current_time),
    }
}

fn urgency(state: &TimerState, current_time: f64, settings: &DisplaySettings) -> Urgency {
    if state.variant != TimerVariant::Countdown || state.status == TimerStatus::Idle {
        return Urgency::Normal;
    }
    if state.status == TimerStatus::Expired {
        Urgency::Overrun
    } else if current_time <= settings.critical_seconds {
        Urgency::Critical
    } else if current_time <= settings.warning_seconds {
        Urgency::Warning
    } else {
        Urgency::Normal
    }
}

/// Everything a display draws for one refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayFrame {
    pub timer: RenderableTimer,
    pub message: Option<Message>,
    pub blackout_mode: bool,
    pub flash_mode: bool,
    pub controller_active: bool,
    pub connection: ConnectionStatus,
    pub last_updated: Option<DateTime<Utc>>,
    pub rendered_at: DateTime<Utc>,
}

impl DisplayFrame {
    /// Frame shown before any snapshot arrives
    pub fn waiting(connection: ConnectionStatus, now: DateTime<Utc>) -> Self {
        Self {
            timer: RenderableTimer::empty(),
            message: None,
            blackout_mode: false,
            flash_mode: false,
            controller_active: false,
            connection,
            last_updated: None,
            rendered_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn countdown(initial: f64, status: TimerStatus) -> Timer {
        let mut state = TimerState::new(TimerVariant::Countdown, initial).unwrap();
        state.status = status;
        Timer {
            id: Uuid::new_v4(),
            name: "Keynote".into(),
            order: 0,
            state,
            scheduled_start_time: None,
        }
    }

    #[test]
    fn test_render_running_countdown() {
        let timer = countdown(600.0, TimerStatus::Running);
        let frame = RenderableTimer::render(&timer, 150.0, &DisplaySettings::default(), Utc::now());
        assert_eq!(frame.display_text, "07:30");
        assert_eq!(frame.progress_fraction, 0.25);
        assert_eq!(frame.urgency, Urgency::Normal);
        assert_eq!(frame.name.as_deref(), Some("Keynote"));
    }

    #[test]
    fn test_render_expired_shows_signed_overrun() {
        let timer = countdown(600.0, TimerStatus::Expired);
        let frame = RenderableTimer::render(&timer, 605.0, &DisplaySettings::default(), Utc::now());
        assert_eq!(frame.display_text, "-00:05");
        assert_eq!(frame.current_time, 0.0);
        assert_eq!(frame.progress_fraction, 1.0);
        assert_eq!(frame.urgency, Urgency::Overrun);
    }

    #[test]
    fn test_urgency_bands() {
        let timer = countdown(120.0, TimerStatus::Running);
        let settings = DisplaySettings::default();
        let warn = RenderableTimer::render(&timer, 70.0, &settings, Utc::now());
        assert_eq!(warn.urgency, Urgency::Warning);
        let crit = RenderableTimer::render(&timer, 110.0, &settings, Utc::now());
        assert_eq!(crit.urgency, Urgency::Critical);
    }

    #[test]
    fn test_settings_hide_name_and_progress() {
        let timer = countdown(100.0, TimerStatus::Running);
        let settings = DisplaySettings {
            show_progress: false,
            show_timer_name: false,
            ..Default::default()
        };
        let frame = RenderableTimer::render(&timer, 50.0, &settings, Utc::now());
        assert!(frame.name.is_none());
        assert_eq!(frame.progress_fraction, 0.0);
    }

    #[test]
    fn test_hidden_variant_renders_nothing() {
        let mut timer = countdown(100.0, TimerStatus::Running);
        timer.state.variant = TimerVariant::Hidden;
        let frame = RenderableTimer::render(&timer, 50.0, &DisplaySettings::default(), Utc::now());
        assert!(frame.display_text.is_empty());
    }
}
