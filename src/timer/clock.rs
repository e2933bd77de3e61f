//! Single-timer state machine and time arithmetic
//!
//! Every transition takes the wall-clock instant explicitly, so the same
//! arithmetic runs on the controller's tick loop and inside display
//! reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{TimerError, Result};

/// Seconds a freshly started timer holds its initial value on screen.
pub const START_GRACE_SECONDS: f64 = 1.0;

/// How a timer's value is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerVariant {
    Countdown,
    Countup,
    TimeOfDay,
    Hidden,
}

/// Lifecycle status of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
    Expired,
}

impl TimerStatus {
    /// Whether the wall clock advances this timer's elapsed time.
    ///
    /// Expired countdowns keep accumulating so the overrun can be shown.
    pub fn is_advancing(self) -> bool {
        matches!(self, TimerStatus::Running | TimerStatus::Expired)
    }
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Timer is not running; nothing changed
    Idle,
    /// Elapsed time advanced
    Advanced,
    /// Countdown crossed zero on this tick (reported once per run)
    Expired,
}

/// Runtime state of one timer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    pub variant: TimerVariant,
    pub status: TimerStatus,
    /// Configured duration in seconds
    pub initial_time: f64,
    /// Running seconds accumulated since the last reset
    pub elapsed_time: f64,
    /// Derived display value, see [`derive_current_time`]
    pub current_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_wall_clock: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_at_wall_clock: Option<DateTime<Utc>>,
    /// Seconds excluded from elapsed time since `started_at_wall_clock`
    #[serde(default)]
    pub pause_offset: f64,
}

/// Seconds between two instants, as a float.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}

/// Reject negative or non-finite durations.
pub fn validate_duration(seconds: f64) -> Result<f64> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(TimerError::InvalidDuration(seconds));
    }
    Ok(seconds)
}

/// Display value for a given elapsed time.
pub fn derive_current_time(variant: TimerVariant, initial_time: f64, elapsed_time: f64) -> f64 {
    match variant {
        TimerVariant::Countdown => (initial_time - elapsed_time).max(0.0),
        TimerVariant::Countup | TimerVariant::TimeOfDay | TimerVariant::Hidden => elapsed_time,
    }
}

/// Hold the first second of a run at zero, then lag by one second.
pub fn apply_start_grace(elapsed: f64) -> f64 {
    if elapsed < START_GRACE_SECONDS {
        0.0
    } else {
        elapsed - START_GRACE_SECONDS
    }
}

impl TimerState {
    /// Create an idle timer, validating the duration.
    pub fn new(variant: TimerVariant, initial_time: f64) -> Result<Self> {
        let initial_time = validate_duration(initial_time)?;
        Ok(Self::idle(variant, initial_time))
    }

    fn idle(variant: TimerVariant, initial_time: f64) -> Self {
        Self {
            variant,
            status: TimerStatus::Idle,
            initial_time,
            elapsed_time: 0.0,
            current_time: derive_current_time(variant, initial_time, 0.0),
            started_at_wall_clock: None,
            paused_at_wall_clock: None,
            pause_offset: 0.0,
        }
    }

    /// Reconfigure duration and variant; leaves the timer idle.
    pub fn set_timer(&mut self, duration: f64, variant: TimerVariant) -> Result<()> {
        let duration = validate_duration(duration)?;
        *self = Self::idle(variant, duration);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Start or resume. Returns false when the call was a no-op.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        match self.status {
            TimerStatus::Running | TimerStatus::Expired => false,
            TimerStatus::Idle => {
                self.started_at_wall_clock = Some(now);
                // Keeps any pre-start adjustment as a head start.
                self.pause_offset = -self.elapsed_time;
                self.paused_at_wall_clock = None;
                self.status = TimerStatus::Running;
                true
            }
            TimerStatus::Paused => {
                let paused_for = self
                    .paused_at_wall_clock
                    .map(|paused_at| seconds_between(paused_at, now).max(0.0))
                    .unwrap_or(0.0);
                if self.started_at_wall_clock.is_none() {
                    self.started_at_wall_clock = Some(now);
                    self.pause_offset = -self.elapsed_time;
                } else {
                    self.pause_offset += paused_for;
                }
                self.paused_at_wall_clock = None;
                self.status = TimerStatus::Running;
                true
            }
        }
    }

    /// Pause a running timer. Returns false when the call was a no-op.
    pub fn pause(&mut self, now: DateTime<Utc>) -> bool {
        if self.status != TimerStatus::Running {
            return false;
        }
        // Fold time up to the pause instant in before freezing.
        if self.tick(now) == TickOutcome::Expired {
            return false;
        }
        self.paused_at_wall_clock = Some(now);
        self.status = TimerStatus::Paused;
        true
    }

    /// Return to idle with the configured duration.
    pub fn reset(&mut self) {
        *self = Self::idle(self.variant, self.initial_time);
    }

    /// Recompute elapsed and current time from the wall clock.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if !self.status.is_advancing() {
            return TickOutcome::Idle;
        }
        let Some(started_at) = self.started_at_wall_clock else {
            return TickOutcome::Idle;
        };

        let elapsed = (seconds_between(started_at, now) - self.pause_offset).max(0.0);
        // Never step backwards when the wall clock does.
        self.elapsed_time = elapsed.max(self.elapsed_time);
        self.current_time = derive_current_time(self.variant, self.initial_time, self.elapsed_time);

        if self.status == TimerStatus::Running
            && self.variant == TimerVariant::Countdown
            && self.current_time <= 0.0
        {
            self.status = TimerStatus::Expired;
            return TickOutcome::Expired;
        }
        TickOutcome::Advanced
    }

    /// Operator correction of the displayed value.
    ///
    /// The display value is clamped into `[0, initial_time]` for countdowns and
    /// to `>= 0` otherwise; elapsed time is rewritten to match so later ticks
    /// keep the correction.
    pub fn adjust_time(&mut self, delta_seconds: f64) -> Result<()> {
        if !delta_seconds.is_finite() {
            return Err(TimerError::InvalidDuration(delta_seconds));
        }

        let adjusted = match self.variant {
            TimerVariant::Countdown => (self.current_time + delta_seconds).clamp(0.0, self.initial_time),
            _ => (self.current_time + delta_seconds).max(0.0),
        };
        let new_elapsed = match self.variant {
            TimerVariant::Countdown => self.initial_time - adjusted,
            _ => adjusted,
        };

        let shift = new_elapsed - self.elapsed_time;
        if self.started_at_wall_clock.is_some() {
            self.pause_offset -= shift;
        }
        self.elapsed_time = new_elapsed;
        self.current_time = adjusted;
        self.revive_if_lifted();
        Ok(())
    }

    /// Change the configured duration. An idle timer is reconfigured; any
    /// other keeps its accumulated elapsed time.
    pub fn change_duration(&mut self, seconds: f64) -> Result<()> {
        let seconds = validate_duration(seconds)?;
        if self.status == TimerStatus::Idle {
            return self.set_timer(seconds, self.variant);
        }
        self.initial_time = seconds;
        self.current_time = derive_current_time(self.variant, seconds, self.elapsed_time);
        self.revive_if_lifted();
        Ok(())
    }

    /// An expired countdown corrected back above zero runs again from its
    /// existing wall-clock anchors.
    fn revive_if_lifted(&mut self) {
        if self.status == TimerStatus::Expired
            && self.variant == TimerVariant::Countdown
            && self.current_time > 0.0
        {
            self.status = TimerStatus::Running;
        }
    }

    /// Seconds past zero for an expired countdown.
    pub fn overrun(&self) -> f64 {
        if self.variant == TimerVariant::Countdown && self.status == TimerStatus::Expired {
            (self.elapsed_time - self.initial_time).max(0.0)
        } else {
            0.0
        }
    }

    /// Fraction of the configured duration consumed, in `0..=1`.
    pub fn progress_fraction(&self) -> f64 {
        progress_for(self.variant, self.status, self.initial_time, self.elapsed_time)
    }
}

/// Progress for an arbitrary (possibly projected) elapsed time.
pub fn progress_for(variant: TimerVariant, status: TimerStatus, initial_time: f64, elapsed: f64) -> f64 {
    match variant {
        TimerVariant::Countdown | TimerVariant::Countup => {
            if status == TimerStatus::Expired {
                1.0
            } else if initial_time <= 0.0 {
                0.0
            } else {
                (elapsed / initial_time).clamp(0.0, 1.0)
            }
        }
        TimerVariant::TimeOfDay | TimerVariant::Hidden => 0.0,
    }
}
