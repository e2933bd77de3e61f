//! Projection of the last synced snapshot onto the local clock
//!
//! Snapshots arrive only on controller actions and the controller's coarse
//! sync tick. Between arrivals the display extrapolates the active timer from
//! the snapshot's server timestamp, so the countdown advances smoothly at the
//! local refresh rate. Each arrival replaces the baseline outright; a status
//! change in it takes effect on the very next projection.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::frame::{DisplayFrame, RenderableTimer};
use crate::sync::{ConnectionStatus, SharedSnapshot};
use crate::timer::clock::{apply_start_grace, seconds_between};
use crate::timer::{Timer, TimerStatus};

/// Result of offering a snapshot to the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Not newer than the snapshot already applied; ignored
    Stale,
}

/// Display-side reconciliation state
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    snapshot: Option<SharedSnapshot>,
    data_timestamp: Option<DateTime<Utc>>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<&SharedSnapshot> {
        self.snapshot.as_ref()
    }

    /// Server time the current baseline was written at.
    pub fn data_timestamp(&self) -> Option<DateTime<Utc>> {
        self.data_timestamp
    }

    /// Take `snapshot` as the new baseline unless it is stale.
    ///
    /// Snapshots without a server timestamp are anchored at `received_at`.
    pub fn apply(&mut self, snapshot: SharedSnapshot, received_at: DateTime<Utc>) -> ApplyOutcome {
        let current = self.snapshot.as_ref().and_then(|s| s.last_updated);
        if let (Some(incoming), Some(current)) = (snapshot.last_updated, current) {
            if incoming <= current {
                debug!(%incoming, %current, "Ignoring stale snapshot");
                return ApplyOutcome::Stale;
            }
        }

        self.data_timestamp = Some(snapshot.last_updated.unwrap_or(received_at));
        if let Some(timer) = snapshot.timers.active_timer() {
            debug!(
                timer_id = %timer.id,
                status = ?timer.state.status,
                elapsed = timer.state.elapsed_time,
                "Applied snapshot"
            );
        }
        self.snapshot = Some(snapshot);
        ApplyOutcome::Applied
    }

    /// The timer being projected.
    pub fn base_timer(&self) -> Option<&Timer> {
        self.snapshot.as_ref().and_then(|s| s.timers.active_timer())
    }

    /// Whether the local refresh loop needs to run.
    pub fn is_advancing(&self) -> bool {
        self.base_timer()
            .is_some_and(|t| t.state.status.is_advancing())
    }

    /// Synced elapsed time plus the data age, before the start grace.
    pub fn anchored_elapsed(&self, now: DateTime<Utc>) -> Option<f64> {
        let state = &self.base_timer()?.state;
        let data_age = match (state.status.is_advancing(), self.data_timestamp) {
            (true, Some(anchor)) => seconds_between(anchor, now).max(0.0),
            _ => 0.0,
        };
        Some(state.elapsed_time + data_age)
    }

    /// Elapsed seconds of the active timer as of `now`.
    pub fn projected_elapsed(&self, now: DateTime<Utc>) -> Option<f64> {
        let state = &self.base_timer()?.state;
        let elapsed = self.anchored_elapsed(now)?;

        Some(match state.status {
            TimerStatus::Running | TimerStatus::Paused => apply_start_grace(elapsed),
            TimerStatus::Idle | TimerStatus::Expired => elapsed,
        })
    }

    /// Render the current frame.
    pub fn frame(&self, now: DateTime<Utc>, connection: ConnectionStatus) -> DisplayFrame {
        let Some(snapshot) = &self.snapshot else {
            return DisplayFrame::waiting(connection, now);
        };

        let timer = match (self.base_timer(), self.projected_elapsed(now)) {
            (Some(timer), Some(elapsed)) => {
                RenderableTimer::render(timer, elapsed, &snapshot.settings, now)
            }
            _ => RenderableTimer::empty(),
        };

        DisplayFrame {
            timer,
            message: snapshot.current_message.clone().filter(|m| m.is_visible),
            blackout_mode: snapshot.blackout_mode,
            flash_mode: snapshot.flash_mode,
            controller_active: snapshot.controller_active,
            connection,
            last_updated: snapshot.last_updated,
            rendered_at: now,
        }
    }
}
