//! Ordered collection of named timers with an active selection
//!
//! Every command runs against a scratch copy and is committed only when it
//! succeeds, so a rejected command leaves the collection untouched.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::clock::{validate_duration, TickOutcome, TimerState, TimerStatus, TimerVariant};
use super::format::parse_start_label;
use super::{Result, TimerError, TimerId};

/// A named timer owned by the collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: TimerId,
    pub name: String,
    pub order: u32,
    pub state: TimerState,
    /// Wall-clock label such as `19:30`, informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_time: Option<String>,
}

/// Partial update accepted by [`TimerCollection::update_timer`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerUpdate {
    pub name: Option<String>,
    pub duration: Option<f64>,
    pub variant: Option<TimerVariant>,
    /// Empty string clears the label
    pub scheduled_start_time: Option<String>,
    pub status: Option<TimerStatus>,
}

/// Ticks observed across the collection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionTick {
    /// Timers whose countdown hit zero on this tick
    pub expired: Vec<TimerId>,
    /// Whether any timer is still advancing
    pub advancing: bool,
}

/// The canonical timer collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerCollection {
    pub timers: Vec<Timer>,
    pub active_timer_id: Option<TimerId>,
}

fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(TimerError::EmptyName);
    }
    Ok(trimmed.to_string())
}

fn normalize_label(label: Option<&str>) -> Result<Option<String>> {
    match label.map(str::trim) {
        None | Some("") => Ok(None),
        Some(label) => parse_start_label(label).map(Some),
    }
}

impl TimerCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TimerId) -> Option<&Timer> {
        self.timers.iter().find(|t| t.id == id)
    }

    pub fn active_timer(&self) -> Option<&Timer> {
        self.active_timer_id.and_then(|id| self.get(id))
    }

    pub fn running_count(&self) -> usize {
        self.timers.iter().filter(|t| t.state.is_running()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    fn get_mut(&mut self, id: TimerId) -> Result<&mut Timer> {
        self.timers
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(TimerError::NotFound(id))
    }

    /// Apply `mutation` to a scratch copy; keep it only if it succeeds.
    fn commit<F>(&mut self, mutation: F) -> Result<TimerCollection>
    where
        F: FnOnce(&mut TimerCollection) -> Result<()>,
    {
        let mut draft = self.clone();
        mutation(&mut draft)?;
        draft.assert_invariants();
        *self = draft;
        Ok(self.clone())
    }

    /// Append a timer; the first timer added becomes active.
    pub fn add_timer(
        &mut self,
        name: &str,
        duration: f64,
        variant: TimerVariant,
        scheduled_start_time: Option<&str>,
    ) -> Result<TimerCollection> {
        let name = normalize_name(name)?;
        let state = TimerState::new(variant, duration)?;
        let scheduled_start_time = normalize_label(scheduled_start_time)?;

        self.commit(|c| {
            let order = c.timers.iter().map(|t| t.order + 1).max().unwrap_or(0);
            let id = Uuid::new_v4();
            info!(timer_id = %id, name = %name, duration, ?variant, "Adding timer");
            c.timers.push(Timer {
                id,
                name,
                order,
                state,
                scheduled_start_time,
            });
            if c.active_timer_id.is_none() {
                c.active_timer_id = Some(id);
            }
            Ok(())
        })
    }

    /// Remove a timer; an active timer hands selection to the first remaining.
    pub fn delete_timer(&mut self, id: TimerId) -> Result<TimerCollection> {
        self.commit(|c| {
            let index = c
                .timers
                .iter()
                .position(|t| t.id == id)
                .ok_or(TimerError::NotFound(id))?;
            c.timers.remove(index);
            if c.active_timer_id == Some(id) {
                c.active_timer_id = c.timers.first().map(|t| t.id);
            }
            info!(timer_id = %id, active = ?c.active_timer_id, "Deleted timer");
            Ok(())
        })
    }

    /// Make a timer active. Selection always resets it to a clean start.
    pub fn select_timer(&mut self, id: TimerId) -> Result<TimerCollection> {
        self.commit(|c| {
            c.get_mut(id)?.state.reset();
            c.active_timer_id = Some(id);
            debug!(timer_id = %id, "Selected timer");
            Ok(())
        })
    }

    /// Start a timer, pausing whichever other timer is running.
    pub fn start_timer(&mut self, id: TimerId, now: DateTime<Utc>) -> Result<TimerCollection> {
        self.commit(|c| {
            let status = c.get_mut(id)?.state.status;
            if matches!(status, TimerStatus::Running | TimerStatus::Expired) {
                debug!(timer_id = %id, ?status, "Start ignored");
                return Ok(());
            }
            c.pause_others(id, now);
            c.get_mut(id)?.state.start(now);
            Ok(())
        })
    }

    /// Pause every running timer other than `id`.
    fn pause_others(&mut self, id: TimerId, now: DateTime<Utc>) {
        for other in self.timers.iter_mut().filter(|t| t.id != id) {
            if other.state.pause(now) {
                info!(timer_id = %other.id, "Paused timer to start another");
            }
        }
    }

    /// Apply a correction to one timer. A correction that brings an expired
    /// countdown back to running pauses whichever other timer runs.
    fn correct(
        &mut self,
        id: TimerId,
        now: DateTime<Utc>,
        correction: impl FnOnce(&mut TimerState) -> Result<()>,
    ) -> Result<()> {
        let state = &mut self.get_mut(id)?.state;
        let was_running = state.is_running();
        correction(state)?;
        if !was_running && state.is_running() {
            info!(timer_id = %id, "Corrected timer running again");
            self.pause_others(id, now);
        }
        Ok(())
    }

    pub fn pause_timer(&mut self, id: TimerId, now: DateTime<Utc>) -> Result<TimerCollection> {
        self.commit(|c| {
            c.get_mut(id)?.state.pause(now);
            Ok(())
        })
    }

    pub fn reset_timer(&mut self, id: TimerId) -> Result<TimerCollection> {
        self.commit(|c| {
            c.get_mut(id)?.state.reset();
            Ok(())
        })
    }

    /// Change the configured duration, keeping accumulated elapsed time.
    pub fn update_timer_duration(
        &mut self,
        id: TimerId,
        seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<TimerCollection> {
        let seconds = validate_duration(seconds)?;
        self.commit(|c| c.correct(id, now, |state| state.change_duration(seconds)))
    }

    /// Change the variant; the timer is reset.
    pub fn update_timer_type(&mut self, id: TimerId, variant: TimerVariant) -> Result<TimerCollection> {
        self.commit(|c| {
            let state = &mut c.get_mut(id)?.state;
            state.set_timer(state.initial_time, variant)
        })
    }

    /// Apply a partial update. Status requests route through the start,
    /// pause and reset commands so mutual exclusion still holds.
    pub fn update_timer(
        &mut self,
        id: TimerId,
        update: TimerUpdate,
        now: DateTime<Utc>,
    ) -> Result<TimerCollection> {
        if update.status == Some(TimerStatus::Expired) {
            return Err(TimerError::IllegalStatus(TimerStatus::Expired));
        }
        let name = update.name.as_deref().map(normalize_name).transpose()?;
        let label = update
            .scheduled_start_time
            .as_deref()
            .map(|l| normalize_label(Some(l)))
            .transpose()?;

        self.commit(|c| {
            {
                let timer = c.get_mut(id)?;
                if let Some(name) = name {
                    timer.name = name;
                }
                if let Some(label) = label {
                    timer.scheduled_start_time = label;
                }
            }
            if let Some(variant) = update.variant {
                c.update_timer_type(id, variant)?;
            }
            if let Some(duration) = update.duration {
                c.update_timer_duration(id, duration, now)?;
            }
            match update.status {
                Some(TimerStatus::Running) => {
                    c.start_timer(id, now)?;
                }
                Some(TimerStatus::Paused) => {
                    c.pause_timer(id, now)?;
                }
                Some(TimerStatus::Idle) => {
                    c.reset_timer(id)?;
                }
                Some(TimerStatus::Expired) | None => {}
            }
            Ok(())
        })
    }

    /// Reorder by a full permutation of the current ids.
    pub fn reorder_timers(&mut self, new_order: &[TimerId]) -> Result<TimerCollection> {
        let current: HashSet<TimerId> = self.timers.iter().map(|t| t.id).collect();
        let requested: HashSet<TimerId> = new_order.iter().copied().collect();
        if new_order.len() != self.timers.len() || requested != current {
            return Err(TimerError::InvalidOrder);
        }

        self.commit(|c| {
            let mut reordered = Vec::with_capacity(c.timers.len());
            for (order, id) in new_order.iter().enumerate() {
                let mut timer = c.get_mut(*id)?.clone();
                timer.order = order as u32;
                reordered.push(timer);
            }
            c.timers = reordered;
            Ok(())
        })
    }

    pub fn adjust_time(
        &mut self,
        id: TimerId,
        delta_seconds: f64,
        now: DateTime<Utc>,
    ) -> Result<TimerCollection> {
        self.commit(|c| c.correct(id, now, |state| state.adjust_time(delta_seconds)))
    }

    /// Advance every running or expired timer to `now`.
    pub fn tick(&mut self, now: DateTime<Utc>) -> CollectionTick {
        let mut report = CollectionTick::default();
        for timer in &mut self.timers {
            match timer.state.tick(now) {
                TickOutcome::Expired => {
                    info!(timer_id = %timer.id, name = %timer.name, "Timer expired");
                    report.expired.push(timer.id);
                }
                TickOutcome::Advanced | TickOutcome::Idle => {}
            }
            if timer.state.status.is_advancing() {
                report.advancing = true;
            }
        }
        report
    }

    /// Debug-build checks for impossible collection states
    pub fn assert_invariants(&self) {
        if let Some(active) = self.active_timer_id {
            debug_assert!(
                self.get(active).is_some(),
                "Active timer {} is not in the collection",
                active
            );
        }
        debug_assert!(
            self.running_count() <= 1,
            "{} timers running at once",
            self.running_count()
        );
        let unique: HashSet<TimerId> = self.timers.iter().map(|t| t.id).collect();
        debug_assert!(unique.len() == self.timers.len(), "Duplicate timer ids");
        debug_assert!(
            self.timers.windows(2).all(|w| w[0].order < w[1].order),
            "Timers out of order"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(seconds)
    }

    fn three_timers() -> (TimerCollection, Vec<TimerId>) {
        let mut c = TimerCollection::new();
        c.add_timer("Opening", 300.0, TimerVariant::Countdown, None).unwrap();
        c.add_timer("Keynote", 1800.0, TimerVariant::Countdown, Some("19:30")).unwrap();
        c.add_timer("Q&A", 0.0, TimerVariant::Countup, None).unwrap();
        let ids = c.timers.iter().map(|t| t.id).collect();
        (c, ids)
    }

    #[test]
    fn test_first_timer_becomes_active() {
        let (c, ids) = three_timers();
        assert_eq!(c.active_timer_id, Some(ids[0]));
        assert_eq!(c.timers.iter().map(|t| t.order).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(c.timers[1].scheduled_start_time.as_deref(), Some("19:30"));
    }

    #[test]
    fn test_add_timer_validation_leaves_state() {
        let (mut c, _) = three_timers();
        let before = c.clone();
        assert_eq!(
            c.add_timer("Bad", -5.0, TimerVariant::Countdown, None),
            Err(TimerError::InvalidDuration(-5.0))
        );
        assert!(c.add_timer("  ", 5.0, TimerVariant::Countdown, None).is_err());
        assert!(c.add_timer("Late", 5.0, TimerVariant::Countdown, Some("7pm")).is_err());
        assert_eq!(c, before);
    }

    #[test]
    fn test_starting_second_timer_pauses_first() {
        let (mut c, ids) = three_timers();
        c.start_timer(ids[0], t0()).unwrap();
        let snapshot = c.start_timer(ids[1], at(5)).unwrap();

        assert_eq!(snapshot.running_count(), 1);
        assert_eq!(snapshot.get(ids[0]).unwrap().state.status, TimerStatus::Paused);
        assert_eq!(snapshot.get(ids[0]).unwrap().state.elapsed_time, 5.0);
        assert_eq!(snapshot.get(ids[1]).unwrap().state.status, TimerStatus::Running);
    }

    #[test]
    fn test_delete_active_reassigns_to_first() {
        let (mut c, ids) = three_timers();
        c.select_timer(ids[1]).unwrap();
        let snapshot = c.delete_timer(ids[1]).unwrap();
        assert_eq!(snapshot.active_timer_id, Some(ids[0]));

        c.delete_timer(ids[0]).unwrap();
        assert_eq!(c.active_timer_id, Some(ids[2]));
        c.delete_timer(ids[2]).unwrap();
        assert_eq!(c.active_timer_id, None);
        assert!(c.is_empty());
    }

    #[test]
    fn test_delete_inactive_keeps_selection() {
        let (mut c, ids) = three_timers();
        c.delete_timer(ids[2]).unwrap();
        assert_eq!(c.active_timer_id, Some(ids[0]));
        assert_eq!(c.delete_timer(ids[2]), Err(TimerError::NotFound(ids[2])));
    }

    #[test]
    fn test_select_resets_runtime() {
        let (mut c, ids) = three_timers();
        c.start_timer(ids[1], t0()).unwrap();
        c.tick(at(30));
        c.select_timer(ids[1]).unwrap();
        let timer = c.get(ids[1]).unwrap();
        assert_eq!(timer.state.status, TimerStatus::Idle);
        assert_eq!(timer.state.current_time, 1800.0);
        assert_eq!(c.active_timer_id, Some(ids[1]));
    }

    #[test]
    fn test_update_status_running_enforces_exclusion() {
        let (mut c, ids) = three_timers();
        c.start_timer(ids[0], t0()).unwrap();
        let update = TimerUpdate {
            status: Some(TimerStatus::Running),
            ..Default::default()
        };
        c.update_timer(ids[2], update, at(2)).unwrap();
        assert_eq!(c.running_count(), 1);
        assert_eq!(c.get(ids[2]).unwrap().state.status, TimerStatus::Running);
    }

    #[test]
    fn test_update_rejects_expired_status_and_bad_fields_atomically() {
        let (mut c, ids) = three_timers();
        let before = c.clone();
        let update = TimerUpdate {
            status: Some(TimerStatus::Expired),
            ..Default::default()
        };
        assert!(c.update_timer(ids[0], update, t0()).is_err());

        let update = TimerUpdate {
            name: Some("Renamed".into()),
            duration: Some(-1.0),
            ..Default::default()
        };
        assert!(c.update_timer(ids[0], update, t0()).is_err());
        assert_eq!(c, before);
    }

    #[test]
    fn test_update_fields() {
        let (mut c, ids) = three_timers();
        let update = TimerUpdate {
            name: Some(" Closing ".into()),
            duration: Some(120.0),
            scheduled_start_time: Some("21:00".into()),
            ..Default::default()
        };
        c.update_timer(ids[0], update, t0()).unwrap();
        let timer = c.get(ids[0]).unwrap();
        assert_eq!(timer.name, "Closing");
        assert_eq!(timer.state.initial_time, 120.0);
        assert_eq!(timer.state.current_time, 120.0);
        assert_eq!(timer.scheduled_start_time.as_deref(), Some("21:00"));
    }

    #[test]
    fn test_update_duration_while_running_keeps_elapsed() {
        let (mut c, ids) = three_timers();
        c.start_timer(ids[0], t0()).unwrap();
        c.tick(at(100));
        c.update_timer_duration(ids[0], 600.0, at(100)).unwrap();
        let state = &c.get(ids[0]).unwrap().state;
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.current_time, 500.0);
    }

    #[test]
    fn test_update_type_resets() {
        let (mut c, ids) = three_timers();
        c.start_timer(ids[0], t0()).unwrap();
        c.update_timer_type(ids[0], TimerVariant::Countup).unwrap();
        let state = &c.get(ids[0]).unwrap().state;
        assert_eq!(state.variant, TimerVariant::Countup);
        assert_eq!(state.status, TimerStatus::Idle);
        assert_eq!(state.current_time, 0.0);
    }

    #[test]
    fn test_reorder() {
        let (mut c, ids) = three_timers();
        c.reorder_timers(&[ids[2], ids[0], ids[1]]).unwrap();
        assert_eq!(c.timers[0].id, ids[2]);
        assert_eq!(c.timers[0].order, 0);
        assert_eq!(c.timers[2].id, ids[1]);

        assert_eq!(c.reorder_timers(&[ids[0], ids[1]]), Err(TimerError::InvalidOrder));
        assert_eq!(
            c.reorder_timers(&[ids[0], ids[0], ids[1]]),
            Err(TimerError::InvalidOrder)
        );
    }

    #[test]
    fn test_adjust_time_on_collection() {
        let (mut c, ids) = three_timers();
        c.start_timer(ids[0], t0()).unwrap();
        c.tick(at(255));
        let snapshot = c.adjust_time(ids[0], -30.0, at(255)).unwrap();
        let state = &snapshot.get(ids[0]).unwrap().state;
        assert_eq!(state.current_time, 15.0);
        assert_eq!(state.initial_time, 300.0);
    }

    #[test]
    fn test_reviving_expired_timer_keeps_exclusion() {
        let (mut c, ids) = three_timers();
        c.start_timer(ids[0], t0()).unwrap();
        c.tick(at(301));
        assert_eq!(c.get(ids[0]).unwrap().state.status, TimerStatus::Expired);

        // An expired timer does not block starting another one.
        c.start_timer(ids[2], at(302)).unwrap();
        assert_eq!(c.get(ids[2]).unwrap().state.status, TimerStatus::Running);

        let snapshot = c.adjust_time(ids[0], 60.0, at(305)).unwrap();
        assert_eq!(snapshot.get(ids[0]).unwrap().state.status, TimerStatus::Running);
        assert_eq!(snapshot.get(ids[2]).unwrap().state.status, TimerStatus::Paused);
        assert_eq!(snapshot.running_count(), 1);

        c.tick(at(310));
        let state = &c.get(ids[0]).unwrap().state;
        assert!(state.current_time > 0.0 && state.current_time < 60.0);
    }

    #[test]
    fn test_longer_duration_revives_expired_timer() {
        let (mut c, ids) = three_timers();
        c.start_timer(ids[0], t0()).unwrap();
        c.tick(at(310));
        c.update_timer_duration(ids[0], 400.0, at(310)).unwrap();
        let state = &c.get(ids[0]).unwrap().state;
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.current_time, 90.0);
    }

    #[test]
    fn test_tick_reports_expiry_once() {
        let (mut c, ids) = three_timers();
        c.start_timer(ids[0], t0()).unwrap();
        let report = c.tick(at(301));
        assert_eq!(report.expired, vec![ids[0]]);
        assert!(report.advancing);
        assert!(c.tick(at(302)).expired.is_empty());
    }

    #[test]
    fn test_collection_serializes_active_id() {
        let (c, ids) = three_timers();
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["activeTimerId"], ids[0].to_string());
        assert_eq!(json["timers"][1]["scheduledStartTime"], "19:30");
    }
}
