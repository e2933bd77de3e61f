//! Current message, queue and presets

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::{OverlayError, Result};
use crate::timer::clock::seconds_between;

/// Default auto-hide delay in seconds
pub const DEFAULT_HIDE_AFTER: f64 = 10.0;

/// Messages allowed to wait behind the visible one
pub const MAX_QUEUED_MESSAGES: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub text: String,
    pub auto_hide: bool,
    /// Seconds the message stays up when `auto_hide` is set
    pub hide_after: f64,
    pub is_visible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shown_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(text: &str, auto_hide: bool, hide_after: f64) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(OverlayError::EmptyMessage);
        }
        if !hide_after.is_finite() || hide_after < 0.0 {
            return Err(OverlayError::InvalidHideAfter(hide_after));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            auto_hide,
            hide_after,
            is_visible: false,
            shown_at: None,
        })
    }

    fn show(&mut self, now: DateTime<Utc>) {
        self.is_visible = true;
        self.shown_at = Some(now);
    }

    /// Whether an auto-hide message has been up long enough to clear.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match (self.auto_hide, self.shown_at) {
            (true, Some(shown_at)) => seconds_between(shown_at, now) >= self.hide_after,
            _ => false,
        }
    }
}

/// Operator-defined canned message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreset {
    pub text: String,
    #[serde(default)]
    pub auto_hide: bool,
    #[serde(default = "default_hide_after")]
    pub hide_after: f64,
}

fn default_hide_after() -> f64 {
    DEFAULT_HIDE_AFTER
}

impl MessagePreset {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            auto_hide: true,
            hide_after: DEFAULT_HIDE_AFTER,
        }
    }
}

/// Messages shown over the timer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageBoard {
    pub current_message: Option<Message>,
    pub message_queue: VecDeque<Message>,
    presets: Vec<MessagePreset>,
}

impl MessageBoard {
    pub fn with_presets(presets: Vec<MessagePreset>) -> Self {
        Self {
            presets,
            ..Default::default()
        }
    }

    pub fn presets(&self) -> &[MessagePreset] {
        &self.presets
    }

    /// Replace replicated fields from a fetched document.
    pub fn restore(&mut self, current: Option<Message>, queue: Vec<Message>) {
        self.current_message = current;
        self.message_queue = queue.into();
    }

    /// Show a message now, or queue it behind the visible one.
    pub fn show_message(
        &mut self,
        text: &str,
        auto_hide: bool,
        hide_after: f64,
        now: DateTime<Utc>,
    ) -> Result<Message> {
        let message = Message::new(text, auto_hide, hide_after)?;
        self.enqueue(message, now)
    }

    pub fn show_preset_message(&mut self, index: usize, now: DateTime<Utc>) -> Result<Message> {
        let preset = self
            .presets
            .get(index)
            .cloned()
            .ok_or(OverlayError::UnknownPreset(index))?;
        self.show_message(&preset.text, preset.auto_hide, preset.hide_after, now)
    }

    fn enqueue(&mut self, mut message: Message, now: DateTime<Utc>) -> Result<Message> {
        let busy = self.current_message.as_ref().is_some_and(|m| m.is_visible);
        if busy {
            if self.message_queue.len() >= MAX_QUEUED_MESSAGES {
                return Err(OverlayError::QueueFull(MAX_QUEUED_MESSAGES));
            }
            debug!(message_id = %message.id, queued = self.message_queue.len() + 1, "Queueing message");
            self.message_queue.push_back(message.clone());
        } else {
            message.show(now);
            info!(message_id = %message.id, "Showing message");
            self.current_message = Some(message.clone());
        }
        Ok(message)
    }

    /// Hide the current message and promote the next queued one.
    pub fn clear_message(&mut self, now: DateTime<Utc>) -> Option<&Message> {
        self.current_message = self.message_queue.pop_front().map(|mut next| {
            next.show(now);
            next
        });
        self.current_message.as_ref()
    }

    pub fn clear_all_messages(&mut self) {
        self.current_message = None;
        self.message_queue.clear();
    }

    /// Clear the current message if its auto-hide delay has passed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> bool {
        let due = self.current_message.as_ref().is_some_and(|m| m.is_due(now));
        if due {
            debug!("Auto-hiding message");
            self.clear_message(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 18, 0, 0).unwrap()
    }

    #[test]
    fn test_show_then_queue() {
        let mut board = MessageBoard::default();
        let first = board.show_message("Wrap up", false, 0.0, t0()).unwrap();
        let second = board.show_message("Next: Q&A", false, 0.0, t0()).unwrap();

        assert_eq!(board.current_message.as_ref().unwrap().id, first.id);
        assert!(board.current_message.as_ref().unwrap().is_visible);
        assert_eq!(board.message_queue.len(), 1);
        assert_eq!(board.message_queue[0].id, second.id);
        assert!(!board.message_queue[0].is_visible);
    }

    #[test]
    fn test_queue_is_bounded() {
        let mut board = MessageBoard::default();
        board.show_message("live", false, 0.0, t0()).unwrap();
        for n in 0..MAX_QUEUED_MESSAGES {
            board.show_message(&format!("queued {n}"), false, 0.0, t0()).unwrap();
        }

        let err = board.show_message("one too many", false, 0.0, t0()).unwrap_err();
        assert_eq!(err, OverlayError::QueueFull(MAX_QUEUED_MESSAGES));
        assert_eq!(board.message_queue.len(), MAX_QUEUED_MESSAGES);
        assert_eq!(board.message_queue.back().unwrap().text, format!("queued {}", MAX_QUEUED_MESSAGES - 1));

        // Room frees up once the head is promoted.
        board.clear_message(t0());
        board.show_message("fits again", false, 0.0, t0()).unwrap();
        assert_eq!(board.message_queue.back().unwrap().text, "fits again");
    }

    #[test]
    fn test_clear_promotes_fifo() {
        let mut board = MessageBoard::default();
        board.show_message("one", false, 0.0, t0()).unwrap();
        board.show_message("two", false, 0.0, t0()).unwrap();
        board.show_message("three", false, 0.0, t0()).unwrap();

        assert_eq!(board.clear_message(t0()).unwrap().text, "two");
        assert_eq!(board.clear_message(t0()).unwrap().text, "three");
        assert!(board.clear_message(t0()).is_none());
    }

    #[test]
    fn test_rejects_empty_text() {
        let mut board = MessageBoard::default();
        assert_eq!(
            board.show_message("   ", false, 0.0, t0()),
            Err(OverlayError::EmptyMessage)
        );
        assert!(board.show_message("ok", true, -1.0, t0()).is_err());
        assert!(board.current_message.is_none());
    }

    #[test]
    fn test_auto_hide() {
        let mut board = MessageBoard::default();
        board.show_message("Five minutes", true, 10.0, t0()).unwrap();
        board.show_message("Mic check", false, 0.0, t0()).unwrap();

        assert!(!board.expire(t0() + Duration::seconds(9)));
        assert!(board.expire(t0() + Duration::seconds(10)));
        let current = board.current_message.as_ref().unwrap();
        assert_eq!(current.text, "Mic check");
        assert!(!board.expire(t0() + Duration::seconds(100)));
    }

    #[test]
    fn test_presets() {
        let mut board = MessageBoard::with_presets(vec![MessagePreset::new("Please be seated")]);
        let shown = board.show_preset_message(0, t0()).unwrap();
        assert_eq!(shown.text, "Please be seated");
        assert!(shown.auto_hide);
        assert_eq!(board.show_preset_message(3, t0()), Err(OverlayError::UnknownPreset(3)));
    }

    #[test]
    fn test_clear_all() {
        let mut board = MessageBoard::default();
        board.show_message("a", false, 0.0, t0()).unwrap();
        board.show_message("b", false, 0.0, t0()).unwrap();
        board.clear_all_messages();
        assert!(board.current_message.is_none());
        assert!(board.message_queue.is_empty());
    }
}
