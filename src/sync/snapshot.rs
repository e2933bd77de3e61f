//! The replicated document and field-level patches

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::overlay::Message;
use crate::timer::TimerCollection;

/// Top-level document field names
pub mod fields {
    pub const TIMERS: &str = "timers";
    pub const CURRENT_MESSAGE: &str = "currentMessage";
    pub const MESSAGE_QUEUE: &str = "messageQueue";
    pub const SETTINGS: &str = "settings";
    pub const BLACKOUT_MODE: &str = "blackoutMode";
    pub const FLASH_MODE: &str = "flashMode";
    pub const LAST_UPDATED: &str = "lastUpdated";
    pub const CONTROLLER_ACTIVE: &str = "controllerActive";
}

/// Presentation options carried to displays
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplaySettings {
    pub show_progress: bool,
    pub show_timer_name: bool,
    /// Remaining seconds at which a countdown turns to warning
    pub warning_seconds: f64,
    /// Remaining seconds at which a countdown turns critical
    pub critical_seconds: f64,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_progress: true,
            show_timer_name: true,
            warning_seconds: 60.0,
            critical_seconds: 15.0,
        }
    }
}

/// Complete replicated state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SharedSnapshot {
    pub timers: TimerCollection,
    pub current_message: Option<Message>,
    pub message_queue: Vec<Message>,
    pub settings: DisplaySettings,
    pub blackout_mode: bool,
    pub flash_mode: bool,
    /// Assigned by the store on every write
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    pub controller_active: bool,
}

impl SharedSnapshot {
    /// Parse a stored document.
    pub fn from_document(document: Value) -> serde_json::Result<Self> {
        serde_json::from_value(document)
    }

    /// Every field a writer may set, i.e. all but `lastUpdated`.
    pub fn to_fields(&self) -> serde_json::Result<Map<String, Value>> {
        let mut map = match serde_json::to_value(self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        map.remove(fields::LAST_UPDATED);
        Ok(map)
    }
}

/// Top-level fields to merge into the document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotPatch {
    fields: Map<String, Value>,
}

impl SnapshotPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set one top-level field. `lastUpdated` is owned by the store and
    /// silently dropped.
    pub fn set<T: Serialize>(mut self, field: &str, value: &T) -> serde_json::Result<Self> {
        if field != fields::LAST_UPDATED {
            self.fields.insert(field.to_string(), serde_json::to_value(value)?);
        }
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.keys().map(String::as_str).collect()
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for SnapshotPatch {
    fn from(mut fields: Map<String, Value>) -> Self {
        fields.remove(fields::LAST_UPDATED);
        Self { fields }
    }
}
