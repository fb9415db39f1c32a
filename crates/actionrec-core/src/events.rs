//! Captured action events
//!
//! One `Event` per `action_performed()` call. Stored as compact JSON
//! (`{"trigger":true,"duration":120}`) so every backend sees the same columns.

use serde::{Deserialize, Serialize};

/// Column holding whether the action was triggered
pub const COL_TRIGGER: &str = "trigger";
/// Column holding the milliseconds since the previous event
pub const COL_DURATION: &str = "duration";

/// Columns every persisted sequence is created with, in storage order
pub const COLUMNS: [&str; 2] = [COL_TRIGGER, COL_DURATION];

/// Single captured action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "trigger")]
    pub triggered: bool,
    /// Milliseconds since the previous event (or since recording started)
    #[serde(rename = "duration")]
    pub elapsed_millis: i64,
}

impl Event {
    pub fn triggered(elapsed_millis: i64) -> Self {
        Self {
            triggered: true,
            elapsed_millis,
        }
    }

    /// Delay to wait before firing this event, negative values clamp to zero
    pub fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.elapsed_millis.max(0) as u64)
    }
}

/// Events of one recording session, in capture order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Take the captured events, leaving an empty log behind
    pub fn take(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Sum of all delays, i.e. the length of one playback cycle
    pub fn total_millis(&self) -> i64 {
        self.events.iter().map(|e| e.elapsed_millis).sum()
    }
}

impl From<Vec<Event>> for EventLog {
    fn from(events: Vec<Event>) -> Self {
        Self { events }
    }
}

impl IntoIterator for EventLog {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

/// Lifecycle of a recorder. At most one non-idle state at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    Recording = 1,
    Playing = 2,
}

impl SessionState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => SessionState::Recording,
            2 => SessionState::Playing,
            _ => SessionState::Idle,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Recording => write!(f, "recording"),
            SessionState::Playing => write!(f, "playing"),
        }
    }
}
