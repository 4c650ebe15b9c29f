// src/engine/events.rs

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use crate::types::{Event, EventType};

/// Append-only in-memory event log. Not persisted.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<Event>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emit(&self, kind: EventType, payload: Value) {
        trace!(?kind, "event emitted");
        self.events.lock().push(Event::new(kind, payload));
    }

    /// Copy of all events so far.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn count(&self, kind: EventType) -> usize {
        self.events.lock().iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
