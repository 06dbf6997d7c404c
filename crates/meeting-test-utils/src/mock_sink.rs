//! Diagnostic sink that keeps every forwarded event.

use meeting_client::diagnostics::{DiagnosticEvent, DiagnosticSink};
use std::sync::{Arc, Mutex};

/// Records forwarded diagnostic events for assertions.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DiagnosticEvent>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events forwarded so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Names of the events forwarded so far.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.name.clone())
            .collect()
    }
}

impl DiagnosticSink for RecordingSink {
    fn forward(&self, event: DiagnosticEvent) {
        self.events.lock().unwrap().push(event);
    }
}
