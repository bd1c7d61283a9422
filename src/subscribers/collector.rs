//! # Event collector.
//!
//! [`StepCollector`] accumulates every event it receives, optionally keeping
//! only some kinds. A driver subscribes one before invoking traced work and
//! takes the ordered list afterwards (see
//! [`StepManager::collect`](crate::StepManager::collect)).

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::events::{StepEvent, StepKind};

use super::Subscribe;

/// Subscriber that records events in delivery order.
#[derive(Debug, Default)]
pub struct StepCollector {
    filter: Option<HashSet<StepKind>>,
    events: Mutex<Vec<StepEvent>>,
}

impl StepCollector {
    /// Collector that keeps every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector that keeps only the given kinds.
    pub fn with_filter(kinds: impl IntoIterator<Item = StepKind>) -> Self {
        Self {
            filter: Some(kinds.into_iter().collect()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Returns true if events of `kind` are kept.
    pub fn accepts(&self, kind: StepKind) -> bool {
        self.filter.as_ref().is_none_or(|f| f.contains(&kind))
    }

    /// Copy of the events collected so far.
    pub fn snapshot(&self) -> Vec<StepEvent> {
        self.events.lock().clone()
    }

    /// Drains the events collected so far.
    pub fn take(&self) -> Vec<StepEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl Subscribe for StepCollector {
    fn on_event(&self, event: &StepEvent) {
        if self.accepts(event.kind()) {
            self.events.lock().push(event.clone());
        }
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}
