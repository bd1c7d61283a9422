//! # Outstanding-step registry.
//!
//! Branch-independent record of which steps are open. Keyed by step id,
//! shared by every branch of one [`StepManager`](crate::StepManager).
//!
//! ## Architecture
//! ```text
//! START(id) ──► open(entry)   ─► insert if absent (else AlreadyOpen)
//! CHUNK(id) ──► lookup(id)    ─► Arc<entry> or None (read-only)
//! END(id)   ──► close(id)     ─► remove and return, or None
//! ```
//!
//! ## Rules
//! - The registry, not any branch stack, decides whether a step is open.
//! - Each operation holds the lock only for the map access itself.
//! - Entries leave only through `close`; nothing expires.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::branch::BranchId;
use crate::error::TraceError;
use crate::events::{FunctionAncestry, StepPayload};

/// Bookkeeping for one open step.
#[derive(Debug, Clone)]
pub struct OutstandingEntry {
    /// The start payload as pushed.
    pub payload: StepPayload,
    /// Ancestry resolved when the step opened.
    pub ancestry: FunctionAncestry,
    /// Branch that opened the step.
    pub branch: BranchId,
}

impl OutstandingEntry {
    #[inline]
    pub fn id(&self) -> &str {
        &self.payload.id
    }
}

/// Concurrent map of open steps.
#[derive(Debug, Default)]
pub struct OutstandingRegistry {
    steps: RwLock<HashMap<Arc<str>, Arc<OutstandingEntry>>>,
}

impl OutstandingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an open step and returns the number of open steps afterwards.
    ///
    /// If the id is already open the existing entry is kept and
    /// [`TraceError::AlreadyOpen`] is returned.
    pub fn open(&self, entry: OutstandingEntry) -> Result<usize, TraceError> {
        let mut steps = self.steps.write();
        match steps.entry(Arc::clone(&entry.payload.id)) {
            Entry::Occupied(_) => Err(TraceError::AlreadyOpen {
                id: entry.payload.id.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(entry));
                Ok(steps.len())
            }
        }
    }

    /// Removes and returns the entry for `id`, if open.
    pub fn close(&self, id: &str) -> Option<Arc<OutstandingEntry>> {
        self.steps.write().remove(id)
    }

    /// Returns the entry for `id` without modifying the registry.
    pub fn lookup(&self, id: &str) -> Option<Arc<OutstandingEntry>> {
        self.steps.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.steps.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.steps.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.read().is_empty()
    }

    /// Returns sorted list of open step ids.
    pub fn open_ids(&self) -> Vec<String> {
        let steps = self.steps.read();
        let mut ids: Vec<String> = steps.keys().map(|k| k.to_string()).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::BranchContext;
    use crate::events::StepKind;

    fn entry(id: &str, parent: &str) -> OutstandingEntry {
        let payload = StepPayload::new(id, id, StepKind::SpanStart);
        let ancestry =
            FunctionAncestry::new(&payload, Some(Arc::from(parent)), Some(Arc::from(parent)));
        OutstandingEntry {
            payload,
            ancestry,
            branch: BranchContext::root().id(),
        }
    }

    #[test]
    fn test_open_close_roundtrip() {
        let reg = OutstandingRegistry::new();
        assert_eq!(reg.open(entry("a", "root")), Ok(1));
        assert!(reg.contains("a"));

        let closed = reg.close("a").expect("entry");
        assert_eq!(closed.id(), "a");
        assert_eq!(closed.ancestry.parent_id.as_deref(), Some("root"));
        assert!(reg.is_empty());
        assert!(reg.close("a").is_none());
    }

    #[test]
    fn test_duplicate_open_keeps_first() {
        let reg = OutstandingRegistry::new();
        reg.open(entry("a", "first")).unwrap();
        let err = reg.open(entry("a", "second")).unwrap_err();
        assert_eq!(err, TraceError::AlreadyOpen { id: "a".into() });

        let kept = reg.lookup("a").unwrap();
        assert_eq!(kept.ancestry.parent_id.as_deref(), Some("first"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_lookup_does_not_remove() {
        let reg = OutstandingRegistry::new();
        reg.open(entry("b", "root")).unwrap();
        reg.open(entry("a", "root")).unwrap();
        assert!(reg.lookup("a").is_some());
        assert!(reg.lookup("missing").is_none());
        assert_eq!(reg.open_ids(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_concurrent_open_close_loses_nothing() {
        let reg = Arc::new(OutstandingRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let id = format!("{t}-{i}");
                        reg.open(entry(&id, "root")).unwrap();
                        if i % 2 == 0 {
                            assert!(reg.close(&id).is_some());
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.len(), 8 * 100);
    }
}
