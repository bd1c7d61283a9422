//! # Step manager: push protocol.
//!
//! [`StepManager`] turns pushed [`StepPayload`]s into [`StepEvent`]s with
//! ancestry and hands them to its subscribers.
//!
//! ## Push protocol
//! ```text
//! push(payload) ─► kind.state()
//!   ├─ Start ─► prune closed frames off the issuing branch
//!   │           ancestry = resolve(branch top)
//!   │           registry.open(entry) ─► ok: branch.push_local(ancestry)
//!   │                                └─► AlreadyOpen: warn, branch untouched
//!   ├─ Chunk ─► registry.lookup(id) ─► found: stored ancestry
//!   │                               └─► missing: warn, best-effort ancestry
//!   └─ End   ─► registry.close(id)  ─► found: stored ancestry, branch.pop_local(id)
//!                                   └─► missing: warn, best-effort ancestry
//!   then ─► bus.emit(&event)  (after the branch borrow is released)
//! ```
//!
//! ## Rules
//! - Step state: unseen → open → (chunks) → closed. Closed is terminal;
//!   re-opening a closed id is caller misuse and is not detected.
//! - Chunk/end events carry the ancestry recorded when the step opened,
//!   whatever happened on any branch since.
//! - The end of a step may be pushed from another branch; the opening branch
//!   drops the stale frame the next time it opens a step.
//! - Anomalies are logged and never surface to the caller.

use std::future::Future;
use std::sync::Arc;

use crate::branch::{self, BranchContext};
use crate::config::Config;
use crate::error::TraceError;
use crate::events::{FunctionAncestry, StepEvent, StepPayload, StepState};
use crate::subscribers::{
    FnSubscriber, StepCollector, Subscribe, SubscriptionBus, SubscriptionId,
};

use super::ancestry;
use super::registry::{OutstandingEntry, OutstandingRegistry};

struct Inner {
    cfg: Config,
    registry: OutstandingRegistry,
    bus: SubscriptionBus,
}

/// Tracks open steps across branches and fans finalized events out.
///
/// Cheap to clone; clones share the registry and subscribers.
///
/// ## Example
/// ```rust
/// use steptrace::{StepKind, StepManager, StepPayload};
///
/// let mgr = StepManager::new();
/// let outer = StepPayload::new("outer", "outer", StepKind::FunctionStart);
/// let inner = StepPayload::new("inner", "inner", StepKind::ToolStart);
///
/// let ((), events) = mgr.collect(|| {
///     mgr.push(outer.clone());
///     mgr.push(inner.clone());
///     mgr.push(inner.closing());
///     mgr.push(outer.closing());
/// });
///
/// assert_eq!(events.len(), 4);
/// assert_eq!(events[1].parent_id(), Some("outer"));
/// assert_eq!(events[0].parent_id(), Some("root"));
/// assert!(mgr.outstanding().is_empty());
/// ```
#[derive(Clone)]
pub struct StepManager {
    inner: Arc<Inner>,
}

impl StepManager {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(cfg: Config) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                registry: OutstandingRegistry::new(),
                bus: SubscriptionBus::new(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.cfg
    }

    /// Registry of currently open steps.
    pub fn outstanding(&self) -> &OutstandingRegistry {
        &self.inner.registry
    }

    /// Subscribers of this manager.
    pub fn bus(&self) -> &SubscriptionBus {
        &self.inner.bus
    }

    /// Records one step event from the issuing branch and delivers it.
    ///
    /// Returns after every subscriber has handled the event.
    pub fn push(&self, payload: StepPayload) {
        let event = match payload.kind.state() {
            StepState::Start => self.open(payload),
            StepState::Chunk => self.chunk(payload),
            StepState::End => self.close(payload),
        };

        if self.inner.cfg.log_events {
            tracing::trace!(
                seq = event.seq,
                step_id = event.id(),
                step_name = event.name(),
                kind = %event.kind(),
                parent_id = event.parent_id().unwrap_or("-"),
                "step event"
            );
        }
        self.inner.bus.emit(&event);
    }

    fn open(&self, payload: StepPayload) -> StepEvent {
        let registry = &self.inner.registry;

        let (ancestry, opened) = branch::with_current(|branch| {
            branch.prune_closed(|id| registry.contains(id));
            let ancestry = ancestry::resolve(&payload, branch.active_function());
            let entry = OutstandingEntry {
                payload: payload.clone(),
                ancestry: ancestry.clone(),
                branch: branch.id(),
            };
            let opened = registry.open(entry);
            if opened.is_ok() {
                branch.push_local(ancestry.clone());
            }
            (ancestry, opened)
        });

        match opened {
            Ok(open) => self.check_watermark(open),
            Err(err) => {
                tracing::warn!(
                    step_id = &*payload.id,
                    step_name = &*payload.name,
                    kind = %payload.kind,
                    error = err.as_label(),
                    "step opened twice without an end; keeping the first start"
                );
            }
        }

        StepEvent::new(payload, ancestry)
    }

    fn chunk(&self, payload: StepPayload) -> StepEvent {
        match self.inner.registry.lookup(&payload.id) {
            Some(entry) => StepEvent::new(payload, entry.ancestry.clone()),
            None => {
                self.warn_unmatched(&payload);
                let ancestry = self.best_effort(&payload);
                StepEvent::new(payload, ancestry)
            }
        }
    }

    fn close(&self, payload: StepPayload) -> StepEvent {
        match self.inner.registry.close(&payload.id) {
            Some(entry) => {
                let held = branch::with_current(|branch| {
                    (branch.pop_local(&payload.id), branch.id())
                });
                if let (false, issuing) = held {
                    tracing::debug!(
                        step_id = &*payload.id,
                        opened_on = %entry.branch,
                        closed_on = %issuing,
                        "step closed from a branch that did not open it"
                    );
                }
                StepEvent::new(payload, entry.ancestry.clone())
                    .with_span_start(entry.payload.created_at)
            }
            None => {
                self.warn_unmatched(&payload);
                let ancestry = self.best_effort(&payload);
                StepEvent::new(payload, ancestry)
            }
        }
    }

    /// Parent taken from the innermost still-open frame of the issuing branch.
    fn best_effort(&self, payload: &StepPayload) -> FunctionAncestry {
        let registry = &self.inner.registry;
        branch::with_current(|branch| {
            ancestry::resolve(payload, branch.innermost_open(|id| registry.contains(id)))
        })
    }

    fn warn_unmatched(&self, payload: &StepPayload) {
        let err = TraceError::NotOpen {
            id: payload.id.to_string(),
        };
        tracing::warn!(
            step_id = &*payload.id,
            step_name = &*payload.name,
            kind = %payload.kind,
            error = err.as_label(),
            "{err}; emitting with best-effort ancestry"
        );
    }

    fn check_watermark(&self, open: usize) {
        if let Some(mark) = self.inner.cfg.outstanding_watermark() {
            if open % mark == 0 {
                tracing::warn!(
                    outstanding = open,
                    watermark = mark,
                    "outstanding steps reached watermark; unclosed steps are never evicted"
                );
            }
        }
    }

    /// Registers a subscriber; see [`SubscriptionBus::subscribe`].
    pub fn subscribe(&self, sub: Arc<dyn Subscribe>) -> SubscriptionId {
        self.inner.bus.subscribe(sub)
    }

    /// Registers a closure as a subscriber.
    pub fn subscribe_fn<F>(&self, name: &'static str, f: F) -> SubscriptionId
    where
        F: Fn(&StepEvent) + Send + Sync + 'static,
    {
        self.inner.bus.subscribe(Arc::new(FnSubscriber { name, f }))
    }

    /// Removes a subscriber; see [`SubscriptionBus::unsubscribe`].
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TraceError> {
        self.inner.bus.unsubscribe(id)
    }

    /// Runs `f` and returns its result with every event delivered meanwhile.
    ///
    /// Events pushed from other branches while `f` runs are included too.
    pub fn collect<R>(&self, f: impl FnOnce() -> R) -> (R, Vec<StepEvent>) {
        let collector = Arc::new(StepCollector::new());
        let guard = self.scoped_subscription(Arc::clone(&collector) as Arc<dyn Subscribe>);
        let out = f();
        drop(guard);
        (out, collector.take())
    }

    /// Async counterpart of [`collect`](Self::collect).
    pub async fn collect_async<F: Future>(&self, fut: F) -> (F::Output, Vec<StepEvent>) {
        let collector = Arc::new(StepCollector::new());
        let guard = self.scoped_subscription(Arc::clone(&collector) as Arc<dyn Subscribe>);
        let out = fut.await;
        drop(guard);
        (out, collector.take())
    }

    fn scoped_subscription(&self, sub: Arc<dyn Subscribe>) -> SubscriptionGuard<'_> {
        SubscriptionGuard {
            mgr: self,
            id: self.subscribe(sub),
        }
    }

    /// Snapshot of the issuing branch.
    pub fn current_branch(&self) -> BranchContext {
        branch::current()
    }
}

impl Default for StepManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StepManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepManager")
            .field("outstanding", &self.inner.registry.len())
            .field("bus", &self.inner.bus)
            .finish()
    }
}

/// Unsubscribes on drop, also when the collected work panics or is cancelled.
struct SubscriptionGuard<'a> {
    mgr: &'a StepManager,
    id: SubscriptionId,
}

impl Drop for SubscriptionGuard<'_> {
    fn drop(&mut self) {
        let _ = self.mgr.unsubscribe(self.id);
    }
}
