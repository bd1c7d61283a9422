//! # Finalized step events delivered to subscribers.
//!
//! A [`StepEvent`] is a [`StepPayload`] plus the [`FunctionAncestry`]
//! resolved at push time. Events are immutable once built; the bus hands the
//! same value to every subscriber.
//!
//! ## Ordering guarantees
//! Each event has a process-wide sequence number (`seq`) that increases
//! monotonically. Within one branch `seq` follows push order; across branches
//! it only reflects which push reached the manager first.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::kind::{StepKind, StepState};
use super::payload::StepPayload;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Who a step is and who it was called from.
///
/// Computed once when the step opens. Chunk and end events reuse the value
/// recorded at open time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionAncestry {
    pub function_id: Arc<str>,
    pub function_name: Arc<str>,
    pub parent_id: Option<Arc<str>>,
    pub parent_name: Option<Arc<str>>,
}

impl FunctionAncestry {
    /// Ancestry of a step opened under `parent`.
    pub(crate) fn new(
        payload: &StepPayload,
        parent_id: Option<Arc<str>>,
        parent_name: Option<Arc<str>>,
    ) -> Self {
        Self {
            function_id: Arc::clone(&payload.id),
            function_name: Arc::clone(&payload.name),
            parent_id,
            parent_name,
        }
    }
}

/// Step event with resolved ancestry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock time of emission.
    pub emitted_at: SystemTime,
    /// Payload exactly as pushed.
    pub payload: StepPayload,
    /// Ancestry attached at push time.
    pub ancestry: FunctionAncestry,
    /// For end events: when the matching start payload was created.
    pub span_started_at: Option<SystemTime>,
}

impl StepEvent {
    pub(crate) fn new(payload: StepPayload, ancestry: FunctionAncestry) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            emitted_at: SystemTime::now(),
            payload,
            ancestry,
            span_started_at: None,
        }
    }

    #[inline]
    pub(crate) fn with_span_start(mut self, at: SystemTime) -> Self {
        self.span_started_at = Some(at);
        self
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.payload.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.payload.name
    }

    #[inline]
    pub fn kind(&self) -> StepKind {
        self.payload.kind
    }

    #[inline]
    pub fn parent_id(&self) -> Option<&str> {
        self.ancestry.parent_id.as_deref()
    }

    #[inline]
    pub fn parent_name(&self) -> Option<&str> {
        self.ancestry.parent_name.as_deref()
    }

    #[inline]
    pub fn is_start(&self) -> bool {
        self.payload.kind.state() == StepState::Start
    }

    #[inline]
    pub fn is_end(&self) -> bool {
        self.payload.kind.state() == StepState::End
    }
}
