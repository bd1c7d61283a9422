//! # Step payloads as pushed by callers.
//!
//! A [`StepPayload`] is what the execution driver hands to
//! [`StepManager::push`](crate::StepManager::push). The core only reads
//! `id`, `name` and `kind`; everything else is carried through untouched.
//!
//! ## Example
//! ```rust
//! use steptrace::{StepKind, StepPayload};
//!
//! let start = StepPayload::new("call-1", "llm", StepKind::LlmStart)
//!     .with_input(serde_json::json!("hello"));
//! let token = start.chunk(serde_json::json!("wor"));
//! let end = start.closing().with_output(serde_json::json!("world"));
//!
//! assert_eq!(token.kind, StepKind::LlmNewToken);
//! assert_eq!(end.kind, StepKind::LlmEnd);
//! assert_eq!(end.id, start.id);
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kind::{StepCategory, StepKind};

/// Opaque data attached to a step event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    pub input: Option<Value>,
    pub output: Option<Value>,
    pub chunk: Option<Value>,
}

/// One observed step event, before ancestry is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPayload {
    /// Caller-supplied identifier, shared by the start, chunk and end events of one step.
    pub id: Arc<str>,
    /// Human-readable label.
    pub name: Arc<str>,
    /// Event classification.
    pub kind: StepKind,
    /// Framework that produced the step, if any.
    pub framework: Option<Arc<str>>,
    /// Optional input/output/chunk data.
    pub data: Option<StepData>,
    /// Free-form metadata.
    pub metadata: Option<Value>,
    /// Wall-clock time the payload was built.
    pub created_at: SystemTime,
}

impl StepPayload {
    /// Creates a payload stamped with the current time.
    pub fn new(id: impl Into<Arc<str>>, name: impl Into<Arc<str>>, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            framework: None,
            data: None,
            metadata: None,
            created_at: SystemTime::now(),
        }
    }

    /// Builds the end payload matching this step (same id and name).
    pub fn closing(&self) -> Self {
        let mut end = Self::new(Arc::clone(&self.id), Arc::clone(&self.name), self.kind.end_kind());
        end.framework = self.framework.clone();
        end
    }

    /// Builds an intermediate payload for this step carrying `chunk`.
    ///
    /// Only LLM steps have a chunk kind of their own (`LLM_NEW_TOKEN`). Tool,
    /// task, workflow, function and custom steps get `SPAN_CHUNK`, so the
    /// chunk's category is `Span` rather than the step's. Ancestry is still
    /// matched by id. Build the payload with [`StepPayload::new`] to pick
    /// another kind.
    pub fn chunk(&self, chunk: Value) -> Self {
        let kind = match self.kind.category() {
            StepCategory::Llm => StepKind::LlmNewToken,
            _ => StepKind::SpanChunk,
        };
        let mut ev = Self::new(Arc::clone(&self.id), Arc::clone(&self.name), kind);
        ev.framework = self.framework.clone();
        ev.data_mut().chunk = Some(chunk);
        ev
    }

    #[inline]
    pub fn with_framework(mut self, framework: impl Into<Arc<str>>) -> Self {
        self.framework = Some(framework.into());
        self
    }

    #[inline]
    pub fn with_input(mut self, input: Value) -> Self {
        self.data_mut().input = Some(input);
        self
    }

    #[inline]
    pub fn with_output(mut self, output: Value) -> Self {
        self.data_mut().output = Some(output);
        self
    }

    #[inline]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    fn data_mut(&mut self) -> &mut StepData {
        self.data.get_or_insert_with(StepData::default)
    }
}
