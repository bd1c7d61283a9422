//! # Step event classification.
//!
//! [`StepKind`] is a closed set of event kinds. Each kind belongs to a
//! subsystem ([`StepCategory`]) and plays one role in a step's lifecycle
//! ([`StepState`]):
//!
//! ```text
//!             Start            Chunk          End
//! Llm         LLM_START        LLM_NEW_TOKEN  LLM_END
//! Tool        TOOL_START       -              TOOL_END
//! Workflow    WORKFLOW_START   -              WORKFLOW_END
//! Task        TASK_START       -              TASK_END
//! Function    FUNCTION_START   -              FUNCTION_END
//! Custom      CUSTOM_START     -              CUSTOM_END
//! Span        SPAN_START       SPAN_CHUNK     SPAN_END
//! ```
//!
//! The table is resolved once per push; the manager only ever looks at
//! [`StepKind::state`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle role of an event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepState {
    /// Opens a step.
    Start,
    /// Intermediate event on an open step (streamed token, progress, ...).
    Chunk,
    /// Closes a step.
    End,
}

/// Subsystem that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepCategory {
    Llm,
    Tool,
    Workflow,
    Task,
    Function,
    Custom,
    Span,
}

/// Classification of step events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    // === Model calls ===
    LlmStart,
    LlmNewToken,
    LlmEnd,

    // === Tool calls ===
    ToolStart,
    ToolEnd,

    // === Workflow ===
    WorkflowStart,
    WorkflowEnd,

    // === Task ===
    TaskStart,
    TaskEnd,

    // === Function ===
    FunctionStart,
    FunctionEnd,

    // === User-defined ===
    CustomStart,
    CustomEnd,

    // === Generic spans ===
    SpanStart,
    SpanChunk,
    SpanEnd,
}

impl StepKind {
    /// Every kind, in declaration order.
    pub const ALL: [StepKind; 16] = [
        StepKind::LlmStart,
        StepKind::LlmNewToken,
        StepKind::LlmEnd,
        StepKind::ToolStart,
        StepKind::ToolEnd,
        StepKind::WorkflowStart,
        StepKind::WorkflowEnd,
        StepKind::TaskStart,
        StepKind::TaskEnd,
        StepKind::FunctionStart,
        StepKind::FunctionEnd,
        StepKind::CustomStart,
        StepKind::CustomEnd,
        StepKind::SpanStart,
        StepKind::SpanChunk,
        StepKind::SpanEnd,
    ];

    /// Returns the `(category, state)` pair for this kind.
    #[inline]
    pub const fn classify(self) -> (StepCategory, StepState) {
        use StepCategory as C;
        use StepState as S;
        match self {
            StepKind::LlmStart => (C::Llm, S::Start),
            StepKind::LlmNewToken => (C::Llm, S::Chunk),
            StepKind::LlmEnd => (C::Llm, S::End),
            StepKind::ToolStart => (C::Tool, S::Start),
            StepKind::ToolEnd => (C::Tool, S::End),
            StepKind::WorkflowStart => (C::Workflow, S::Start),
            StepKind::WorkflowEnd => (C::Workflow, S::End),
            StepKind::TaskStart => (C::Task, S::Start),
            StepKind::TaskEnd => (C::Task, S::End),
            StepKind::FunctionStart => (C::Function, S::Start),
            StepKind::FunctionEnd => (C::Function, S::End),
            StepKind::CustomStart => (C::Custom, S::Start),
            StepKind::CustomEnd => (C::Custom, S::End),
            StepKind::SpanStart => (C::Span, S::Start),
            StepKind::SpanChunk => (C::Span, S::Chunk),
            StepKind::SpanEnd => (C::Span, S::End),
        }
    }

    #[inline]
    pub const fn category(self) -> StepCategory {
        self.classify().0
    }

    #[inline]
    pub const fn state(self) -> StepState {
        self.classify().1
    }

    /// Stable wire name, e.g. `"LLM_START"`.
    pub const fn as_str(self) -> &'static str {
        match self {
            StepKind::LlmStart => "LLM_START",
            StepKind::LlmNewToken => "LLM_NEW_TOKEN",
            StepKind::LlmEnd => "LLM_END",
            StepKind::ToolStart => "TOOL_START",
            StepKind::ToolEnd => "TOOL_END",
            StepKind::WorkflowStart => "WORKFLOW_START",
            StepKind::WorkflowEnd => "WORKFLOW_END",
            StepKind::TaskStart => "TASK_START",
            StepKind::TaskEnd => "TASK_END",
            StepKind::FunctionStart => "FUNCTION_START",
            StepKind::FunctionEnd => "FUNCTION_END",
            StepKind::CustomStart => "CUSTOM_START",
            StepKind::CustomEnd => "CUSTOM_END",
            StepKind::SpanStart => "SPAN_START",
            StepKind::SpanChunk => "SPAN_CHUNK",
            StepKind::SpanEnd => "SPAN_END",
        }
    }

    /// Returns the matching end kind for a start or chunk kind.
    pub const fn end_kind(self) -> StepKind {
        match self.category() {
            StepCategory::Llm => StepKind::LlmEnd,
            StepCategory::Tool => StepKind::ToolEnd,
            StepCategory::Workflow => StepKind::WorkflowEnd,
            StepCategory::Task => StepKind::TaskEnd,
            StepCategory::Function => StepKind::FunctionEnd,
            StepCategory::Custom => StepKind::CustomEnd,
            StepCategory::Span => StepKind::SpanEnd,
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown kind name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown step kind {0:?}")]
pub struct ParseStepKindError(pub String);

impl FromStr for StepKind {
    type Err = ParseStepKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStepKindError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_start_and_end() {
        for kind in StepKind::ALL {
            let cat = kind.category();
            let starts = StepKind::ALL
                .iter()
                .filter(|k| k.category() == cat && k.state() == StepState::Start)
                .count();
            let ends = StepKind::ALL
                .iter()
                .filter(|k| k.category() == cat && k.state() == StepState::End)
                .count();
            assert_eq!(starts, 1, "{cat:?} needs exactly one start kind");
            assert_eq!(ends, 1, "{cat:?} needs exactly one end kind");
        }
    }

    #[test]
    fn test_chunk_kinds() {
        assert_eq!(StepKind::LlmNewToken.state(), StepState::Chunk);
        assert_eq!(StepKind::SpanChunk.state(), StepState::Chunk);
        assert_eq!(StepKind::LlmNewToken.end_kind(), StepKind::LlmEnd);
    }

    #[test]
    fn test_parse_matches_display() {
        for kind in StepKind::ALL {
            assert_eq!(kind.to_string().parse::<StepKind>(), Ok(kind));
        }
        assert_eq!("llm_start".parse::<StepKind>(), Ok(StepKind::LlmStart));
        assert!("LLM_BEGIN".parse::<StepKind>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&StepKind::ToolEnd).unwrap();
        assert_eq!(json, "\"TOOL_END\"");
        let back: StepKind = serde_json::from_str("\"LLM_NEW_TOKEN\"").unwrap();
        assert_eq!(back, StepKind::LlmNewToken);
    }
}
