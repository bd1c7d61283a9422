//! # Logging subscriber for debugging and demos.
//!
//! [`LogWriter`] writes every step event through `tracing` at `info` level.
//!
//! ## Output format
//! ```text
//! INFO steptrace: [start] step=fn1 id=7f.. parent=main kind=FUNCTION_START
//! INFO steptrace: [chunk] step=llm id=a1.. parent=fn1 kind=LLM_NEW_TOKEN
//! INFO steptrace: [end]   step=fn1 id=7f.. parent=main kind=FUNCTION_END
//! ```

use crate::events::{StepEvent, StepState};
use crate::subscribers::Subscribe;

/// Subscriber logging each event with its ancestry.
///
/// Enabled via the `logging` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl Subscribe for LogWriter {
    fn on_event(&self, e: &StepEvent) {
        let tag = match e.kind().state() {
            StepState::Start => "[start]",
            StepState::Chunk => "[chunk]",
            StepState::End => "[end]",
        };
        tracing::info!(
            target: "steptrace",
            step = e.name(),
            id = e.id(),
            parent = e.parent_name().unwrap_or("-"),
            parent_id = e.parent_id().unwrap_or("-"),
            kind = %e.kind(),
            seq = e.seq,
            "{tag}"
        );
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
