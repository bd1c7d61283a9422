//! Ancestry resolution for newly opened steps.
//!
//! Pure: the parent of a new step is whatever frame is active on the issuing
//! branch. Chunk and end events never come through here; they reuse the
//! ancestry stored in the registry at open time.

use std::sync::Arc;

use crate::events::{FunctionAncestry, StepPayload};

/// Ancestry of `payload` opened while `active` is the branch top.
pub fn resolve(payload: &StepPayload, active: &FunctionAncestry) -> FunctionAncestry {
    FunctionAncestry::new(
        payload,
        Some(Arc::clone(&active.function_id)),
        Some(Arc::clone(&active.function_name)),
    )
}
