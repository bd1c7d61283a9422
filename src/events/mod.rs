//! Step events: classification, payloads and finalized events.
//!
//! ## Contents
//! - [`StepKind`], [`StepCategory`], [`StepState`] closed event classification
//! - [`StepPayload`], [`StepData`] what callers push
//! - [`StepEvent`], [`FunctionAncestry`] what subscribers receive

mod event;
mod kind;
mod payload;

pub use event::{FunctionAncestry, StepEvent};
pub use kind::{ParseStepKindError, StepCategory, StepKind, StepState};
pub use payload::{StepData, StepPayload};
