//! Error types used by the step-tracking core.
//!
//! Nothing here is ever surfaced to traced work: the [`StepManager`](crate::StepManager)
//! logs these and degrades to a best-effort event. They are returned by the
//! lower-level pieces ([`OutstandingRegistry`](crate::OutstandingRegistry),
//! [`SubscriptionBus`](crate::SubscriptionBus)) so callers that drive those
//! directly can react.

use thiserror::Error;

/// # Errors produced by the step-tracking core.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    /// An open event arrived for an identifier that is already open.
    ///
    /// The first entry is retained.
    #[error("step {id:?} is already open")]
    AlreadyOpen {
        /// Identifier of the step.
        id: String,
    },

    /// A close or chunk event referenced an identifier with no matching open.
    #[error("no matching start step for {id:?}")]
    NotOpen {
        /// Identifier of the step.
        id: String,
    },

    /// `unsubscribe` was called with a handle that is not registered.
    #[error("subscription {id} is not registered")]
    UnknownSubscription {
        /// Raw subscription handle.
        id: u64,
    },
}

impl TraceError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use steptrace::TraceError;
    ///
    /// let err = TraceError::NotOpen { id: "abc".into() };
    /// assert_eq!(err.as_label(), "step_not_open");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TraceError::AlreadyOpen { .. } => "step_already_open",
            TraceError::NotOpen { .. } => "step_not_open",
            TraceError::UnknownSubscription { .. } => "unknown_subscription",
        }
    }
}
