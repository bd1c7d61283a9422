//! # Event subscriber trait.
//!
//! Provides [`Subscribe`] an extension point for plugging listeners into a
//! [`StepManager`](crate::StepManager).
//!
//! ## Rules
//! - `on_event` runs synchronously on the pushing branch; `push` does not
//!   return until every subscriber has seen the event.
//! - A slow subscriber slows the traced work that pushes into it.
//! - Panics are caught and logged; the remaining subscribers still run.
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use steptrace::{StepEvent, Subscribe};
//!
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//!
//! impl Subscribe for Counter {
//!     fn on_event(&self, ev: &StepEvent) {
//!         if ev.is_start() {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "counter" }
//! }
//! ```

use crate::events::StepEvent;

/// Listener for finalized step events.
pub trait Subscribe: Send + Sync + 'static {
    /// Handles one event.
    ///
    /// Called in push order for events of one branch. Must not assume any
    /// ordering between events of different branches.
    fn on_event(&self, event: &StepEvent);

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Adapter turning a closure into a [`Subscribe`] implementation.
pub(crate) struct FnSubscriber<F> {
    pub(crate) name: &'static str,
    pub(crate) f: F,
}

impl<F> Subscribe for FnSubscriber<F>
where
    F: Fn(&StepEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: &StepEvent) {
        (self.f)(event)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
