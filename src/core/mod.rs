//! Step-tracking core: registry, ancestry and the push protocol.
//!
//! ```text
//! push(payload)
//!     │
//!     ▼
//! StepManager ──► OutstandingRegistry   (shared, id → entry)
//!     │      ──► BranchContext          (issuing branch, via branch::with_current)
//!     │      ──► ancestry::resolve      (pure, from branch top)
//!     ▼
//! SubscriptionBus ──► subscribers
//! ```
//!
//! Internal modules:
//! - [`manager`]: classifies pushes and drives the other pieces;
//! - [`registry`]: open-step bookkeeping shared across branches;
//! - [`ancestry`]: parent resolution for new steps.

pub mod ancestry;
mod manager;
mod registry;

pub use manager::StepManager;
pub use registry::{OutstandingEntry, OutstandingRegistry};
