//! # steptrace
//!
//! **steptrace** tracks nested units of work ("steps") as they start, stream
//! and finish, and attaches to every event the parent it was called from.
//! It stays correct when call chains interleave across tokio tasks and OS
//! threads, fork into concurrent siblings, or close a step on a different
//! branch than the one that opened it.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   driver / traced code           driver / traced code
//!   (branch A: tokio task)         (branch B: blocking thread)
//!          │ push(payload)                  │ push(payload)
//!          ▼                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  StepManager                                                      │
//! │  - classify kind: Start / Chunk / End                             │
//! │  - OutstandingRegistry (shared: id → start payload + ancestry)    │
//! │  - BranchContext of the issuing branch (private nesting stack)    │
//! │  - ancestry::resolve (parent = issuing branch top)                │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼  StepEvent (payload + ancestry)
//!                       ┌────────────────────────┐
//!                       │    SubscriptionBus     │  synchronous, ordered,
//!                       └───┬────────────────┬───┘  panic-isolated
//!                           ▼                ▼
//!                     StepCollector       LogWriter / custom
//! ```
//!
//! ### Branches
//! ```text
//! base ─┬─ branch::spawn ─► a1 ─► a2 ─► a3      each child starts from a
//!       ├─ branch::spawn ─► b1                  snapshot of the parent's
//!       └─ branch::spawn ─► c1 ─► c2            stack; siblings never see
//!                                               each other's pushes
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types                                  |
//! |-------------------|-------------------------------------------------------------|--------------------------------------------|
//! | **Push API**      | Record start/chunk/end events from any branch.              | [`StepManager`], [`StepPayload`]           |
//! | **Events**        | Closed kind table, ancestry attached at push time.          | [`StepKind`], [`StepEvent`]                |
//! | **Branches**      | Task/thread-local nesting stacks, forked on spawn.          | [`BranchContext`], [`branch`]              |
//! | **Subscribers**   | Ordered synchronous fan-out with panic isolation.           | [`Subscribe`], [`SubscriptionBus`]         |
//! | **Collection**    | Gather one invocation's events and rebuild the call tree.   | [`StepCollector`], [`CallTree`]            |
//! | **Errors**        | Typed anomalies, logged rather than raised.                 | [`TraceError`]                             |
//! | **Configuration** | Watermark warning and event logging.                        | [`Config`]                                 |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use steptrace::{branch, CallTree, StepKind, StepManager, StepPayload};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mgr = StepManager::new();
//!     let base = StepPayload::new("base", "base", StepKind::WorkflowStart);
//!
//!     let ((), events) = mgr
//!         .collect_async(async {
//!             mgr.push(base.clone());
//!
//!             let workers: Vec<_> = ["a", "b"]
//!                 .into_iter()
//!                 .map(|name| {
//!                     let mgr = mgr.clone();
//!                     branch::spawn(async move {
//!                         let step = StepPayload::new(name, name, StepKind::ToolStart);
//!                         mgr.push(step.clone());
//!                         tokio::task::yield_now().await;
//!                         mgr.push(step.closing());
//!                     })
//!                 })
//!                 .collect();
//!             for w in workers {
//!                 w.await.unwrap();
//!             }
//!
//!             mgr.push(base.closing());
//!         })
//!         .await;
//!
//!     let tree = CallTree::from_events(&events);
//!     assert_eq!(tree.roots.len(), 1);
//!     assert_eq!(tree.roots[0].children.len(), 2);
//! }
//! ```
pub mod branch;
mod config;
mod core;
mod error;
mod events;
mod subscribers;
mod tree;

// ---- Public re-exports ----

pub use branch::{BranchContext, BranchId};
pub use config::Config;
pub use self::core::{OutstandingEntry, OutstandingRegistry, StepManager, ancestry};
pub use error::TraceError;
pub use events::{
    FunctionAncestry, ParseStepKindError, StepCategory, StepData, StepEvent, StepKind,
    StepPayload, StepState,
};
pub use subscribers::{StepCollector, Subscribe, SubscriptionBus, SubscriptionId};
pub use tree::{CallNode, CallTree};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
