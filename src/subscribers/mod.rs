//! # Event subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriptionBus`] that
//! fans events out to subscribers, and built-in subscribers.
//!
//! ## Architecture
//! ```text
//! StepManager::push ──► SubscriptionBus::emit(&StepEvent)
//!                              │
//!                              ├──► StepCollector (ordered event list)
//!                              ├──► LogWriter     (feature "logging")
//!                              └──► Custom ...
//! ```

mod bus;
mod collector;
#[cfg(feature = "logging")]
mod log;
mod subscribe;

pub use bus::{SubscriptionBus, SubscriptionId};
pub use collector::StepCollector;
#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;

pub(crate) use subscribe::FnSubscriber;
