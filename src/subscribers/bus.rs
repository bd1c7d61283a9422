//! # Synchronous event fan-out.
//!
//! [`SubscriptionBus`] hands each [`StepEvent`] to every registered
//! subscriber, in registration order, before returning.
//!
//! ## Architecture
//! ```text
//! emit(&event)
//!     │   snapshot listener list (short read lock)
//!     ├──► sub1.on_event() ──► panic? → logged, continue
//!     ├──► sub2.on_event()
//!     └──► subN.on_event()
//! ```
//!
//! ## Rules
//! - **Ordered**: registration order across subscribers, push order per branch.
//! - **Blocking**: `emit` returns after the last subscriber returns.
//! - **Isolation**: a panicking subscriber does not stop delivery to the others.
//! - **Re-entrant**: subscribers may subscribe, unsubscribe or push from
//!   `on_event`; changes apply from the next event on.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave shared state inconsistent
//! if a subscriber uses `Arc<Mutex<T>>` and panics while holding the lock.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::TraceError;
use crate::events::StepEvent;

use super::Subscribe;

/// Handle returned by [`SubscriptionBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

#[derive(Clone)]
struct Listener {
    id: SubscriptionId,
    sub: Arc<dyn Subscribe>,
}

/// Ordered set of subscribers with per-subscriber panic isolation.
pub struct SubscriptionBus {
    /// Copy-on-write so `emit` only clones an `Arc`.
    listeners: RwLock<Arc<Vec<Listener>>>,
    next_id: AtomicU64,
    panics: AtomicU64,
}

impl SubscriptionBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(1),
            panics: AtomicU64::new(0),
        }
    }

    /// Registers `sub` after all current subscribers.
    pub fn subscribe(&self, sub: Arc<dyn Subscribe>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.write();
        Arc::make_mut(&mut listeners).push(Listener { id, sub });
        id
    }

    /// Removes a subscriber; it receives no event emitted after this returns.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), TraceError> {
        let mut listeners = self.listeners.write();
        let Some(pos) = listeners.iter().position(|l| l.id == id) else {
            return Err(TraceError::UnknownSubscription { id: id.0 });
        };
        Arc::make_mut(&mut listeners).remove(pos);
        Ok(())
    }

    /// Delivers `event` to every subscriber registered at call time.
    pub fn emit(&self, event: &StepEvent) {
        let listeners = Arc::clone(&self.listeners.read());

        for listener in listeners.iter() {
            let sub = &listener.sub;
            if let Err(panic_err) = catch_unwind(AssertUnwindSafe(|| sub.on_event(event))) {
                let info = {
                    let any = &*panic_err;
                    if let Some(msg) = any.downcast_ref::<&'static str>() {
                        (*msg).to_string()
                    } else if let Some(msg) = any.downcast_ref::<String>() {
                        msg.clone()
                    } else {
                        "unknown panic".to_string()
                    }
                };
                self.panics.fetch_add(1, Ordering::Relaxed);
                tracing::error!(
                    subscriber = sub.name(),
                    subscription = %listener.id,
                    step_id = event.id(),
                    kind = %event.kind(),
                    panic = %info,
                    "subscriber panicked while handling step event"
                );
            }
        }
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Total subscriber panics caught so far.
    pub fn panics(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }
}

impl Default for SubscriptionBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SubscriptionBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionBus")
            .field("subscribers", &self.len())
            .field("panics", &self.panics())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{FunctionAncestry, StepKind, StepPayload};
    use crate::subscribers::subscribe::FnSubscriber;
    use parking_lot::Mutex;

    fn event(id: &str) -> StepEvent {
        let p = StepPayload::new(id, id, StepKind::SpanStart);
        let a = FunctionAncestry::new(&p, None, None);
        StepEvent::new(p, a)
    }

    fn recorder(
        name: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn Subscribe> {
        let log = Arc::clone(log);
        Arc::new(FnSubscriber {
            name,
            f: move |ev: &StepEvent| log.lock().push(format!("{name}:{}", ev.id())),
        })
    }

    #[test]
    fn test_delivery_follows_registration_order() {
        let bus = SubscriptionBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(recorder("a", &log));
        bus.subscribe(recorder("b", &log));

        bus.emit(&event("x"));
        bus.emit(&event("y"));

        assert_eq!(*log.lock(), vec!["a:x", "b:x", "a:y", "b:y"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = SubscriptionBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let a = bus.subscribe(recorder("a", &log));
        bus.subscribe(recorder("b", &log));

        bus.unsubscribe(a).unwrap();
        bus.emit(&event("x"));

        assert_eq!(*log.lock(), vec!["b:x"]);
        assert_eq!(
            bus.unsubscribe(a),
            Err(TraceError::UnknownSubscription { id: a.as_u64() })
        );
        assert_eq!(bus.len(), 1);
    }

    struct Boom;

    impl Subscribe for Boom {
        fn on_event(&self, _event: &StepEvent) {
            panic!("subscriber failure");
        }

        fn name(&self) -> &'static str {
            "boom"
        }
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let bus = SubscriptionBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Arc::new(Boom));
        bus.subscribe(recorder("after", &log));

        bus.emit(&event("x"));
        bus.emit(&event("y"));

        assert_eq!(*log.lock(), vec!["after:x", "after:y"]);
        assert_eq!(bus.panics(), 2);
    }

    /// Swaps itself for a `late` recorder on its first event.
    struct HandOff {
        bus: Arc<SubscriptionBus>,
        own: Mutex<Option<SubscriptionId>>,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Subscribe for HandOff {
        fn on_event(&self, event: &StepEvent) {
            self.log.lock().push(format!("hand_off:{}", event.id()));
            if let Some(own) = self.own.lock().take() {
                self.bus.unsubscribe(own).unwrap();
                self.bus.subscribe(recorder("late", &self.log));
            }
        }
    }

    #[test]
    fn test_subscription_changes_inside_delivery_apply_to_next_event() {
        let bus = Arc::new(SubscriptionBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let hand_off = Arc::new(HandOff {
            bus: Arc::clone(&bus),
            own: Mutex::new(None),
            log: Arc::clone(&log),
        });
        let id = bus.subscribe(hand_off.clone());
        *hand_off.own.lock() = Some(id);
        bus.subscribe(recorder("steady", &log));

        bus.emit(&event("x"));
        bus.emit(&event("y"));

        assert_eq!(
            *log.lock(),
            vec!["hand_off:x", "steady:x", "steady:y", "late:y"]
        );
        assert_eq!(bus.len(), 2);
        assert_eq!(bus.panics(), 0);
    }
}
