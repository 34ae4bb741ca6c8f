//! In-process typed publish/subscribe bus.
//!
//! Delivery is synchronous: `emit` invokes every handler registered for the
//! event's kind, in registration order, before returning. A panicking
//! handler is caught and logged and does not stop later handlers. Handlers
//! may spawn asynchronous work; the bus returns before such work completes,
//! so emitters must not assume it has.
//!
//! There is no persistence and no back-pressure.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::error;

use crate::domain::{
    MarketGroup, OrderId, OrderRequest, Position, TradeRecord, TradeSignal,
};
use crate::exchange::PlaceOrderOutcome;

/// Discriminant for event subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OrderBookUpdate,
    TradeExecuted,
    OrderFilled,
    OrderCancelled,
    PositionChanged,
    StrategySignal,
    RiskBreach,
    MarketUpdate,
    MarketGroupsUpdated,
}

/// An event with its typed payload.
#[derive(Debug, Clone)]
pub enum Event {
    /// A fresh order-book snapshot was polled.
    OrderBookUpdate {
        book: crate::domain::OrderBook,
    },
    /// A fill was recorded locally.
    TradeExecuted {
        trade: TradeRecord,
    },
    /// An order was accepted by the exchange. Emitted for every successful
    /// placement; `outcome.filled_size` may be zero for resting orders.
    OrderFilled {
        order_id: OrderId,
        request: OrderRequest,
        outcome: PlaceOrderOutcome,
    },
    /// A local order transitioned to cancelled.
    OrderCancelled {
        order_id: OrderId,
    },
    /// A position was created or mutated.
    PositionChanged {
        position: Position,
    },
    /// A strategy signal passed the confidence gate.
    StrategySignal {
        strategy: String,
        signal: TradeSignal,
    },
    /// The risk manager latched a halt.
    RiskBreach {
        reason: String,
    },
    /// The discovery catalog was refreshed.
    MarketUpdate {
        events_seen: usize,
        groups: usize,
    },
    /// The discovered group list changed; carries the full replacement.
    MarketGroupsUpdated {
        groups: Vec<MarketGroup>,
    },
}

impl Event {
    /// The subscription discriminant for this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::OrderBookUpdate { .. } => EventKind::OrderBookUpdate,
            Self::TradeExecuted { .. } => EventKind::TradeExecuted,
            Self::OrderFilled { .. } => EventKind::OrderFilled,
            Self::OrderCancelled { .. } => EventKind::OrderCancelled,
            Self::PositionChanged { .. } => EventKind::PositionChanged,
            Self::StrategySignal { .. } => EventKind::StrategySignal,
            Self::RiskBreach { .. } => EventKind::RiskBreach,
            Self::MarketUpdate { .. } => EventKind::MarketUpdate,
            Self::MarketGroupsUpdated { .. } => EventKind::MarketGroupsUpdated,
        }
    }
}

/// A subscriber callback.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Handle returned by `on`/`once`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registration {
    id: SubscriptionId,
    handler: Handler,
}

struct Inner {
    handlers: Mutex<HashMap<EventKind, Vec<Registration>>>,
    next_id: AtomicU64,
}

impl Inner {
    fn remove(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.lock();
        if let Some(list) = handlers.get_mut(&kind) {
            let before = list.len();
            list.retain(|reg| reg.id != id);
            return list.len() != before;
        }
        false
    }
}

/// Typed synchronous event dispatcher.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Inner>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to events of `kind`. Returns an id for `off`.
    pub fn on(&self, kind: EventKind, handler: Handler) -> SubscriptionId {
        let id = self.allocate_id();
        self.inner
            .handlers
            .lock()
            .entry(kind)
            .or_default()
            .push(Registration { id, handler });
        id
    }

    /// Remove a subscription. Returns whether anything was removed.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.inner.remove(kind, id)
    }

    /// Subscribe for a single delivery. The registration is removed before
    /// the handler runs, so an emit from inside the handler cannot re-enter
    /// it.
    pub fn once(&self, kind: EventKind, handler: Handler) -> SubscriptionId {
        let id = self.allocate_id();
        let fired = Arc::new(AtomicBool::new(false));
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let wrapped: Handler = Arc::new(move |event| {
            if fired.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                inner.remove(kind, id);
            }
            handler(event);
        });
        self.inner
            .handlers
            .lock()
            .entry(kind)
            .or_default()
            .push(Registration { id, handler: wrapped });
        id
    }

    /// Deliver `event` to every subscriber of its kind, in registration
    /// order. A panicking handler is logged and skipped.
    pub fn emit(&self, event: Event) {
        let kind = event.kind();
        let snapshot: Vec<(SubscriptionId, Handler)> = {
            let handlers = self.inner.handlers.lock();
            handlers
                .get(&kind)
                .map(|list| {
                    list.iter()
                        .map(|reg| (reg.id, Arc::clone(&reg.handler)))
                        .collect()
                })
                .unwrap_or_default()
        };

        for (id, handler) in snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| handler(&event)));
            if result.is_err() {
                error!(?kind, subscription = id.0, "Event handler panicked");
            }
        }
    }

    /// Number of subscribers for `kind`.
    #[must_use]
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.inner
            .handlers
            .lock()
            .get(&kind)
            .map_or(0, Vec::len)
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn breach(reason: &str) -> Event {
        Event::RiskBreach {
            reason: reason.to_string(),
        }
    }

    #[test]
    fn delivers_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.on(
                EventKind::RiskBreach,
                Arc::new(move |_| order.lock().push(label)),
            );
        }

        bus.emit(breach("x"));
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_handler_does_not_block_later_handlers() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.on(EventKind::RiskBreach, Arc::new(|_| panic!("boom")));
        let counter = Arc::clone(&hits);
        bus.on(
            EventKind::RiskBreach,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(breach("x"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_removes_subscription() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = bus.on(
            EventKind::RiskBreach,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        assert!(bus.off(EventKind::RiskBreach, id));
        assert!(!bus.off(EventKind::RiskBreach, id));
        bus.emit(breach("x"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn once_fires_exactly_once() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.once(
            EventKind::RiskBreach,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(breach("x"));
        bus.emit(breach("y"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(EventKind::RiskBreach), 0);
    }

    #[test]
    fn once_is_reentrancy_safe() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        let reentrant_bus = bus.clone();
        bus.once(
            EventKind::RiskBreach,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                // Re-emit from inside the handler: must not re-deliver.
                reentrant_bus.emit(breach("nested"));
            }),
        );

        bus.emit(breach("x"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn events_only_reach_their_kind() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        bus.on(
            EventKind::OrderCancelled,
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bus.emit(breach("x"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        bus.emit(Event::OrderCancelled {
            order_id: OrderId::from("o1"),
        });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
