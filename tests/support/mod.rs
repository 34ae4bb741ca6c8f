//! Integration test harness: a full engine stack on the in-memory store
//! and the mock exchange.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use underround::bus::{EventBus, EventKind};
use underround::domain::RiskLimits;
use underround::engine::Engine;
use underround::exchange::{ExchangeClient, MockExchange};
use underround::market_data::MarketDataService;
use underround::order_manager::OrderManager;
use underround::risk::RiskManager;
use underround::store::{MemoryStore, Store};

pub struct Harness {
    pub bus: EventBus,
    pub exchange: Arc<MockExchange>,
    pub store: Arc<MemoryStore>,
    pub market_data: Arc<MarketDataService>,
    pub risk: Arc<RiskManager>,
    pub orders: Arc<OrderManager>,
    pub engine: Engine,
}

pub fn harness(dry_run: bool, limits: RiskLimits) -> Harness {
    let bus = EventBus::new();
    let exchange = Arc::new(MockExchange::new());
    let store = Arc::new(MemoryStore::new());

    let market_data = Arc::new(MarketDataService::new(
        Arc::clone(&exchange) as Arc<dyn ExchangeClient>,
        bus.clone(),
        Duration::from_millis(50),
    ));
    let risk = Arc::new(RiskManager::new(
        Arc::clone(&store) as Arc<dyn Store>,
        bus.clone(),
        limits,
    ));
    let orders = Arc::new(OrderManager::new(
        Arc::clone(&exchange) as Arc<dyn ExchangeClient>,
        Arc::clone(&store) as Arc<dyn Store>,
        Arc::clone(&risk),
        bus.clone(),
        dry_run,
    ));
    let engine = Engine::new(
        bus.clone(),
        Arc::clone(&market_data),
        None,
        Arc::clone(&risk),
        Arc::clone(&orders),
        Arc::clone(&store) as Arc<dyn Store>,
    );

    Harness {
        bus,
        exchange,
        store,
        market_data,
        risk,
        orders,
        engine,
    }
}

pub fn default_harness() -> Harness {
    harness(false, RiskLimits::default())
}

/// Count deliveries of one event kind.
pub fn count_events(bus: &EventBus, kind: EventKind) -> Arc<AtomicUsize> {
    let counter = Arc::new(AtomicUsize::new(0));
    let clone = Arc::clone(&counter);
    bus.on(
        kind,
        Arc::new(move |_| {
            clone.fetch_add(1, Ordering::SeqCst);
        }),
    );
    counter
}

/// Let spawned handler continuations run.
pub async fn drain() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
