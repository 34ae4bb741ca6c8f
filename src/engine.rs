//! The orchestrating engine.
//!
//! Owns the registered strategies, wires the event subscriptions, and
//! drives the evaluate-gate-execute pipeline on every order-book update.
//! Components never hold a reference back to the engine; handlers capture
//! only the component handles they need.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::bus::{Event, EventBus, EventKind, SubscriptionId};
use crate::discovery::DiscoveryService;
use crate::domain::{
    Exposure, OrderRecord, OrderRequest, Position, RiskLimits, TokenId, TradeSignal,
};
use crate::error::Result;
use crate::market_data::MarketDataService;
use crate::order_manager::OrderManager;
use crate::risk::RiskManager;
use crate::store::Store;
use crate::strategy::{OrderFill, Strategy, StrategyMetrics};

/// Signals at or below this confidence are discarded.
const CONFIDENCE_GATE: f64 = 0.5;

/// Snapshot of one registered strategy for the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyStatus {
    pub name: String,
    pub enabled: bool,
    pub metrics: StrategyMetrics,
}

/// Snapshot of the whole engine for the observability surface.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub strategies: Vec<StrategyStatus>,
    pub positions: Vec<Position>,
    pub open_orders: Vec<OrderRecord>,
    pub risk_limits: RiskLimits,
    pub exposure: Exposure,
}

type StrategySet = Arc<RwLock<Vec<Arc<dyn Strategy>>>>;

/// Wires components together and drives strategy evaluation.
pub struct Engine {
    bus: EventBus,
    market_data: Arc<MarketDataService>,
    discovery: Option<Arc<DiscoveryService>>,
    risk: Arc<RiskManager>,
    orders: Arc<OrderManager>,
    store: Arc<dyn Store>,
    strategies: StrategySet,
    running: Arc<AtomicBool>,
    handler_ids: Mutex<Vec<(EventKind, SubscriptionId)>>,
}

impl Engine {
    /// Build the engine and register its event subscriptions.
    #[must_use]
    pub fn new(
        bus: EventBus,
        market_data: Arc<MarketDataService>,
        discovery: Option<Arc<DiscoveryService>>,
        risk: Arc<RiskManager>,
        orders: Arc<OrderManager>,
        store: Arc<dyn Store>,
    ) -> Self {
        let engine = Self {
            bus,
            market_data,
            discovery,
            risk,
            orders,
            store,
            strategies: Arc::new(RwLock::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            handler_ids: Mutex::new(Vec::new()),
        };
        engine.wire_handlers();
        engine
    }

    fn wire_handlers(&self) {
        let mut ids = self.handler_ids.lock();

        // Order-book updates drive evaluation and execution.
        {
            let strategies = Arc::clone(&self.strategies);
            let running = Arc::clone(&self.running);
            let risk = Arc::clone(&self.risk);
            let orders = Arc::clone(&self.orders);
            let bus = self.bus.clone();
            let id = self.bus.on(
                EventKind::OrderBookUpdate,
                Arc::new(move |event| {
                    let Event::OrderBookUpdate { book } = event else {
                        return;
                    };
                    if !running.load(Ordering::SeqCst) || risk.is_halted() {
                        return;
                    }
                    let accepted = evaluate_all(&strategies, &book.token_id, book);
                    if accepted.is_empty() {
                        return;
                    }
                    for (strategy, signal) in &accepted {
                        bus.emit(Event::StrategySignal {
                            strategy: strategy.clone(),
                            signal: signal.clone(),
                        });
                    }
                    let orders = Arc::clone(&orders);
                    tokio::spawn(async move {
                        execute_signals(&orders, accepted).await;
                    });
                }),
            );
            ids.push((EventKind::OrderBookUpdate, id));
        }

        // Fills fan out to every strategy.
        {
            let strategies = Arc::clone(&self.strategies);
            let id = self.bus.on(
                EventKind::OrderFilled,
                Arc::new(move |event| {
                    let Event::OrderFilled {
                        order_id,
                        request,
                        outcome,
                    } = event
                    else {
                        return;
                    };
                    let filled = outcome.filled_size_or_zero();
                    let fill = OrderFill {
                        order_id: order_id.clone(),
                        token_id: request.token_id.clone(),
                        price: outcome.avg_fill_price.unwrap_or(request.price),
                        size: if filled > Decimal::ZERO {
                            filled
                        } else {
                            request.size
                        },
                    };
                    for strategy in strategies.read().iter() {
                        strategy.on_order_filled(&fill);
                    }
                }),
            );
            ids.push((EventKind::OrderFilled, id));
        }

        // A risk breach cancels everything resting.
        {
            let orders = Arc::clone(&self.orders);
            let id = self.bus.on(
                EventKind::RiskBreach,
                Arc::new(move |event| {
                    let Event::RiskBreach { reason } = event else {
                        return;
                    };
                    warn!(reason = %reason, "Risk breach: cancelling all open orders");
                    let orders = Arc::clone(&orders);
                    tokio::spawn(async move {
                        orders.cancel_all_orders().await;
                    });
                }),
            );
            ids.push((EventKind::RiskBreach, id));
        }

        // Discovery updates reach the strategies and widen the
        // subscription set.
        {
            let strategies = Arc::clone(&self.strategies);
            let market_data = Arc::clone(&self.market_data);
            let id = self.bus.on(
                EventKind::MarketGroupsUpdated,
                Arc::new(move |event| {
                    let Event::MarketGroupsUpdated { groups } = event else {
                        return;
                    };
                    for strategy in strategies.read().iter() {
                        strategy.on_market_groups(groups);
                    }
                    let tokens: Vec<TokenId> = groups
                        .iter()
                        .flat_map(|group| group.token_ids.iter().cloned())
                        .collect();
                    market_data.subscribe(&tokens);
                }),
            );
            ids.push((EventKind::MarketGroupsUpdated, id));
        }
    }

    /// Add a strategy to the evaluation set.
    pub fn register_strategy(&self, strategy: Arc<dyn Strategy>) {
        info!(strategy = strategy.name(), "Strategy registered");
        self.strategies.write().push(strategy);
    }

    /// Remove a strategy by name, shutting it down. Returns whether a
    /// strategy was removed.
    pub fn unregister_strategy(&self, name: &str) -> bool {
        let removed = {
            let mut strategies = self.strategies.write();
            let before = strategies.len();
            let mut kept = Vec::with_capacity(before);
            let mut removed = Vec::new();
            for strategy in strategies.drain(..) {
                if strategy.name() == name {
                    removed.push(strategy);
                } else {
                    kept.push(strategy);
                }
            }
            *strategies = kept;
            removed
        };
        let any = !removed.is_empty();
        for strategy in removed {
            if let Err(e) = strategy.shutdown() {
                error!(strategy = name, error = %e, "Strategy shutdown failed");
            }
        }
        any
    }

    /// Registered strategies, for status and tests.
    #[must_use]
    pub fn strategies(&self) -> Vec<Arc<dyn Strategy>> {
        self.strategies.read().clone()
    }

    /// Replace the market-data subscription set.
    pub fn set_tokens(&self, tokens: &[TokenId]) {
        let current = self.market_data.subscriptions();
        self.market_data.unsubscribe(&current);
        self.market_data.subscribe(tokens);
    }

    /// Union tokens into the subscription set (idempotent).
    pub fn add_tokens(&self, tokens: &[TokenId]) {
        self.market_data.subscribe(tokens);
    }

    /// Initialize strategies, start the pollers, reconcile order state,
    /// and begin evaluating.
    pub async fn start(&self) -> Result<()> {
        for strategy in self.strategies.read().iter() {
            strategy.initialize()?;
        }
        self.market_data.start();
        if let Some(discovery) = &self.discovery {
            discovery.start();
        }
        if let Err(e) = self.orders.sync_orders().await {
            warn!(error = %e, "Startup order reconciliation failed");
        }
        self.running.store(true, Ordering::SeqCst);
        info!("Engine started");
        Ok(())
    }

    /// Stop evaluating, cancel resting orders, and wind the pollers down.
    /// Cooperative: in-flight work drains; a trailing event window is
    /// expected.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.orders.cancel_all_orders().await;
        self.market_data.stop().await;
        if let Some(discovery) = &self.discovery {
            discovery.stop().await;
        }
        for strategy in self.strategies.read().iter() {
            if let Err(e) = strategy.shutdown() {
                error!(strategy = strategy.name(), error = %e, "Strategy shutdown failed");
            }
        }
        info!("Engine stopped");
    }

    /// Detach bus subscriptions and release the store handle. Terminal.
    pub fn close(&self) {
        for (kind, id) in self.handler_ids.lock().drain(..) {
            self.bus.off(kind, id);
        }
        if let Err(e) = self.store.close() {
            error!(error = %e, "Store close failed");
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot for the observability surface.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        let strategies = self
            .strategies
            .read()
            .iter()
            .map(|strategy| StrategyStatus {
                name: strategy.name().to_string(),
                enabled: strategy.is_enabled(),
                metrics: strategy.metrics(),
            })
            .collect();
        EngineStatus {
            running: self.is_running(),
            strategies,
            positions: self.store.get_all_active_positions().unwrap_or_default(),
            open_orders: self.store.get_open_orders().unwrap_or_default(),
            risk_limits: self.risk.limits().clone(),
            exposure: self.risk.exposure().unwrap_or_default(),
        }
    }
}

/// Run every enabled strategy against the book, isolating failures, and
/// keep the signals that clear the confidence gate.
fn evaluate_all(
    strategies: &StrategySet,
    token_id: &TokenId,
    book: &crate::domain::OrderBook,
) -> Vec<(String, TradeSignal)> {
    let mut accepted = Vec::new();
    for strategy in strategies.read().iter() {
        if !strategy.is_enabled() {
            continue;
        }
        let outcome = catch_unwind(AssertUnwindSafe(|| strategy.evaluate(token_id, book)));
        match outcome {
            Ok(Ok(signals)) => {
                for signal in signals {
                    if signal.confidence > CONFIDENCE_GATE {
                        accepted.push((strategy.name().to_string(), signal));
                    } else {
                        debug!(
                            strategy = strategy.name(),
                            confidence = signal.confidence,
                            "Signal below confidence gate"
                        );
                    }
                }
            }
            Ok(Err(e)) => {
                error!(strategy = strategy.name(), error = %e, "Strategy evaluation failed");
            }
            Err(_) => {
                error!(strategy = strategy.name(), "Strategy evaluation panicked");
            }
        }
    }
    accepted
}

/// Execute accepted signals sequentially as GTC orders.
async fn execute_signals(orders: &OrderManager, accepted: Vec<(String, TradeSignal)>) {
    for (strategy, signal) in accepted {
        let request = OrderRequest::gtc(
            signal.token_id.clone(),
            signal.side,
            signal.target_price,
            signal.size,
        );
        let outcome = orders.submit_order(&request).await;
        if outcome.success {
            info!(
                strategy,
                token = %request.token_id,
                side = %request.side,
                price = %request.price,
                size = %request.size,
                reason = signal.reason,
                "Signal executed"
            );
        } else {
            warn!(
                strategy,
                token = %request.token_id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Signal execution rejected"
            );
        }
    }
}
