//! Strategy substrate and concrete strategies.
//!
//! A strategy is a named, enable/disable-able evaluator with the lifecycle
//! `initialize -> evaluate* -> shutdown`. [`StrategyCore`] carries the
//! bookkeeping every strategy shares; concrete strategies embed one and get
//! the trait's default plumbing for free.

mod arbitrage;
mod market_maker;
mod mean_reversion;
mod metrics;
mod momentum;
mod window;

use std::sync::atomic::{AtomicBool, Ordering};

use rust_decimal::Decimal;

use crate::domain::{MarketGroup, OrderBook, OrderId, TokenId, TradeSignal};
use crate::error::Result;

pub use arbitrage::{ArbitrageConfig, ArbitrageCounters, ArbitrageStrategy};
pub use market_maker::{MarketMakerConfig, MarketMakerStrategy};
pub use mean_reversion::{MeanReversionConfig, MeanReversionStrategy};
pub use metrics::{MetricsRecorder, StrategyMetrics};
pub use momentum::{MomentumConfig, MomentumStrategy};

/// A fill notification fanned out to strategies by the engine.
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub order_id: OrderId,
    pub token_id: TokenId,
    pub price: Decimal,
    pub size: Decimal,
}

/// Shared per-strategy state: identity, the enable flag, and metrics.
pub struct StrategyCore {
    name: String,
    enabled: AtomicBool,
    metrics: MetricsRecorder,
}

impl StrategyCore {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: AtomicBool::new(true),
            metrics: MetricsRecorder::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }
}

/// A pluggable evaluator run against every order-book update.
pub trait Strategy: Send + Sync {
    /// The shared bookkeeping block.
    fn core(&self) -> &StrategyCore;

    fn name(&self) -> &str {
        self.core().name()
    }

    /// Called once before the engine starts dispatching updates.
    fn initialize(&self) -> Result<()> {
        Ok(())
    }

    /// Produce zero or more signals for a fresh book. Disabled strategies
    /// return nothing.
    fn evaluate(&self, token_id: &TokenId, book: &OrderBook) -> Result<Vec<TradeSignal>>;

    /// Fill notification. The default counts the trade.
    fn on_order_filled(&self, fill: &OrderFill) {
        let _ = fill;
        self.core().metrics().record_trade();
    }

    /// Wholesale market-group replacement from discovery. Most strategies
    /// ignore it.
    fn on_market_groups(&self, groups: &[MarketGroup]) {
        let _ = groups;
    }

    fn metrics(&self) -> StrategyMetrics {
        self.core().metrics().snapshot()
    }

    fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }

    fn set_enabled(&self, enabled: bool) {
        self.core().set_enabled(enabled);
    }

    /// Called when the strategy is unregistered or the engine stops.
    fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
