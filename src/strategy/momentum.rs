//! Momentum: follow a sustained directional move in the mid price.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{OrderBook, Side, TokenId, TradeSignal};
use crate::error::Result;

use super::window::PriceWindows;
use super::{Strategy, StrategyCore};

#[derive(Debug, Clone)]
pub struct MomentumConfig {
    /// Window length; no signal until the window is full.
    pub window: usize,
    /// Minimum relative move across the window.
    pub threshold: Decimal,
    pub order_size: Decimal,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        Self {
            window: 20,
            threshold: dec!(0.02),
            order_size: dec!(10),
        }
    }
}

pub struct MomentumStrategy {
    core: StrategyCore,
    config: MomentumConfig,
    mids: PriceWindows,
}

impl MomentumStrategy {
    #[must_use]
    pub fn new(config: MomentumConfig) -> Self {
        let window = config.window;
        Self {
            core: StrategyCore::new("momentum"),
            config,
            mids: PriceWindows::new(window),
        }
    }
}

impl Strategy for MomentumStrategy {
    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn evaluate(&self, token_id: &TokenId, book: &OrderBook) -> Result<Vec<TradeSignal>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        let Some(mid) = book.mid_price() else {
            return Ok(Vec::new());
        };

        let series = self.mids.push(token_id, mid);
        if series.len() < self.config.window {
            return Ok(Vec::new());
        }
        let first = series[0];
        if first.is_zero() {
            return Ok(Vec::new());
        }
        let momentum = (mid - first) / first;

        let (side, level) = if momentum > self.config.threshold {
            (Side::Buy, book.best_ask())
        } else if momentum < -self.config.threshold {
            (Side::Sell, book.best_bid())
        } else {
            return Ok(Vec::new());
        };
        let Some(level) = level else {
            return Ok(Vec::new());
        };

        let strength = (momentum.abs() / self.config.threshold)
            .to_f64()
            .unwrap_or(1.0);
        let confidence = (0.5 + 0.2 * (strength - 1.0)).clamp(0.0, 0.95);

        Ok(vec![TradeSignal {
            token_id: token_id.clone(),
            side,
            confidence,
            target_price: level.price,
            size: self.config.order_size,
            reason: format!("Momentum: {momentum:.4} over {} samples", series.len()),
        }])
    }
}
