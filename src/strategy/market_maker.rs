//! Spread-capture market making.
//!
//! Quotes the cheap side of a wide market: when the spread clears the
//! configured minimum, join the bid (or the ask when the mid sits above its
//! rolling mean) one tick inside the touch.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{OrderBook, Side, TokenId, TradeSignal};
use crate::error::Result;

use super::window::PriceWindows;
use super::{Strategy, StrategyCore};

#[derive(Debug, Clone)]
pub struct MarketMakerConfig {
    /// Minimum spread worth quoting into.
    pub min_spread: Decimal,
    /// Size of each quote.
    pub order_size: Decimal,
    /// Rolling mid-price window length.
    pub window: usize,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            min_spread: dec!(0.05),
            order_size: dec!(10),
            window: 20,
        }
    }
}

pub struct MarketMakerStrategy {
    core: StrategyCore,
    config: MarketMakerConfig,
    mids: PriceWindows,
}

impl MarketMakerStrategy {
    #[must_use]
    pub fn new(config: MarketMakerConfig) -> Self {
        let window = config.window;
        Self {
            core: StrategyCore::new("market-maker"),
            config,
            mids: PriceWindows::new(window),
        }
    }
}

const TICK: Decimal = dec!(0.01);

impl Strategy for MarketMakerStrategy {
    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn evaluate(&self, token_id: &TokenId, book: &OrderBook) -> Result<Vec<TradeSignal>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        let (Some(bid), Some(ask), Some(mid), Some(spread)) =
            (book.best_bid(), book.best_ask(), book.mid_price(), book.spread())
        else {
            return Ok(Vec::new());
        };

        let series = self.mids.push(token_id, mid);
        if spread < self.config.min_spread {
            return Ok(Vec::new());
        }

        let mean: Decimal = series.iter().copied().sum::<Decimal>() / Decimal::from(series.len());
        // Quote the side the market is leaning away from.
        let (side, target_price) = if mid <= mean {
            (Side::Buy, bid.price + TICK)
        } else {
            (Side::Sell, ask.price - TICK)
        };
        if target_price <= Decimal::ZERO || target_price >= Decimal::ONE {
            return Ok(Vec::new());
        }

        let width = (spread / self.config.min_spread).to_f64().unwrap_or(1.0);
        let confidence = (0.5 + 0.25 * (width - 1.0)).clamp(0.0, 0.95);

        Ok(vec![TradeSignal {
            token_id: token_id.clone(),
            side,
            confidence,
            target_price,
            size: self.config.order_size,
            reason: format!("Market making: spread {spread} inside quote at {target_price}"),
        }])
    }
}
