//! Mean reversion: fade large deviations from the rolling mean.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{OrderBook, Side, TokenId, TradeSignal};
use crate::error::Result;

use super::window::PriceWindows;
use super::{Strategy, StrategyCore};

#[derive(Debug, Clone)]
pub struct MeanReversionConfig {
    /// Window length; no signal until the window is full.
    pub window: usize,
    /// Minimum relative deviation from the mean.
    pub threshold: Decimal,
    pub order_size: Decimal,
}

impl Default for MeanReversionConfig {
    fn default() -> Self {
        Self {
            window: 20,
            threshold: dec!(0.05),
            order_size: dec!(10),
        }
    }
}

pub struct MeanReversionStrategy {
    core: StrategyCore,
    config: MeanReversionConfig,
    mids: PriceWindows,
}

impl MeanReversionStrategy {
    #[must_use]
    pub fn new(config: MeanReversionConfig) -> Self {
        let window = config.window;
        Self {
            core: StrategyCore::new("mean-reversion"),
            config,
            mids: PriceWindows::new(window),
        }
    }
}

impl Strategy for MeanReversionStrategy {
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
        let mean: Decimal = series.iter().copied().sum::<Decimal>() / Decimal::from(series.len());
        if mean.is_zero() {
            return Ok(Vec::new());
        }
        let deviation = (mid - mean) / mean;

        // Price below the mean: expect a bounce, buy. Above: fade it.
        let (side, level) = if deviation < -self.config.threshold {
            (Side::Buy, book.best_ask())
        } else if deviation > self.config.threshold {
            (Side::Sell, book.best_bid())
        } else {
            return Ok(Vec::new());
        };
        let Some(level) = level else {
            return Ok(Vec::new());
        };

        let strength = (deviation.abs() / self.config.threshold)
            .to_f64()
            .unwrap_or(1.0);
        let confidence = (0.5 + 0.2 * (strength - 1.0)).clamp(0.0, 0.95);

        Ok(vec![TradeSignal {
            token_id: token_id.clone(),
            side,
            confidence,
            target_price: level.price,
            size: self.config.order_size,
            reason: format!("Mean reversion: deviation {deviation:.4} from mean {mean}"),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceLevel;

    fn book(bid: Decimal, ask: Decimal) -> OrderBook {
        OrderBook::with_levels(
            TokenId::from("t"),
            vec![PriceLevel::new(bid, dec!(100))],
            vec![PriceLevel::new(ask, dec!(100))],
        )
    }

    fn config() -> MeanReversionConfig {
        MeanReversionConfig {
            window: 4,
            ..MeanReversionConfig::default()
        }
    }

    #[test]
    fn dip_below_mean_triggers_a_buy() {
        let strategy = MeanReversionStrategy::new(config());
        let token = TokenId::from("t");
        for _ in 0..3 {
            strategy.evaluate(&token, &book(dec!(0.49), dec!(0.51))).unwrap();
        }
        let signals = strategy
            .evaluate(&token, &book(dec!(0.39), dec!(0.41)))
            .unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, Side::Buy);
        assert_eq!(signals[0].target_price, dec!(0.41));
    }

    #[test]
    fn stable_prices_stay_silent() {
        let strategy = MeanReversionStrategy::new(config());
        let token = TokenId::from("t");
        for _ in 0..6 {
            let signals = strategy
                .evaluate(&token, &book(dec!(0.49), dec!(0.51)))
                .unwrap();
            assert!(signals.is_empty());
        }
    }
}
