//! Risk limits and exposure reporting.

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::id::TokenId;

/// Hard limits enforced by the risk gate. All values are positive; the
/// daily loss is a positive bound on negative PnL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Maximum notional per order. Compared against `price * size`.
    pub max_position_size: Decimal,
    /// Maximum aggregate exposure across positions and live orders.
    pub max_total_exposure: Decimal,
    /// Maximum tolerated loss on a single trade.
    pub max_loss_per_trade: Decimal,
    /// Daily loss beyond which trading halts.
    pub max_daily_loss: Decimal,
    /// Maximum number of live (pending or open) orders.
    pub max_open_orders: usize,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_size: dec!(100),
            max_total_exposure: dec!(1000),
            max_loss_per_trade: dec!(50),
            max_daily_loss: dec!(100),
            max_open_orders: 10,
        }
    }
}

/// Live exposure, per token and in aggregate.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Exposure {
    pub by_token: HashMap<TokenId, Decimal>,
    pub total: Decimal,
}

impl Exposure {
    /// Attribute `amount` of exposure to `token`.
    pub fn add(&mut self, token: TokenId, amount: Decimal) {
        *self.by_token.entry(token).or_insert(Decimal::ZERO) += amount;
        self.total += amount;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposure_accumulates_per_token() {
        let mut exposure = Exposure::default();
        exposure.add(TokenId::from("a"), dec!(4));
        exposure.add(TokenId::from("a"), dec!(6));
        exposure.add(TokenId::from("b"), dec!(2));
        assert_eq!(exposure.by_token[&TokenId::from("a")], dec!(10));
        assert_eq!(exposure.total, dec!(12));
    }
}
