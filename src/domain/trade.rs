//! Executed trades and strategy signals.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::id::{OrderId, TokenId};
use super::order::Side;

/// A matched trade as recorded locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub order_id: Option<OrderId>,
    pub token_id: TokenId,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl TradeRecord {
    /// Record a fill with a fresh id, stamped with the current time.
    #[must_use]
    pub fn fill(
        order_id: OrderId,
        token_id: TokenId,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: Some(order_id),
            token_id,
            side,
            price,
            size,
            executed_at: Utc::now(),
        }
    }

    /// Notional value (`price * size`).
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }

    /// Signed contribution to daily PnL: sells positive, buys negative.
    #[must_use]
    pub fn signed_notional(&self) -> Decimal {
        match self.side {
            Side::Sell => self.notional(),
            Side::Buy => -self.notional(),
        }
    }
}

/// Output of a strategy evaluation: a proposed trade.
///
/// The engine discards signals with `confidence <= 0.5`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub token_id: TokenId,
    pub side: Side,
    /// How convinced the strategy is, in `[0, 1]`.
    pub confidence: f64,
    pub target_price: Decimal,
    pub size: Decimal,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn signed_notional_by_side() {
        let buy = TradeRecord::fill(
            OrderId::from("o1"),
            TokenId::from("t"),
            Side::Buy,
            dec!(0.40),
            dec!(10),
        );
        let sell = TradeRecord::fill(
            OrderId::from("o2"),
            TokenId::from("t"),
            Side::Sell,
            dec!(0.60),
            dec!(10),
        );
        assert_eq!(buy.signed_notional(), dec!(-4.00));
        assert_eq!(sell.signed_notional(), dec!(6.00));
    }

    #[test]
    fn fill_ids_are_unique() {
        let a = TradeRecord::fill(
            OrderId::from("o"),
            TokenId::from("t"),
            Side::Buy,
            dec!(0.5),
            dec!(1),
        );
        let b = TradeRecord::fill(
            OrderId::from("o"),
            TokenId::from("t"),
            Side::Buy,
            dec!(0.5),
            dec!(1),
        );
        assert_ne!(a.id, b.id);
    }
}
