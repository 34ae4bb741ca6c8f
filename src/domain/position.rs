//! Position state for a single token.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{MarketId, TokenId};
use super::order::Side;

/// Net position in one outcome token.
///
/// Sign convention: positive `size` is net long (`Buy`), negative is net
/// short (`Sell`). One position exists per token; a position whose size has
/// returned to zero is retained for its realized PnL history but is no
/// longer "active".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub token_id: TokenId,
    pub market_id: MarketId,
    /// Signed net size.
    pub size: Decimal,
    pub avg_entry_price: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub side: Side,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Open a fresh position from a first fill.
    #[must_use]
    pub fn open(
        token_id: TokenId,
        market_id: MarketId,
        side: Side,
        size: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            token_id,
            market_id,
            size: side.sign() * size,
            avg_entry_price: price,
            current_price: price,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            side,
            updated_at: Utc::now(),
        }
    }

    /// Whether the position still carries exposure.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.size.is_zero()
    }

    /// Absolute exposure at the current mark (`|size * current_price|`).
    #[must_use]
    pub fn exposure(&self) -> Decimal {
        (self.size * self.current_price).abs()
    }

    /// Recompute `unrealized_pnl` from the current mark.
    pub fn mark(&mut self, current_price: Decimal) {
        self.current_price = current_price;
        self.unrealized_pnl = (self.current_price - self.avg_entry_price) * self.size;
        self.updated_at = Utc::now();
    }
}
