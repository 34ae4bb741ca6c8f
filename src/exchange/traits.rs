//! Exchange client trait definitions.
//!
//! Any exchange adapter must provide these operations. The engine core only
//! ever talks to the exchange through this trait.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{MarketId, OrderBook, OrderId, OrderRequest, Side, TokenId};
use crate::error::Result;

/// Outcome of attempting to place an order.
#[derive(Debug, Clone)]
pub struct PlaceOrderOutcome {
    pub success: bool,
    pub order_id: Option<OrderId>,
    /// Size matched immediately; zero or absent for resting orders.
    pub filled_size: Option<Decimal>,
    pub avg_fill_price: Option<Decimal>,
    pub error: Option<String>,
}

impl PlaceOrderOutcome {
    /// An accepted order that rests on the book unfilled.
    #[must_use]
    pub fn resting(order_id: OrderId) -> Self {
        Self {
            success: true,
            order_id: Some(order_id),
            filled_size: Some(Decimal::ZERO),
            avg_fill_price: None,
            error: None,
        }
    }

    /// An accepted order matched for `filled_size` at `avg_fill_price`.
    #[must_use]
    pub fn filled(order_id: OrderId, filled_size: Decimal, avg_fill_price: Decimal) -> Self {
        Self {
            success: true,
            order_id: Some(order_id),
            filled_size: Some(filled_size),
            avg_fill_price: Some(avg_fill_price),
            error: None,
        }
    }

    /// A failed or rejected placement.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            order_id: None,
            filled_size: None,
            avg_fill_price: None,
            error: Some(error.into()),
        }
    }

    /// Filled size, defaulting to zero when absent.
    #[must_use]
    pub fn filled_size_or_zero(&self) -> Decimal {
        self.filled_size.unwrap_or(Decimal::ZERO)
    }
}

/// An order the exchange reports as open.
#[derive(Debug, Clone)]
pub struct OpenOrder {
    pub order_id: OrderId,
    pub token_id: TokenId,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
}

/// Bidirectional exchange interface: quotes in, orders out.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Fetch the latest order book for a token.
    async fn get_order_book(&self, token_id: &TokenId) -> Result<OrderBook>;

    /// Place an order. The request carries its own time-in-force.
    async fn place_order(&self, request: &OrderRequest) -> Result<PlaceOrderOutcome>;

    /// Cancel a single order. Returns whether the exchange acknowledged.
    async fn cancel_order(&self, order_id: &OrderId) -> Result<bool>;

    /// Cancel every open order. Returns whether the exchange acknowledged.
    async fn cancel_all_orders(&self) -> Result<bool>;

    /// List open orders, optionally scoped to one market.
    async fn get_open_orders(&self, market: Option<&MarketId>) -> Result<Vec<OpenOrder>>;

    /// Adapter name for logging.
    fn exchange_name(&self) -> &'static str;
}
