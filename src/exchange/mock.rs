//! In-memory mock exchange.
//!
//! Backs tests and credential-less runs. Books are seeded by the caller;
//! placements succeed with deterministic ids and a configurable fill mode.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::{MarketId, OrderBook, OrderId, OrderRequest, TokenId};
use crate::error::{Error, Result};

use super::traits::{ExchangeClient, OpenOrder, PlaceOrderOutcome};

/// How the mock resolves accepted orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Fill the full size at the request price.
    Immediate,
    /// Accept and leave the order resting.
    Rest,
}

/// Scriptable exchange double.
pub struct MockExchange {
    books: RwLock<HashMap<TokenId, OrderBook>>,
    failing_tokens: RwLock<HashSet<TokenId>>,
    open_orders: RwLock<Vec<OpenOrder>>,
    placed: RwLock<Vec<OrderRequest>>,
    cancelled: RwLock<Vec<OrderId>>,
    fill_mode: RwLock<FillMode>,
    next_order_id: AtomicU64,
    cancel_all_calls: AtomicUsize,
}

impl MockExchange {
    #[must_use]
    pub fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
            failing_tokens: RwLock::new(HashSet::new()),
            open_orders: RwLock::new(Vec::new()),
            placed: RwLock::new(Vec::new()),
            cancelled: RwLock::new(Vec::new()),
            fill_mode: RwLock::new(FillMode::Immediate),
            next_order_id: AtomicU64::new(1),
            cancel_all_calls: AtomicUsize::new(0),
        }
    }

    /// Seed or replace the book returned for its token.
    pub fn set_order_book(&self, book: OrderBook) {
        self.books.write().insert(book.token_id.clone(), book);
    }

    /// Make book fetches for `token_id` fail until cleared.
    pub fn fail_order_book(&self, token_id: TokenId) {
        self.failing_tokens.write().insert(token_id);
    }

    /// Clear an injected book-fetch failure.
    pub fn restore_order_book(&self, token_id: &TokenId) {
        self.failing_tokens.write().remove(token_id);
    }

    /// Choose how accepted orders resolve.
    pub fn set_fill_mode(&self, mode: FillMode) {
        *self.fill_mode.write() = mode;
    }

    /// Seed the remote open-order listing used by reconciliation.
    pub fn set_open_orders(&self, orders: Vec<OpenOrder>) {
        *self.open_orders.write() = orders;
    }

    /// Every request passed to `place_order`, oldest first.
    #[must_use]
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.placed.read().clone()
    }

    /// Every id passed to `cancel_order`.
    #[must_use]
    pub fn cancelled_orders(&self) -> Vec<OrderId> {
        self.cancelled.read().clone()
    }

    /// Number of `cancel_all_orders` invocations.
    #[must_use]
    pub fn cancel_all_calls(&self) -> usize {
        self.cancel_all_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExchangeClient for MockExchange {
    async fn get_order_book(&self, token_id: &TokenId) -> Result<OrderBook> {
        if self.failing_tokens.read().contains(token_id) {
            return Err(Error::Exchange(format!(
                "order book fetch failed for {token_id}"
            )));
        }
        self.books
            .read()
            .get(token_id)
            .cloned()
            .ok_or_else(|| Error::Exchange(format!("no order book for {token_id}")))
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<PlaceOrderOutcome> {
        self.placed.write().push(request.clone());
        let id = OrderId::new(format!(
            "mock-{}",
            self.next_order_id.fetch_add(1, Ordering::SeqCst)
        ));
        let outcome = match *self.fill_mode.read() {
            FillMode::Immediate => PlaceOrderOutcome::filled(id, request.size, request.price),
            FillMode::Rest => {
                self.open_orders.write().push(OpenOrder {
                    order_id: id.clone(),
                    token_id: request.token_id.clone(),
                    side: request.side,
                    price: request.price,
                    size: request.size,
                });
                PlaceOrderOutcome::resting(id)
            }
        };
        Ok(outcome)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> Result<bool> {
        self.cancelled.write().push(order_id.clone());
        self.open_orders
            .write()
            .retain(|order| order.order_id != *order_id);
        Ok(true)
    }

    async fn cancel_all_orders(&self) -> Result<bool> {
        self.cancel_all_calls.fetch_add(1, Ordering::SeqCst);
        self.open_orders.write().clear();
        Ok(true)
    }

    async fn get_open_orders(&self, market: Option<&MarketId>) -> Result<Vec<OpenOrder>> {
        let _ = market;
        Ok(self.open_orders.read().clone())
    }

    fn exchange_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use rust_decimal_macros::dec;

    fn request() -> OrderRequest {
        OrderRequest::gtc(TokenId::from("t1"), Side::Buy, dec!(0.40), dec!(10))
    }

    #[tokio::test]
    async fn deterministic_order_ids() {
        let exchange = MockExchange::new();
        let first = exchange.place_order(&request()).await.unwrap();
        let second = exchange.place_order(&request()).await.unwrap();
        assert_eq!(first.order_id.unwrap().as_str(), "mock-1");
        assert_eq!(second.order_id.unwrap().as_str(), "mock-2");
    }

    #[tokio::test]
    async fn immediate_mode_fills_at_request_price() {
        let exchange = MockExchange::new();
        let outcome = exchange.place_order(&request()).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.filled_size, Some(dec!(10)));
        assert_eq!(outcome.avg_fill_price, Some(dec!(0.40)));
    }

    #[tokio::test]
    async fn rest_mode_lists_the_order_as_open() {
        let exchange = MockExchange::new();
        exchange.set_fill_mode(FillMode::Rest);
        let outcome = exchange.place_order(&request()).await.unwrap();
        assert_eq!(outcome.filled_size_or_zero(), dec!(0));

        let open = exchange.get_open_orders(None).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].order_id, outcome.order_id.unwrap());
    }

    #[tokio::test]
    async fn injected_book_failure() {
        let exchange = MockExchange::new();
        let token = TokenId::from("t1");
        exchange.set_order_book(OrderBook::new(token.clone()));
        exchange.fail_order_book(token.clone());
        assert!(exchange.get_order_book(&token).await.is_err());

        exchange.restore_order_book(&token);
        assert!(exchange.get_order_book(&token).await.is_ok());
    }
}
