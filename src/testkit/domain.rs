//! Builders for domain primitives used across tests.
//!
//! Concise factories so tests focus on assertions rather than
//! construction boilerplate.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{
    MarketGroup, MarketId, OrderBook, OrderRequest, PriceLevel, Side, TokenId,
};

/// Create a [`TokenId`] from a string.
pub fn token(id: &str) -> TokenId {
    TokenId::from(id)
}

/// Generate `n` token IDs named `t0`, `t1`, ..., `t{n-1}`.
pub fn make_tokens(n: usize) -> Vec<TokenId> {
    (0..n).map(|i| TokenId::from(format!("t{i}"))).collect()
}

/// Create a [`MarketId`] from a string.
pub fn market_id(id: &str) -> MarketId {
    MarketId::from(id)
}

/// A one-level book with size 100 on each side.
pub fn book(token: &str, bid: Decimal, ask: Decimal) -> OrderBook {
    book_with_sizes(token, bid, dec!(100), ask, dec!(100))
}

/// A one-level book with explicit sizes.
pub fn book_with_sizes(
    token: &str,
    bid: Decimal,
    bid_size: Decimal,
    ask: Decimal,
    ask_size: Decimal,
) -> OrderBook {
    OrderBook::with_levels(
        TokenId::from(token),
        vec![PriceLevel::new(bid, bid_size)],
        vec![PriceLevel::new(ask, ask_size)],
    )
}

/// A market group over the named tokens.
pub fn group(condition: &str, tokens: &[&str]) -> MarketGroup {
    MarketGroup::new(
        MarketId::from(condition),
        tokens.iter().map(|t| TokenId::from(*t)).collect(),
    )
}

/// A GTC buy request.
pub fn buy(token: &str, price: Decimal, size: Decimal) -> OrderRequest {
    OrderRequest::gtc(TokenId::from(token), Side::Buy, price, size)
}

/// A GTC sell request.
pub fn sell(token: &str, price: Decimal, size: Decimal) -> OrderRequest {
    OrderRequest::gtc(TokenId::from(token), Side::Sell, price, size)
}
