//! Order book types for market depth representation.
//!
//! An order book has two sides:
//! - **Bids**: buy orders, sorted by price descending (best bid first)
//! - **Asks**: sell orders, sorted by price ascending (best ask first)
//!
//! Prices on a prediction market live in `(0, 1)` and represent implied
//! probability; `0` and `1` are degenerate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::TokenId;

/// A single price level in an order book.
///
/// Represents aggregated orders at a specific price point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// The price at this level.
    pub price: Decimal,
    /// Total size available at this price.
    pub size: Decimal,
}

impl PriceLevel {
    /// Creates a new price level.
    #[must_use]
    pub const fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}

/// Order book for a single tradeable token.
///
/// Bids are sorted by price descending, asks ascending, so the best level
/// of each side is always at index zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    /// Token ID this book represents.
    pub token_id: TokenId,
    /// Bid (buy) levels, sorted by price descending.
    pub bids: Vec<PriceLevel>,
    /// Ask (sell) levels, sorted by price ascending.
    pub asks: Vec<PriceLevel>,
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    /// Creates a new empty order book stamped with the current time.
    #[must_use]
    pub fn new(token_id: TokenId) -> Self {
        Self {
            token_id,
            bids: Vec::new(),
            asks: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a book with initial price levels.
    ///
    /// Bids should be sorted by price descending, asks by price ascending.
    #[must_use]
    pub fn with_levels(token_id: TokenId, bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self {
            token_id,
            bids,
            asks,
            timestamp: Utc::now(),
        }
    }

    /// Returns the best (highest) bid, if any.
    #[must_use]
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Returns the best (lowest) ask, if any.
    #[must_use]
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Spread between the best ask and the best bid.
    ///
    /// Returns `None` unless both sides are quoted.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        Some(self.best_ask()?.price - self.best_bid()?.price)
    }

    /// Midpoint between the best bid and the best ask.
    ///
    /// Returns `None` unless both sides are quoted.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        let two = Decimal::TWO;
        Some((self.best_ask()?.price + self.best_bid()?.price) / two)
    }

    /// Age of this snapshot relative to `now`, in milliseconds.
    #[must_use]
    pub fn age_ms(&self, now: DateTime<Utc>) -> i64 {
        (now - self.timestamp).num_milliseconds()
    }
}
