//! Rolling per-token price windows shared by the single-token strategies.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::domain::TokenId;

/// Bounded price history per token, in memory only.
pub struct PriceWindows {
    capacity: usize,
    windows: Mutex<HashMap<TokenId, VecDeque<Decimal>>>,
}

impl PriceWindows {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Append a price and return a snapshot of the window, oldest first.
    pub fn push(&self, token_id: &TokenId, price: Decimal) -> Vec<Decimal> {
        let mut windows = self.windows.lock();
        let window = windows.entry(token_id.clone()).or_default();
        window.push_back(price);
        while window.len() > self.capacity {
            window.pop_front();
        }
        window.iter().copied().collect()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
