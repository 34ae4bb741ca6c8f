//! Order-book polling service.
//!
//! Maintains a subscription set and polls the exchange for every subscribed
//! token on a fixed interval. Fetches within one tick run concurrently; the
//! next tick starts only after the whole batch settles, which bounds
//! staleness to one interval plus one worst-case fetch. Every successful
//! fetch updates the cache and emits an [`Event::OrderBookUpdate`] with no
//! change detection; consumers are expected to be idempotent.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bus::{Event, EventBus};
use crate::domain::{OrderBook, TokenId};
use crate::exchange::ExchangeClient;

/// Thread-safe cache of the last-seen order book per token.
///
/// Single writer (the poller), many readers.
pub struct OrderBookCache {
    books: RwLock<HashMap<TokenId, OrderBook>>,
}

impl OrderBookCache {
    #[must_use]
    pub fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a book.
    pub fn insert(&self, book: OrderBook) {
        self.books.write().insert(book.token_id.clone(), book);
    }

    /// Get a snapshot of an order book.
    #[must_use]
    pub fn get(&self, token_id: &TokenId) -> Option<OrderBook> {
        self.books.read().get(token_id).cloned()
    }

    /// Get snapshots of multiple order books atomically.
    #[must_use]
    pub fn get_many(&self, token_ids: &[TokenId]) -> Vec<Option<OrderBook>> {
        let books = self.books.read();
        token_ids.iter().map(|id| books.get(id).cloned()).collect()
    }

    /// Number of books in the cache.
    #[must_use]
    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OrderBookCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Periodic order-book poller with a mutable subscription set.
pub struct MarketDataService {
    client: Arc<dyn ExchangeClient>,
    bus: EventBus,
    cache: OrderBookCache,
    subscriptions: RwLock<BTreeSet<TokenId>>,
    poll_interval: Duration,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MarketDataService {
    #[must_use]
    pub fn new(client: Arc<dyn ExchangeClient>, bus: EventBus, poll_interval: Duration) -> Self {
        Self {
            client,
            bus,
            cache: OrderBookCache::new(),
            subscriptions: RwLock::new(BTreeSet::new()),
            poll_interval,
            shutdown: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Add tokens to the subscription set (idempotent union).
    pub fn subscribe(&self, tokens: &[TokenId]) {
        let mut subscriptions = self.subscriptions.write();
        for token in tokens {
            subscriptions.insert(token.clone());
        }
    }

    /// Remove tokens from the subscription set.
    pub fn unsubscribe(&self, tokens: &[TokenId]) {
        let mut subscriptions = self.subscriptions.write();
        for token in tokens {
            subscriptions.remove(token);
        }
    }

    /// Snapshot of the current subscription set.
    #[must_use]
    pub fn subscriptions(&self) -> Vec<TokenId> {
        self.subscriptions.read().iter().cloned().collect()
    }

    /// Last cached book for a token, if any.
    #[must_use]
    pub fn order_book(&self, token_id: &TokenId) -> Option<OrderBook> {
        self.cache.get(token_id)
    }

    /// Direct access to the cache for multi-book snapshots.
    #[must_use]
    pub fn cache(&self) -> &OrderBookCache {
        &self.cache
    }

    /// Start polling: one immediate poll, then one per interval until
    /// `stop`. Calling `start` on a running service is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut shutdown = self.shutdown.lock();
        if shutdown.is_some() {
            return;
        }
        let (tx, mut rx) = watch::channel(false);
        *shutdown = Some(tx);

        let service = Arc::clone(self);
        let handle = tokio::spawn(async move {
            service.poll_once().await;
            let mut ticker = tokio::time::interval(service.poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first interval tick fires immediately; the initial poll
            // already ran, so consume it.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => service.poll_once().await,
                    _ = rx.changed() => break,
                }
            }
            debug!("Market data poller exited");
        });
        *self.task.lock() = Some(handle);
        info!(interval_ms = self.poll_interval.as_millis() as u64, "Market data service started");
    }

    /// Stop polling. Cooperative: an in-flight poll batch completes.
    pub async fn stop(&self) {
        let sender = self.shutdown.lock().take();
        if let Some(tx) = sender {
            let _ = tx.send(true);
        }
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("Market data service stopped");
    }

    /// Poll every subscribed token once, concurrently. Single-token
    /// failures are logged and do not abort the rest of the batch.
    pub async fn poll_once(&self) {
        let tokens: Vec<TokenId> = self.subscriptions();
        if tokens.is_empty() {
            return;
        }

        let fetches = tokens.into_iter().map(|token| async move {
            match self.client.get_order_book(&token).await {
                Ok(book) => {
                    self.cache.insert(book.clone());
                    self.bus.emit(Event::OrderBookUpdate { book });
                }
                Err(e) => {
                    warn!(token = %token, error = %e, "Order book poll failed");
                }
            }
        });
        join_all(fetches).await;
    }
}
