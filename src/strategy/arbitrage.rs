//! Multi-outcome arbitrage over discovered market groups.
//!
//! Two detectors run per evaluation, mutually exclusive:
//!
//! 1. **Simple arbitrage** - the best asks of every outcome in a group sum,
//!    with fees, to less than the guaranteed payout of 1. Buying one of
//!    each outcome locks in the difference.
//! 2. **Bregman projection** - the implied probability distribution of the
//!    group diverges from the uniform prior by more than a threshold
//!    (Kullback-Leibler divergence); buy the most underpriced outcome.
//!    Statistical, not risk-free.
//!
//! Money stays in `Decimal`; the divergence and confidence figures need
//! `ln` and live in `f64`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info};

use crate::domain::{MarketGroup, OrderBook, Side, TokenId, TradeSignal};
use crate::error::Result;
use crate::market_data::MarketDataService;
use crate::store::Store;

use super::{Strategy, StrategyCore};

#[derive(Debug, Clone)]
pub struct ArbitrageConfig {
    /// Minimum edge for the simple-arbitrage basket.
    pub min_edge: Decimal,
    /// Taker fee applied to the basket cost.
    pub fee_rate: Decimal,
    /// Baseline order size before liquidity and capacity caps.
    pub base_size: Decimal,
    /// Per-token signed position cap used for remaining capacity.
    pub max_position_size: Decimal,
    /// Minimum KL divergence from the uniform prior.
    pub divergence_threshold: f64,
    /// Books older than this are not acted on.
    pub max_staleness_ms: i64,
    /// How often to log the counter block.
    pub stats_interval: Duration,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            min_edge: dec!(0.02),
            fee_rate: dec!(0.02),
            base_size: dec!(10),
            max_position_size: dec!(100),
            divergence_threshold: 0.05,
            max_staleness_ms: 5_000,
            stats_interval: Duration::from_secs(60),
        }
    }
}

/// Observability counters, readable at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArbitrageCounters {
    pub evaluations: u64,
    pub skipped_no_group: u64,
    pub skipped_missing_book: u64,
    pub skipped_stale_book: u64,
    pub simple_arb_signals: u64,
    pub bregman_arb_signals: u64,
    pub no_arb_found: u64,
}

#[derive(Default)]
struct CounterBlock {
    evaluations: AtomicU64,
    skipped_no_group: AtomicU64,
    skipped_missing_book: AtomicU64,
    skipped_stale_book: AtomicU64,
    simple_arb_signals: AtomicU64,
    bregman_arb_signals: AtomicU64,
    no_arb_found: AtomicU64,
}

impl CounterBlock {
    fn snapshot(&self) -> ArbitrageCounters {
        ArbitrageCounters {
            evaluations: self.evaluations.load(Ordering::Relaxed),
            skipped_no_group: self.skipped_no_group.load(Ordering::Relaxed),
            skipped_missing_book: self.skipped_missing_book.load(Ordering::Relaxed),
            skipped_stale_book: self.skipped_stale_book.load(Ordering::Relaxed),
            simple_arb_signals: self.simple_arb_signals.load(Ordering::Relaxed),
            bregman_arb_signals: self.bregman_arb_signals.load(Ordering::Relaxed),
            no_arb_found: self.no_arb_found.load(Ordering::Relaxed),
        }
    }
}

/// Token -> group reverse index, replaced wholesale on discovery updates.
#[derive(Default)]
struct GroupIndex {
    groups: Vec<MarketGroup>,
    by_token: HashMap<TokenId, usize>,
}

impl GroupIndex {
    fn build(groups: Vec<MarketGroup>) -> Self {
        let mut by_token = HashMap::new();
        for (index, group) in groups.iter().enumerate() {
            for token in &group.token_ids {
                by_token.insert(token.clone(), index);
            }
        }
        Self { groups, by_token }
    }
}

/// Group arbitrage evaluator.
pub struct ArbitrageStrategy {
    core: StrategyCore,
    config: ArbitrageConfig,
    market_data: Arc<MarketDataService>,
    store: Arc<dyn Store>,
    index: RwLock<Arc<GroupIndex>>,
    counters: CounterBlock,
    last_stats_log: Mutex<Instant>,
}

impl ArbitrageStrategy {
    #[must_use]
    pub fn new(
        config: ArbitrageConfig,
        market_data: Arc<MarketDataService>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            core: StrategyCore::new("bregman-arb"),
            config,
            market_data,
            store,
            index: RwLock::new(Arc::new(GroupIndex::default())),
            counters: CounterBlock::default(),
            last_stats_log: Mutex::new(Instant::now()),
        }
    }

    /// Replace the group set atomically. Readers see either the old or the
    /// new index, never a mix.
    pub fn update_market_groups(&self, groups: Vec<MarketGroup>) {
        let index = Arc::new(GroupIndex::build(groups));
        debug!(
            groups = index.groups.len(),
            tokens = index.by_token.len(),
            "Arbitrage group index rebuilt"
        );
        *self.index.write() = index;
    }

    /// Current counter values.
    #[must_use]
    pub fn counters(&self) -> ArbitrageCounters {
        self.counters.snapshot()
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Remaining signed capacity for a token under the per-token cap.
    fn remaining_capacity(&self, token_id: &TokenId) -> Result<Decimal> {
        let held = self
            .store
            .get_position(token_id)?
            .map(|position| position.size)
            .unwrap_or(Decimal::ZERO);
        Ok(self.config.max_position_size - held)
    }

    fn maybe_log_stats(&self) {
        let mut last = self.last_stats_log.lock();
        if last.elapsed() < self.config.stats_interval {
            return;
        }
        *last = Instant::now();
        let c = self.counters.snapshot();
        info!(
            evaluations = c.evaluations,
            skipped_no_group = c.skipped_no_group,
            skipped_missing_book = c.skipped_missing_book,
            skipped_stale_book = c.skipped_stale_book,
            simple_arb_signals = c.simple_arb_signals,
            bregman_arb_signals = c.bregman_arb_signals,
            no_arb_found = c.no_arb_found,
            "Arbitrage counters"
        );
    }

    /// Buy one of every outcome when the fee-adjusted basket costs less
    /// than the payout. Returns `None` when there is no qualifying edge;
    /// `Some` short-circuits the evaluation even if sizing produced no
    /// signals.
    fn simple_arb(&self, group: &MarketGroup, books: &[OrderBook]) -> Result<Option<Vec<TradeSignal>>> {
        let asks: Vec<_> = books.iter().filter_map(OrderBook::best_ask).collect();
        if asks.len() != books.len() {
            // An outcome without asks cannot be bought; no basket exists.
            return Ok(None);
        }

        let ask_sum: Decimal = asks.iter().map(|level| level.price).sum();
        let cost = ask_sum * (Decimal::ONE + self.config.fee_rate);
        let edge = Decimal::ONE - cost;
        if edge < self.config.min_edge {
            return Ok(None);
        }

        let mut size = self.config.base_size;
        for level in &asks {
            size = size.min(level.size);
        }
        for token in &group.token_ids {
            size = size.min(self.remaining_capacity(token)?);
        }
        if size <= Decimal::ZERO {
            return Ok(Some(Vec::new()));
        }

        let confidence = (edge / self.config.min_edge).to_f64().unwrap_or(0.0).min(1.0);
        let signals: Vec<TradeSignal> = group
            .token_ids
            .iter()
            .zip(&asks)
            .map(|(token, level)| TradeSignal {
                token_id: token.clone(),
                side: Side::Buy,
                confidence,
                target_price: level.price,
                size,
                reason: format!(
                    "Simple arb on {}: basket cost {cost} < 1, edge {edge}",
                    group.condition_id
                ),
            })
            .collect();
        self.counters
            .simple_arb_signals
            .fetch_add(signals.len() as u64, Ordering::Relaxed);
        info!(
            group = %group.condition_id,
            edge = %edge,
            size = %size,
            legs = signals.len(),
            "Simple arbitrage detected"
        );
        Ok(Some(signals))
    }

    /// Buy the most underpriced outcome when the implied distribution
    /// diverges enough from the uniform prior.
    fn bregman_arb(&self, group: &MarketGroup, books: &[OrderBook]) -> Result<Vec<TradeSignal>> {
        let mids: Vec<Decimal> = match books
            .iter()
            .map(OrderBook::mid_price)
            .collect::<Option<Vec<_>>>()
        {
            Some(mids) => mids,
            None => return Ok(Vec::new()),
        };
        let mid_sum: Decimal = mids.iter().copied().sum();
        if mid_sum <= Decimal::ZERO {
            return Ok(Vec::new());
        }

        let implied: Vec<f64> = mids
            .iter()
            .map(|mid| (mid / mid_sum).to_f64().unwrap_or(0.0))
            .collect();
        if implied.iter().any(|&q| q <= 0.0) {
            return Ok(Vec::new());
        }

        let uniform = 1.0 / implied.len() as f64;
        let divergence: f64 = implied.iter().map(|&q| uniform * (uniform / q).ln()).sum();
        if divergence < self.config.divergence_threshold {
            Self::bump(&self.counters.no_arb_found);
            return Ok(Vec::new());
        }

        // The smallest implied probability is the most underpriced outcome.
        let mut target = 0;
        for (index, &q) in implied.iter().enumerate() {
            if q < implied[target] {
                target = index;
            }
        }
        let token = &group.token_ids[target];

        let Some(ask) = books[target].best_ask() else {
            // No asks means no liquidity to take; skip.
            return Ok(Vec::new());
        };

        let multiplier = (divergence / self.config.divergence_threshold).min(2.0);
        let scaled = self.config.base_size
            * Decimal::from_f64(multiplier).unwrap_or(Decimal::ONE);
        let size = scaled
            .min(ask.size)
            .min(self.remaining_capacity(token)?);
        if size <= Decimal::ZERO {
            return Ok(Vec::new());
        }

        let confidence = (divergence / (2.0 * self.config.divergence_threshold)).min(1.0);
        Self::bump(&self.counters.bregman_arb_signals);
        info!(
            group = %group.condition_id,
            token = %token,
            divergence,
            size = %size,
            "Bregman arbitrage detected"
        );
        Ok(vec![TradeSignal {
            token_id: token.clone(),
            side: Side::Buy,
            confidence,
            target_price: ask.price,
            size,
            reason: format!(
                "Bregman arb on {}: divergence {divergence:.4} from uniform prior",
                group.condition_id
            ),
        }])
    }
}

impl Strategy for ArbitrageStrategy {
    fn core(&self) -> &StrategyCore {
        &self.core
    }

    fn evaluate(&self, token_id: &TokenId, book: &OrderBook) -> Result<Vec<TradeSignal>> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }
        Self::bump(&self.counters.evaluations);
        self.maybe_log_stats();

        let index = Arc::clone(&self.index.read());
        let Some(&group_index) = index.by_token.get(token_id) else {
            Self::bump(&self.counters.skipped_no_group);
            return Ok(Vec::new());
        };
        let group = &index.groups[group_index];

        // The trigger token uses the book that arrived with the event;
        // siblings come from the market-data cache.
        let mut books: Vec<OrderBook> = Vec::with_capacity(group.len());
        for token in &group.token_ids {
            if token == token_id {
                books.push(book.clone());
                continue;
            }
            match self.market_data.order_book(token) {
                Some(sibling) => books.push(sibling),
                None => {
                    Self::bump(&self.counters.skipped_missing_book);
                    return Ok(Vec::new());
                }
            }
        }

        let now = Utc::now();
        for candidate in &books {
            if candidate.age_ms(now) > self.config.max_staleness_ms {
                Self::bump(&self.counters.skipped_stale_book);
                return Ok(Vec::new());
            }
        }

        if let Some(signals) = self.simple_arb(group, &books)? {
            return Ok(signals);
        }
        self.bregman_arb(group, &books)
    }

    fn on_market_groups(&self, groups: &[MarketGroup]) {
        self.update_market_groups(groups.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::domain::{MarketId, PriceLevel};
    use crate::exchange::MockExchange;
    use crate::store::MemoryStore;

    struct Fixture {
        market_data: Arc<MarketDataService>,
        store: Arc<MemoryStore>,
        strategy: ArbitrageStrategy,
    }

    fn fixture(config: ArbitrageConfig) -> Fixture {
        let market_data = Arc::new(MarketDataService::new(
            Arc::new(MockExchange::new()),
            EventBus::new(),
            Duration::from_secs(1),
        ));
        let store = Arc::new(MemoryStore::new());
        let strategy = ArbitrageStrategy::new(
            config,
            Arc::clone(&market_data),
            Arc::clone(&store) as Arc<dyn Store>,
        );
        Fixture {
            market_data,
            store,
            strategy,
        }
    }

    fn group(tokens: &[&str]) -> MarketGroup {
        MarketGroup::new(
            MarketId::from("cond-1"),
            tokens.iter().map(|t| TokenId::from(*t)).collect(),
        )
    }

    fn book(token: &str, bid: Decimal, ask: Decimal, ask_size: Decimal) -> OrderBook {
        OrderBook::with_levels(
            TokenId::from(token),
            vec![PriceLevel::new(bid, dec!(100))],
            vec![PriceLevel::new(ask, ask_size)],
        )
    }

    fn seed(f: &Fixture, book: OrderBook) {
        f.market_data.cache().insert(book);
    }

    #[test]
    fn no_group_is_counted_and_silent() {
        let f = fixture(ArbitrageConfig::default());
        let signals = f
            .strategy
            .evaluate(&TokenId::from("t"), &book("t", dec!(0.4), dec!(0.6), dec!(10)))
            .unwrap();
        assert!(signals.is_empty());
        assert_eq!(f.strategy.counters().skipped_no_group, 1);
    }

    #[test]
    fn missing_sibling_book_skips() {
        let f = fixture(ArbitrageConfig::default());
        f.strategy.update_market_groups(vec![group(&["a", "b"])]);

        let signals = f
            .strategy
            .evaluate(&TokenId::from("a"), &book("a", dec!(0.4), dec!(0.6), dec!(10)))
            .unwrap();
        assert!(signals.is_empty());
        assert_eq!(f.strategy.counters().skipped_missing_book, 1);
    }

    #[test]
    fn stale_sibling_book_skips() {
        let f = fixture(ArbitrageConfig::default());
        f.strategy.update_market_groups(vec![group(&["a", "b"])]);

        let mut stale = book("b", dec!(0.4), dec!(0.6), dec!(10));
        stale.timestamp = Utc::now() - chrono::Duration::seconds(10);
        seed(&f, stale);

        let signals = f
            .strategy
            .evaluate(&TokenId::from("a"), &book("a", dec!(0.4), dec!(0.6), dec!(10)))
            .unwrap();
        assert!(signals.is_empty());
        assert_eq!(f.strategy.counters().skipped_stale_book, 1);
    }

    #[test]
    fn three_way_basket_below_payout() {
        let config = ArbitrageConfig {
            base_size: dec!(10),
            fee_rate: dec!(0.02),
            max_position_size: dec!(50),
            ..ArbitrageConfig::default()
        };
        let f = fixture(config);
        f.strategy.update_market_groups(vec![group(&["a", "b", "c"])]);
        seed(&f, book("b", dec!(0.24), dec!(0.25), dec!(30)));
        seed(&f, book("c", dec!(0.24), dec!(0.25), dec!(30)));

        let signals = f
            .strategy
            .evaluate(
                &TokenId::from("a"),
                &book("a", dec!(0.24), dec!(0.25), dec!(30)),
            )
            .unwrap();

        assert_eq!(signals.len(), 3);
        for signal in &signals {
            assert_eq!(signal.side, Side::Buy);
            assert_eq!(signal.size, dec!(10));
            assert_eq!(signal.target_price, dec!(0.25));
            assert!(signal.reason.contains("Simple arb"));
        }
        assert_eq!(f.strategy.counters().simple_arb_signals, 3);
    }

    #[test]
    fn basket_size_is_capped_by_thinnest_ask() {
        let f = fixture(ArbitrageConfig {
            base_size: dec!(50),
            ..ArbitrageConfig::default()
        });
        f.strategy.update_market_groups(vec![group(&["a", "b"])]);
        seed(&f, book("b", dec!(0.39), dec!(0.40), dec!(7)));

        let signals = f
            .strategy
            .evaluate(
                &TokenId::from("a"),
                &book("a", dec!(0.39), dec!(0.40), dec!(40)),
            )
            .unwrap();
        assert_eq!(signals.len(), 2);
        assert!(signals.iter().all(|signal| signal.size == dec!(7)));
    }

    #[test]
    fn fair_binary_market_finds_nothing() {
        let f = fixture(ArbitrageConfig::default());
        f.strategy.update_market_groups(vec![group(&["yes", "no"])]);
        seed(&f, book("no", dec!(0.49), dec!(0.50), dec!(100)));

        let signals = f
            .strategy
            .evaluate(
                &TokenId::from("yes"),
                &book("yes", dec!(0.49), dec!(0.50), dec!(100)),
            )
            .unwrap();
        assert!(signals.is_empty());
        assert_eq!(f.strategy.counters().no_arb_found, 1);
    }

    #[test]
    fn skewed_binary_market_buys_the_underpriced_outcome() {
        let f = fixture(ArbitrageConfig::default());
        f.strategy.update_market_groups(vec![group(&["yes", "no"])]);
        seed(&f, book("no", dec!(0.19), dec!(0.21), dec!(100)));

        let signals = f
            .strategy
            .evaluate(
                &TokenId::from("yes"),
                &book("yes", dec!(0.79), dec!(0.81), dec!(100)),
            )
            .unwrap();

        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.token_id, TokenId::from("no"));
        assert_eq!(signal.side, Side::Buy);
        assert_eq!(signal.target_price, dec!(0.21));
        assert!(signal.reason.contains("Bregman arb"));
        // D ~ 0.2231 with threshold 0.05 saturates both multipliers.
        assert_eq!(signal.size, dec!(20));
        assert!((signal.confidence - 1.0).abs() < 1e-9);
        assert_eq!(f.strategy.counters().bregman_arb_signals, 1);
    }

    #[test]
    fn capacity_limits_basket_size() {
        let f = fixture(ArbitrageConfig {
            max_position_size: dec!(8),
            base_size: dec!(10),
            ..ArbitrageConfig::default()
        });
        f.strategy.update_market_groups(vec![group(&["a", "b"])]);
        seed(&f, book("b", dec!(0.39), dec!(0.40), dec!(30)));

        // Held 5 of token a: remaining capacity 3.
        let position = crate::domain::Position::open(
            TokenId::from("a"),
            MarketId::from("cond-1"),
            Side::Buy,
            dec!(5),
            dec!(0.40),
        );
        f.store.save_position(&position).unwrap();

        let signals = f
            .strategy
            .evaluate(
                &TokenId::from("a"),
                &book("a", dec!(0.39), dec!(0.40), dec!(30)),
            )
            .unwrap();
        assert_eq!(signals.len(), 2);
        assert!(signals.iter().all(|signal| signal.size == dec!(3)));
    }

    #[test]
    fn disabled_strategy_returns_empty() {
        let f = fixture(ArbitrageConfig::default());
        f.strategy.update_market_groups(vec![group(&["a", "b"])]);
        f.strategy.set_enabled(false);

        let signals = f
            .strategy
            .evaluate(&TokenId::from("a"), &book("a", dec!(0.4), dec!(0.6), dec!(10)))
            .unwrap();
        assert!(signals.is_empty());
        assert_eq!(f.strategy.counters().evaluations, 0);
    }
}
