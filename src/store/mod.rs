//! Persistence layer.
//!
//! [`Store`] is the single seam the engine uses for durable state. The
//! SQLite backend is the production default; [`MemoryStore`] serves tests
//! and ephemeral runs.

mod memory;
mod model;
mod schema;
mod sqlite;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::{OrderId, OrderRecord, OrderStatus, Position, TokenId, TradeRecord};
use crate::error::Result;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Keyed storage of positions, orders, and trades.
///
/// All writes are upserts on the entity's primary identifier: `token_id`
/// for positions, `order_id` for orders, the trade `id` for trades.
pub trait Store: Send + Sync {
    fn save_position(&self, position: &Position) -> Result<()>;

    fn get_position(&self, token_id: &TokenId) -> Result<Option<Position>>;

    /// Positions with non-zero size.
    fn get_all_active_positions(&self) -> Result<Vec<Position>>;

    fn save_order(&self, order: &OrderRecord) -> Result<()>;

    fn update_order_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<()>;

    /// Orders whose status is pending or open.
    fn get_open_orders(&self) -> Result<Vec<OrderRecord>>;

    fn save_trade(&self, trade: &TradeRecord) -> Result<()>;

    /// Recorded trades, newest first, optionally scoped to one token.
    fn get_trades(&self, token_id: Option<&TokenId>, limit: usize) -> Result<Vec<TradeRecord>>;

    /// Net PnL over trades executed on `date`: sell notionals minus buy
    /// notionals.
    fn get_daily_pnl(&self, date: NaiveDate) -> Result<Decimal>;

    /// Release the underlying handle. Reads and writes after `close` are
    /// undefined.
    fn close(&self) -> Result<()>;
}
