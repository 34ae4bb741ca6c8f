//! SQLite persistence backend using Diesel with an r2d2 pool.

use chrono::NaiveDate;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use rust_decimal::Decimal;

use crate::domain::{OrderId, OrderRecord, OrderStatus, Position, TokenId, TradeRecord};
use crate::error::{Error, Result};

use super::model::{OrderRow, PositionRow, TradeRow};
use super::schema::{orders, positions, trades};
use super::Store;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Durable store backed by a SQLite file (or `:memory:`).
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open the database, running embedded migrations.
    pub fn open(database_url: &str) -> Result<Self> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(5)
            .build(manager)
            .map_err(|e| Error::Connection(e.to_string()))?;

        let mut conn = pool.get().map_err(|e| Error::Connection(e.to_string()))?;
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| Error::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<DbConnection> {
        self.pool.get().map_err(|e| Error::Connection(e.to_string()))
    }
}

impl Store for SqliteStore {
    fn save_position(&self, position: &Position) -> Result<()> {
        let row = PositionRow::from(position);
        diesel::replace_into(positions::table)
            .values(&row)
            .execute(&mut self.conn()?)?;
        Ok(())
    }

    fn get_position(&self, token_id: &TokenId) -> Result<Option<Position>> {
        let row: Option<PositionRow> = positions::table
            .filter(positions::token_id.eq(token_id.as_str()))
            .select(PositionRow::as_select())
            .first(&mut self.conn()?)
            .optional()?;
        row.map(Position::try_from).transpose()
    }

    fn get_all_active_positions(&self) -> Result<Vec<Position>> {
        let rows: Vec<PositionRow> = positions::table
            .select(PositionRow::as_select())
            .load(&mut self.conn()?)?;
        rows.into_iter()
            .map(Position::try_from)
            .filter(|decoded| decoded.as_ref().map_or(true, Position::is_active))
            .collect()
    }

    fn save_order(&self, order: &OrderRecord) -> Result<()> {
        let row = OrderRow::from(order);
        diesel::replace_into(orders::table)
            .values(&row)
            .execute(&mut self.conn()?)?;
        Ok(())
    }

    fn update_order_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<()> {
        diesel::update(orders::table.filter(orders::order_id.eq(order_id.as_str())))
            .set((
                orders::status.eq(status.as_str()),
                orders::updated_at.eq(chrono::Utc::now().to_rfc3339()),
            ))
            .execute(&mut self.conn()?)?;
        Ok(())
    }

    fn get_open_orders(&self) -> Result<Vec<OrderRecord>> {
        let rows: Vec<OrderRow> = orders::table
            .filter(orders::status.eq_any(["pending", "open"]))
            .select(OrderRow::as_select())
            .load(&mut self.conn()?)?;
        rows.into_iter().map(OrderRecord::try_from).collect()
    }

    fn save_trade(&self, trade: &TradeRecord) -> Result<()> {
        let row = TradeRow::from(trade);
        diesel::replace_into(trades::table)
            .values(&row)
            .execute(&mut self.conn()?)?;
        Ok(())
    }

    fn get_trades(&self, token_id: Option<&TokenId>, limit: usize) -> Result<Vec<TradeRecord>> {
        let mut query = trades::table
            .select(TradeRow::as_select())
            .order(trades::executed_at.desc())
            .limit(limit as i64)
            .into_boxed();
        if let Some(token) = token_id {
            query = query.filter(trades::token_id.eq(token.as_str().to_owned()));
        }
        let rows: Vec<TradeRow> = query.load(&mut self.conn()?)?;
        rows.into_iter().map(TradeRecord::try_from).collect()
    }

    fn get_daily_pnl(&self, date: NaiveDate) -> Result<Decimal> {
        // RFC 3339 timestamps start with the date, so a prefix match
        // selects the day.
        let prefix = format!("{date}%");
        let rows: Vec<TradeRow> = trades::table
            .filter(trades::executed_at.like(prefix))
            .select(TradeRow::as_select())
            .load(&mut self.conn()?)?;
        let mut pnl = Decimal::ZERO;
        for row in rows {
            let trade = TradeRecord::try_from(row)?;
            pnl += trade.signed_notional();
        }
        Ok(pnl)
    }

    fn close(&self) -> Result<()> {
        // r2d2 releases connections on drop; nothing to flush for SQLite.
        Ok(())
    }
}
