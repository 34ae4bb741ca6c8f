//! Database row types and domain conversions.
//!
//! Decimals and timestamps are stored as TEXT; rows decode back into
//! domain types, surfacing corrupt rows as store errors.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rust_decimal::Decimal;

use crate::domain::{
    MarketId, OrderId, OrderRecord, OrderStatus, OrderType, Position, Side, TokenId, TradeRecord,
};
use crate::error::{Error, Result};

use super::schema::{orders, positions, trades};

fn decode_decimal(field: &str, value: &str) -> Result<Decimal> {
    Decimal::from_str(value).map_err(|e| Error::Store(format!("bad {field} value {value:?}: {e}")))
}

fn decode_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Store(format!("bad {field} value {value:?}: {e}")))
}

fn decode_side(value: &str) -> Result<Side> {
    match value {
        "BUY" => Ok(Side::Buy),
        "SELL" => Ok(Side::Sell),
        other => Err(Error::Store(format!("bad side value {other:?}"))),
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = positions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PositionRow {
    pub token_id: String,
    pub market_id: String,
    pub size: String,
    pub avg_entry_price: String,
    pub current_price: String,
    pub unrealized_pnl: String,
    pub realized_pnl: String,
    pub side: String,
    pub updated_at: String,
}

impl From<&Position> for PositionRow {
    fn from(position: &Position) -> Self {
        Self {
            token_id: position.token_id.to_string(),
            market_id: position.market_id.to_string(),
            size: position.size.to_string(),
            avg_entry_price: position.avg_entry_price.to_string(),
            current_price: position.current_price.to_string(),
            unrealized_pnl: position.unrealized_pnl.to_string(),
            realized_pnl: position.realized_pnl.to_string(),
            side: position.side.to_string(),
            updated_at: position.updated_at.to_rfc3339(),
        }
    }
}

impl TryFrom<PositionRow> for Position {
    type Error = Error;

    fn try_from(row: PositionRow) -> Result<Self> {
        Ok(Self {
            token_id: TokenId::from(row.token_id),
            market_id: MarketId::from(row.market_id),
            size: decode_decimal("size", &row.size)?,
            avg_entry_price: decode_decimal("avg_entry_price", &row.avg_entry_price)?,
            current_price: decode_decimal("current_price", &row.current_price)?,
            unrealized_pnl: decode_decimal("unrealized_pnl", &row.unrealized_pnl)?,
            realized_pnl: decode_decimal("realized_pnl", &row.realized_pnl)?,
            side: decode_side(&row.side)?,
            updated_at: decode_timestamp("updated_at", &row.updated_at)?,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct OrderRow {
    pub order_id: String,
    pub token_id: String,
    pub side: String,
    pub price: String,
    pub size: String,
    pub order_type: String,
    pub status: String,
    pub expiration: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&OrderRecord> for OrderRow {
    fn from(order: &OrderRecord) -> Self {
        Self {
            order_id: order.order_id.to_string(),
            token_id: order.token_id.to_string(),
            side: order.side.to_string(),
            price: order.price.to_string(),
            size: order.size.to_string(),
            order_type: order.order_type.to_string(),
            status: order.status.to_string(),
            expiration: order.expiration.map(|dt| dt.to_rfc3339()),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

impl TryFrom<OrderRow> for OrderRecord {
    type Error = Error;

    fn try_from(row: OrderRow) -> Result<Self> {
        let order_type = match row.order_type.as_str() {
            "GTC" => OrderType::Gtc,
            "GTD" => OrderType::Gtd,
            other => return Err(Error::Store(format!("bad order_type value {other:?}"))),
        };
        let status = OrderStatus::parse(&row.status)
            .ok_or_else(|| Error::Store(format!("bad status value {:?}", row.status)))?;
        let expiration = row
            .expiration
            .as_deref()
            .map(|value| decode_timestamp("expiration", value))
            .transpose()?;
        Ok(Self {
            order_id: OrderId::from(row.order_id),
            token_id: TokenId::from(row.token_id),
            side: decode_side(&row.side)?,
            price: decode_decimal("price", &row.price)?,
            size: decode_decimal("size", &row.size)?,
            order_type,
            status,
            expiration,
            created_at: decode_timestamp("created_at", &row.created_at)?,
            updated_at: decode_timestamp("updated_at", &row.updated_at)?,
        })
    }
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = trades)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TradeRow {
    pub id: String,
    pub order_id: Option<String>,
    pub token_id: String,
    pub side: String,
    pub price: String,
    pub size: String,
    pub executed_at: String,
}

impl From<&TradeRecord> for TradeRow {
    fn from(trade: &TradeRecord) -> Self {
        Self {
            id: trade.id.clone(),
            order_id: trade.order_id.as_ref().map(ToString::to_string),
            token_id: trade.token_id.to_string(),
            side: trade.side.to_string(),
            price: trade.price.to_string(),
            size: trade.size.to_string(),
            executed_at: trade.executed_at.to_rfc3339(),
        }
    }
}

impl TryFrom<TradeRow> for TradeRecord {
    type Error = Error;

    fn try_from(row: TradeRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id.map(OrderId::from),
            token_id: TokenId::from(row.token_id),
            side: decode_side(&row.side)?,
            price: decode_decimal("price", &row.price)?,
            size: decode_decimal("size", &row.size)?,
            executed_at: decode_timestamp("executed_at", &row.executed_at)?,
        })
    }
}
