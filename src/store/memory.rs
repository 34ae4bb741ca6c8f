//! In-memory store for tests and ephemeral runs.

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::domain::{OrderId, OrderRecord, OrderStatus, Position, TokenId, TradeRecord};
use crate::error::Result;

use super::Store;

/// Map-backed store with the same upsert semantics as the SQLite backend.
#[derive(Default)]
pub struct MemoryStore {
    positions: RwLock<HashMap<TokenId, Position>>,
    orders: RwLock<HashMap<OrderId, OrderRecord>>,
    trades: RwLock<Vec<TradeRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn save_position(&self, position: &Position) -> Result<()> {
        self.positions
            .write()
            .insert(position.token_id.clone(), position.clone());
        Ok(())
    }

    fn get_position(&self, token_id: &TokenId) -> Result<Option<Position>> {
        Ok(self.positions.read().get(token_id).cloned())
    }

    fn get_all_active_positions(&self) -> Result<Vec<Position>> {
        Ok(self
            .positions
            .read()
            .values()
            .filter(|position| position.is_active())
            .cloned()
            .collect())
    }

    fn save_order(&self, order: &OrderRecord) -> Result<()> {
        self.orders
            .write()
            .insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    fn update_order_status(&self, order_id: &OrderId, status: OrderStatus) -> Result<()> {
        if let Some(order) = self.orders.write().get_mut(order_id) {
            order.status = status;
            order.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    fn get_open_orders(&self) -> Result<Vec<OrderRecord>> {
        Ok(self
            .orders
            .read()
            .values()
            .filter(|order| order.status.is_live())
            .cloned()
            .collect())
    }

    fn save_trade(&self, trade: &TradeRecord) -> Result<()> {
        let mut trades = self.trades.write();
        if let Some(existing) = trades.iter_mut().find(|t| t.id == trade.id) {
            *existing = trade.clone();
        } else {
            trades.push(trade.clone());
        }
        Ok(())
    }

    fn get_trades(&self, token_id: Option<&TokenId>, limit: usize) -> Result<Vec<TradeRecord>> {
        let mut trades: Vec<TradeRecord> = self
            .trades
            .read()
            .iter()
            .filter(|trade| token_id.map_or(true, |token| trade.token_id == *token))
            .cloned()
            .collect();
        trades.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        trades.truncate(limit);
        Ok(trades)
    }

    fn get_daily_pnl(&self, date: NaiveDate) -> Result<Decimal> {
        Ok(self
            .trades
            .read()
            .iter()
            .filter(|trade| trade.executed_at.date_naive() == date)
            .map(TradeRecord::signed_notional)
            .sum())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketId, OrderRequest, Side};
    use rust_decimal_macros::dec;

    #[test]
    fn position_roundtrip() {
        let store = MemoryStore::new();
        let position = Position::open(
            TokenId::from("t1"),
            MarketId::from("m1"),
            Side::Buy,
            dec!(10),
            dec!(0.40),
        );
        store.save_position(&position).unwrap();

        let loaded = store.get_position(&TokenId::from("t1")).unwrap().unwrap();
        assert_eq!(loaded.size, dec!(10));
        assert_eq!(loaded.avg_entry_price, dec!(0.40));
    }

    #[test]
    fn zero_size_positions_are_not_active() {
        let store = MemoryStore::new();
        let mut position = Position::open(
            TokenId::from("t1"),
            MarketId::from("m1"),
            Side::Buy,
            dec!(10),
            dec!(0.40),
        );
        position.size = Decimal::ZERO;
        store.save_position(&position).unwrap();

        assert!(store.get_all_active_positions().unwrap().is_empty());
        assert!(store.get_position(&TokenId::from("t1")).unwrap().is_some());
    }

    #[test]
    fn cancelled_orders_leave_the_open_set() {
        let store = MemoryStore::new();
        let request = OrderRequest::gtc(TokenId::from("t1"), Side::Buy, dec!(0.4), dec!(5));
        let record =
            OrderRecord::from_request(OrderId::from("o1"), &request, OrderStatus::Open);
        store.save_order(&record).unwrap();
        assert_eq!(store.get_open_orders().unwrap().len(), 1);

        store
            .update_order_status(&OrderId::from("o1"), OrderStatus::Cancelled)
            .unwrap();
        assert!(store.get_open_orders().unwrap().is_empty());
    }

    #[test]
    fn daily_pnl_signs_by_side() {
        let store = MemoryStore::new();
        store
            .save_trade(&TradeRecord::fill(
                OrderId::from("o1"),
                TokenId::from("t"),
                Side::Buy,
                dec!(0.40),
                dec!(10),
            ))
            .unwrap();
        store
            .save_trade(&TradeRecord::fill(
                OrderId::from("o2"),
                TokenId::from("t"),
                Side::Sell,
                dec!(0.70),
                dec!(10),
            ))
            .unwrap();

        let today = chrono::Utc::now().date_naive();
        assert_eq!(store.get_daily_pnl(today).unwrap(), dec!(3.00));
    }

    #[test]
    fn trades_come_back_newest_first() {
        let store = MemoryStore::new();
        for i in 0..3 {
            let mut trade = TradeRecord::fill(
                OrderId::from(format!("o{i}")),
                TokenId::from("t"),
                Side::Buy,
                dec!(0.5),
                dec!(1),
            );
            trade.executed_at += chrono::Duration::seconds(i);
            store.save_trade(&trade).unwrap();
        }

        let trades = store.get_trades(None, 2).unwrap();
        assert_eq!(trades.len(), 2);
        assert!(trades[0].executed_at >= trades[1].executed_at);
    }
}
