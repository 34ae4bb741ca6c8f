//! SQLite store round trips on a real database file.

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use underround::domain::{
    MarketId, OrderId, OrderRecord, OrderStatus, Position, Side, TokenId, TradeRecord,
};
use underround::store::{SqliteStore, Store};
use underround::testkit::domain::buy;

fn open_temp_store() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let store = SqliteStore::open(path.to_str().unwrap()).unwrap();
    (dir, store)
}

#[test]
fn position_upsert_round_trip() {
    let (_dir, store) = open_temp_store();
    let mut position = Position::open(
        TokenId::from("t1"),
        MarketId::from("m1"),
        Side::Buy,
        dec!(10),
        dec!(0.40),
    );
    store.save_position(&position).unwrap();

    position.mark(dec!(0.55));
    store.save_position(&position).unwrap();

    let loaded = store.get_position(&TokenId::from("t1")).unwrap().unwrap();
    assert_eq!(loaded.size, dec!(10));
    assert_eq!(loaded.avg_entry_price, dec!(0.40));
    assert_eq!(loaded.current_price, dec!(0.55));
    assert_eq!(loaded.unrealized_pnl, dec!(1.50));
    assert_eq!(loaded.side, Side::Buy);

    // Invariant: unrealized equals (current - entry) * size after a mark.
    assert_eq!(
        loaded.unrealized_pnl,
        (loaded.current_price - loaded.avg_entry_price) * loaded.size
    );
}

#[test]
fn zero_size_positions_drop_out_of_the_active_set() {
    let (_dir, store) = open_temp_store();
    let mut position = Position::open(
        TokenId::from("t1"),
        MarketId::from("m1"),
        Side::Buy,
        dec!(10),
        dec!(0.40),
    );
    store.save_position(&position).unwrap();
    assert_eq!(store.get_all_active_positions().unwrap().len(), 1);

    position.size = dec!(0);
    store.save_position(&position).unwrap();
    assert!(store.get_all_active_positions().unwrap().is_empty());
    assert!(store.get_position(&TokenId::from("t1")).unwrap().is_some());
}

#[test]
fn order_status_transition_removes_from_open_set() {
    let (_dir, store) = open_temp_store();
    let record = OrderRecord::from_request(
        OrderId::from("o1"),
        &buy("t1", dec!(0.5), dec!(5)),
        OrderStatus::Open,
    );
    store.save_order(&record).unwrap();
    assert_eq!(store.get_open_orders().unwrap().len(), 1);

    store
        .update_order_status(&OrderId::from("o1"), OrderStatus::Cancelled)
        .unwrap();
    assert!(store.get_open_orders().unwrap().is_empty());
}

#[test]
fn open_orders_only_contain_live_statuses() {
    let (_dir, store) = open_temp_store();
    let statuses = [
        OrderStatus::Pending,
        OrderStatus::Open,
        OrderStatus::Filled,
        OrderStatus::Cancelled,
        OrderStatus::FilledOrCancelled,
    ];
    for (i, status) in statuses.into_iter().enumerate() {
        let record = OrderRecord::from_request(
            OrderId::from(format!("o{i}")),
            &buy("t1", dec!(0.5), dec!(5)),
            status,
        );
        store.save_order(&record).unwrap();
    }

    let open = store.get_open_orders().unwrap();
    assert_eq!(open.len(), 2);
    assert!(open.iter().all(|order| order.status.is_live()));
}

#[test]
fn trades_filter_by_token_and_order_newest_first() {
    let (_dir, store) = open_temp_store();
    let base = Utc::now();
    for i in 0..4 {
        let token = if i % 2 == 0 { "even" } else { "odd" };
        let mut trade = TradeRecord::fill(
            OrderId::from(format!("o{i}")),
            TokenId::from(token),
            Side::Buy,
            dec!(0.5),
            dec!(1),
        );
        trade.executed_at = base + Duration::seconds(i);
        store.save_trade(&trade).unwrap();
    }

    let all = store.get_trades(None, 10).unwrap();
    assert_eq!(all.len(), 4);
    assert!(all.windows(2).all(|w| w[0].executed_at >= w[1].executed_at));

    let even = store.get_trades(Some(&TokenId::from("even")), 10).unwrap();
    assert_eq!(even.len(), 2);

    let limited = store.get_trades(None, 1).unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].executed_at, base + Duration::seconds(3));
}

#[test]
fn daily_pnl_nets_sells_against_buys_per_day() {
    let (_dir, store) = open_temp_store();
    let now = Utc::now();

    let mut buy_trade = TradeRecord::fill(
        OrderId::from("o1"),
        TokenId::from("t"),
        Side::Buy,
        dec!(0.40),
        dec!(10),
    );
    buy_trade.executed_at = now;
    store.save_trade(&buy_trade).unwrap();

    let mut sell_trade = TradeRecord::fill(
        OrderId::from("o2"),
        TokenId::from("t"),
        Side::Sell,
        dec!(0.70),
        dec!(10),
    );
    sell_trade.executed_at = now;
    store.save_trade(&sell_trade).unwrap();

    // Yesterday's trade stays out of today's number.
    let mut old_trade = TradeRecord::fill(
        OrderId::from("o3"),
        TokenId::from("t"),
        Side::Sell,
        dec!(0.90),
        dec!(100),
    );
    old_trade.executed_at = now - Duration::days(1);
    store.save_trade(&old_trade).unwrap();

    assert_eq!(store.get_daily_pnl(now.date_naive()).unwrap(), dec!(3.00));
}

#[test]
fn store_reopens_from_the_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("persist.db");
    let url = path.to_str().unwrap().to_string();

    {
        let store = SqliteStore::open(&url).unwrap();
        let position = Position::open(
            TokenId::from("t1"),
            MarketId::from("m1"),
            Side::Buy,
            dec!(10),
            dec!(0.40),
        );
        store.save_position(&position).unwrap();
        store.close().unwrap();
    }

    let store = SqliteStore::open(&url).unwrap();
    assert!(store.get_position(&TokenId::from("t1")).unwrap().is_some());
}
