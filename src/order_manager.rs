//! Order submission, fill bookkeeping, and reconciliation.
//!
//! Every order is offered to the risk gate first. In dry-run mode accepted
//! orders get a synthetic result with a deterministic id and never leave
//! the process. On a real placement the order is persisted, broadcast, and
//! any immediate fill flows into the trade log and position state.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::bus::{Event, EventBus};
use crate::domain::{
    MarketId, OrderId, OrderRecord, OrderRequest, OrderStatus, Position, Side, TokenId,
    TradeRecord,
};
use crate::error::Result;
use crate::exchange::{ExchangeClient, PlaceOrderOutcome};
use crate::risk::RiskManager;
use crate::store::Store;

/// Risk-gated order pipeline with position/PnL bookkeeping.
pub struct OrderManager {
    client: Arc<dyn ExchangeClient>,
    store: Arc<dyn Store>,
    risk: Arc<RiskManager>,
    bus: EventBus,
    dry_run: bool,
    dry_run_seq: AtomicU64,
}

impl OrderManager {
    #[must_use]
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        store: Arc<dyn Store>,
        risk: Arc<RiskManager>,
        bus: EventBus,
        dry_run: bool,
    ) -> Self {
        Self {
            client,
            store,
            risk,
            bus,
            dry_run,
            dry_run_seq: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Submit an order through the risk gate.
    ///
    /// Risk rejections and exchange failures come back as unsuccessful
    /// outcomes with the reason attached; they never raise.
    pub async fn submit_order(&self, request: &OrderRequest) -> PlaceOrderOutcome {
        let decision = self.risk.check_order(request);
        if let Some(reason) = decision.reason() {
            debug!(token = %request.token_id, reason, "Order rejected by risk gate");
            return PlaceOrderOutcome::failed(reason);
        }

        if self.dry_run {
            let order_id = OrderId::new(format!(
                "dry-{}",
                self.dry_run_seq.fetch_add(1, Ordering::SeqCst)
            ));
            info!(
                token = %request.token_id,
                side = %request.side,
                price = %request.price,
                size = %request.size,
                order_id = %order_id,
                "Dry run: order simulated"
            );
            return PlaceOrderOutcome::resting(order_id);
        }

        let outcome = match self.client.place_order(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(token = %request.token_id, error = %e, "Order placement failed");
                return PlaceOrderOutcome::failed(e.to_string());
            }
        };
        if !outcome.success {
            return outcome;
        }
        let Some(order_id) = outcome.order_id.clone() else {
            warn!(token = %request.token_id, "Exchange accepted order without an id");
            return outcome;
        };

        let record = OrderRecord::from_request(order_id.clone(), request, OrderStatus::Open);
        if let Err(e) = self.store.save_order(&record) {
            error!(order_id = %order_id, error = %e, "Failed to persist order");
        }

        // Emitted for every accepted placement; filled_size may be zero.
        self.bus.emit(Event::OrderFilled {
            order_id: order_id.clone(),
            request: request.clone(),
            outcome: outcome.clone(),
        });

        let filled = outcome.filled_size_or_zero();
        if filled > Decimal::ZERO {
            let price = outcome.avg_fill_price.unwrap_or(request.price);
            self.record_fill(&order_id, &request.token_id, request.side, filled, price);
        }

        outcome
    }

    /// Cancel one order. Dry-run is a successful no-op.
    pub async fn cancel_order(&self, order_id: &OrderId) -> bool {
        if self.dry_run {
            return true;
        }
        match self.client.cancel_order(order_id).await {
            Ok(true) => {
                if let Err(e) = self
                    .store
                    .update_order_status(order_id, OrderStatus::Cancelled)
                {
                    error!(order_id = %order_id, error = %e, "Failed to mark order cancelled");
                }
                self.bus.emit(Event::OrderCancelled {
                    order_id: order_id.clone(),
                });
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(order_id = %order_id, error = %e, "Cancel failed");
                false
            }
        }
    }

    /// Cancel every open order. Dry-run is a successful no-op.
    pub async fn cancel_all_orders(&self) -> bool {
        if self.dry_run {
            return true;
        }
        match self.client.cancel_all_orders().await {
            Ok(true) => {
                let open = match self.store.get_open_orders() {
                    Ok(open) => open,
                    Err(e) => {
                        error!(error = %e, "Open order lookup failed during cancel-all");
                        return true;
                    }
                };
                for order in open {
                    if let Err(e) = self
                        .store
                        .update_order_status(&order.order_id, OrderStatus::Cancelled)
                    {
                        error!(order_id = %order.order_id, error = %e, "Failed to mark order cancelled");
                    }
                    self.bus.emit(Event::OrderCancelled {
                        order_id: order.order_id.clone(),
                    });
                }
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!(error = %e, "Cancel-all failed");
                false
            }
        }
    }

    /// Reconcile local open orders against remote truth: anything we think
    /// is live but the exchange no longer lists becomes
    /// `filled_or_cancelled`.
    pub async fn sync_orders(&self) -> Result<usize> {
        let remote = self.client.get_open_orders(None).await?;
        let remote_ids: HashSet<&OrderId> = remote.iter().map(|order| &order.order_id).collect();

        let mut reconciled = 0;
        for order in self.store.get_open_orders()? {
            if !remote_ids.contains(&order.order_id) {
                self.store
                    .update_order_status(&order.order_id, OrderStatus::FilledOrCancelled)?;
                reconciled += 1;
            }
        }
        if reconciled > 0 {
            info!(reconciled, "Order state synchronized with exchange");
        }
        Ok(reconciled)
    }

    fn record_fill(
        &self,
        order_id: &OrderId,
        token_id: &TokenId,
        side: Side,
        size: Decimal,
        price: Decimal,
    ) {
        let trade = TradeRecord::fill(order_id.clone(), token_id.clone(), side, price, size);
        if let Err(e) = self.store.save_trade(&trade) {
            error!(trade_id = %trade.id, error = %e, "Failed to persist trade");
        }
        self.bus.emit(Event::TradeExecuted { trade });

        if let Err(e) = self.update_position(token_id, side, size, price) {
            error!(token = %token_id, error = %e, "Position update failed");
        }
    }

    /// Apply a fill to the position for `token_id`.
    ///
    /// Same-side fills blend into a size-weighted average entry; opposite
    /// fills realize PnL against the average entry over the full fill size
    /// (a fill that crosses through zero is not split at the crossing; the
    /// realized figure uses the whole fill).
    pub fn update_position(
        &self,
        token_id: &TokenId,
        side: Side,
        size: Decimal,
        price: Decimal,
    ) -> Result<Position> {
        let existing = self.store.get_position(token_id)?;
        let signed_fill = side.sign() * size;

        let mut position = match existing {
            None => Position::open(
                token_id.clone(),
                // Fills do not carry a market id; key the position by its
                // token until a catalog mapping exists.
                MarketId::from(token_id.as_str()),
                side,
                size,
                price,
            ),
            Some(previous) if previous.size.is_zero() => Position::open(
                token_id.clone(),
                previous.market_id.clone(),
                side,
                size,
                price,
            ),
            Some(mut position) => {
                if side == position.side {
                    let new_size = position.size + signed_fill;
                    position.avg_entry_price = (position.size.abs() * position.avg_entry_price
                        + size * price)
                        / new_size.abs();
                    position.size = new_size;
                } else {
                    let direction = position.side.sign();
                    position.realized_pnl += size * (price - position.avg_entry_price) * direction;
                    position.size += signed_fill;
                    position.side = if position.size >= Decimal::ZERO {
                        Side::Buy
                    } else {
                        Side::Sell
                    };
                }
                position
            }
        };

        position.mark(price);
        self.store.save_position(&position)?;
        self.bus.emit(Event::PositionChanged {
            position: position.clone(),
        });
        Ok(position)
    }
}
