//! Pre-trade risk admission and exposure monitoring.
//!
//! Every order passes through [`RiskManager::check_order`] before it can
//! reach the exchange. A breach of the daily-loss bound latches a halt that
//! rejects all admissions until [`RiskManager::resume`] is called.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{error, warn};

use crate::bus::{Event, EventBus};
use crate::domain::{Exposure, OrderRequest, RiskLimits};
use crate::store::Store;

/// Result of a pre-trade admission check.
#[derive(Debug, Clone)]
pub enum RiskDecision {
    /// Order may proceed.
    Allowed,
    /// Order is denied with a reason.
    Rejected(String),
}

impl RiskDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Rejection reason, if rejected.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Rejected(reason) => Some(reason),
            Self::Allowed => None,
        }
    }
}

/// Admission gate with a latched halt state.
pub struct RiskManager {
    store: Arc<dyn Store>,
    bus: EventBus,
    limits: RiskLimits,
    halt: RwLock<Option<String>>,
}

impl RiskManager {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, bus: EventBus, limits: RiskLimits) -> Self {
        Self {
            store,
            bus,
            limits,
            halt: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Check an order against the limits, in a fixed sequence. Store
    /// failures reject the order rather than letting it through unchecked.
    pub fn check_order(&self, order: &OrderRequest) -> RiskDecision {
        if let Some(reason) = self.halt.read().clone() {
            return RiskDecision::Rejected(format!("trading halted: {reason}"));
        }

        // Notional value stands in for position size here; the limit is
        // applied to price * size.
        let notional = order.notional();
        if notional > self.limits.max_position_size {
            return RiskDecision::Rejected(format!(
                "order notional {notional} exceeds max position size {}",
                self.limits.max_position_size
            ));
        }

        let exposure = match self.exposure() {
            Ok(exposure) => exposure,
            Err(e) => {
                error!(error = %e, "Exposure computation failed; rejecting order");
                return RiskDecision::Rejected(format!("exposure unavailable: {e}"));
            }
        };
        if exposure.total + notional > self.limits.max_total_exposure {
            return RiskDecision::Rejected(format!(
                "total exposure {} + {notional} exceeds limit {}",
                exposure.total, self.limits.max_total_exposure
            ));
        }

        let open_orders = match self.store.get_open_orders() {
            Ok(orders) => orders,
            Err(e) => {
                error!(error = %e, "Open order lookup failed; rejecting order");
                return RiskDecision::Rejected(format!("open orders unavailable: {e}"));
            }
        };
        if open_orders.len() >= self.limits.max_open_orders {
            return RiskDecision::Rejected(format!(
                "open order limit ({}) reached",
                self.limits.max_open_orders
            ));
        }

        match self.store.get_daily_pnl(Utc::now().date_naive()) {
            Ok(daily_pnl) => {
                if daily_pnl < -self.limits.max_daily_loss {
                    let reason = format!(
                        "daily loss {daily_pnl} breached limit {}",
                        self.limits.max_daily_loss
                    );
                    self.halt(&reason);
                    return RiskDecision::Rejected(reason);
                }
            }
            Err(e) => {
                error!(error = %e, "Daily PnL lookup failed; rejecting order");
                return RiskDecision::Rejected(format!("daily PnL unavailable: {e}"));
            }
        }

        RiskDecision::Allowed
    }

    /// Live exposure: marked position value plus resting order notionals,
    /// attributed per token.
    pub fn exposure(&self) -> crate::error::Result<Exposure> {
        let mut exposure = Exposure::default();
        for position in self.store.get_all_active_positions()? {
            exposure.add(position.token_id.clone(), position.exposure());
        }
        for order in self.store.get_open_orders()? {
            exposure.add(order.token_id.clone(), order.notional());
        }
        Ok(exposure)
    }

    /// Latch the halt flag and broadcast a breach. Re-halting while already
    /// halted keeps the original reason and emits nothing.
    pub fn halt(&self, reason: &str) {
        {
            let mut halt = self.halt.write();
            if halt.is_some() {
                return;
            }
            *halt = Some(reason.to_string());
        }
        warn!(reason, "Trading halted");
        self.bus.emit(Event::RiskBreach {
            reason: reason.to_string(),
        });
    }

    /// Clear the halt latch, re-enabling admission.
    pub fn resume(&self) {
        *self.halt.write() = None;
        warn!("Trading resumed");
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halt.read().is_some()
    }

    /// The latched halt reason, if halted.
    #[must_use]
    pub fn halt_reason(&self) -> Option<String> {
        self.halt.read().clone()
    }
}
