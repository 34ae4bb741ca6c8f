//! Order types: requests, records, and lifecycle status.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{OrderId, TokenId};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The opposite side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Sign convention used for position bookkeeping: buys are positive.
    #[must_use]
    pub fn sign(self) -> Decimal {
        match self {
            Self::Buy => Decimal::ONE,
            Self::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Time-in-force for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Good till cancelled.
    Gtc,
    /// Good till date; requires an expiration.
    Gtd,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gtc => write!(f, "GTC"),
            Self::Gtd => write!(f, "GTD"),
        }
    }
}

/// Lifecycle status of an order.
///
/// `Pending` and `Open` orders are "live" and count toward risk limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Open,
    Filled,
    Cancelled,
    /// Disappeared from the exchange's open set; fill vs cancel unknown.
    FilledOrCancelled,
}

impl OrderStatus {
    /// Whether the order still counts toward open-order limits.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Pending | Self::Open)
    }

    /// Stable string form used by the persistence layer.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Open => "open",
            Self::Filled => "filled",
            Self::Cancelled => "cancelled",
            Self::FilledOrCancelled => "filled_or_cancelled",
        }
    }

    /// Parse the persistence-layer string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "open" => Some(Self::Open),
            "filled" => Some(Self::Filled),
            "cancelled" => Some(Self::Cancelled),
            "filled_or_cancelled" => Some(Self::FilledOrCancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request to place an order.
///
/// Invariants: `price` in `(0, 1)`, `size > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub token_id: TokenId,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub order_type: OrderType,
    /// Expiration for GTD orders.
    pub expiration: Option<DateTime<Utc>>,
}

impl OrderRequest {
    /// A good-till-cancelled limit order.
    #[must_use]
    pub fn gtc(token_id: TokenId, side: Side, price: Decimal, size: Decimal) -> Self {
        Self {
            token_id,
            side,
            price,
            size,
            order_type: OrderType::Gtc,
            expiration: None,
        }
    }

    /// Notional value of the request (`price * size`).
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// A placed order as tracked locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: OrderId,
    pub token_id: TokenId,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub expiration: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Build a record from a request, stamped with the current time.
    #[must_use]
    pub fn from_request(order_id: OrderId, request: &OrderRequest, status: OrderStatus) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            token_id: request.token_id.clone(),
            side: request.side,
            price: request.price,
            size: request.size,
            order_type: request.order_type,
            status,
            expiration: request.expiration,
            created_at: now,
            updated_at: now,
        }
    }

    /// Notional value of the order (`price * size`).
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}
