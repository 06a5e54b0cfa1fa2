use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumProperty, EnumString};

// ──────────────────────────────────────────────────────────────────
// Venues
// ──────────────────────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    EnumProperty,
)]
#[serde(rename_all = "lowercase")]
pub enum Exchange {
    #[strum(to_string = "binance", serialize = "BN", props(short_code = "BN"))]
    Binance,
    #[strum(to_string = "bybit", serialize = "BY", props(short_code = "BY"))]
    Bybit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Live,
    #[default]
    Paper,
}

// ──────────────────────────────────────────────────────────────────
// Order vocabulary
// ──────────────────────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Market,
    Limit,
    StopMarket,
    StopLimit,
    TakeProfitMarket,
    TakeProfitLimit,
    TrailingStop,
    Other,
}

impl OrderKind {
    /// Stop, take-profit and trailing orders. Their lifecycle belongs to the
    /// venue while the position they protect is open.
    pub fn is_protective(self) -> bool {
        matches!(
            self,
            OrderKind::StopMarket
                | OrderKind::StopLimit
                | OrderKind::TakeProfitMarket
                | OrderKind::TakeProfitLimit
                | OrderKind::TrailingStop
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Untriggered,
    Filled,
    Canceled,
    Rejected,
    Expired,
    Deactivated,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::Deactivated
        )
    }

    pub fn is_open(self) -> bool {
        !self.is_terminal()
    }
}

/// Venue-reported stop subtype. Bybit reports it explicitly (`stopOrderType`),
/// Binance derives it from the order type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StopOrderType {
    TakeProfit,
    StopLoss,
    TrailingStop,
    PartialTakeProfit,
    PartialStopLoss,
    TpslOrder,
    Stop,
    Other(String),
}

impl StopOrderType {
    pub fn is_tp_sl(&self) -> bool {
        !matches!(self, StopOrderType::Other(_))
    }

    /// Parse a Bybit `stopOrderType` value. Empty means "not a stop order".
    pub fn from_bybit(raw: &str) -> Option<Self> {
        let parsed = match raw {
            "" | "UNKNOWN" => return None,
            "TakeProfit" => StopOrderType::TakeProfit,
            "StopLoss" => StopOrderType::StopLoss,
            "TrailingStop" => StopOrderType::TrailingStop,
            "PartialTakeProfit" => StopOrderType::PartialTakeProfit,
            "PartialStopLoss" => StopOrderType::PartialStopLoss,
            "tpslOrder" => StopOrderType::TpslOrder,
            "Stop" => StopOrderType::Stop,
            other => StopOrderType::Other(other.to_string()),
        };
        Some(parsed)
    }
}

impl fmt::Display for StopOrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopOrderType::Other(raw) => write!(f, "other({raw})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Hedge-mode position discriminator. One-way mode always uses index 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PositionIndex {
    OneWay,
    HedgeBuy,
    HedgeSell,
}

impl PositionIndex {
    pub const ALL: [PositionIndex; 3] = [
        PositionIndex::OneWay,
        PositionIndex::HedgeBuy,
        PositionIndex::HedgeSell,
    ];

    pub fn as_u8(self) -> u8 {
        match self {
            PositionIndex::OneWay => 0,
            PositionIndex::HedgeBuy => 1,
            PositionIndex::HedgeSell => 2,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PositionIndex::OneWay),
            1 => Some(PositionIndex::HedgeBuy),
            2 => Some(PositionIndex::HedgeSell),
            _ => None,
        }
    }

    /// The hedge slot that holds a position of `side`.
    pub fn for_hedge_side(side: PositionSide) -> Self {
        match side {
            PositionSide::Long => PositionIndex::HedgeBuy,
            PositionSide::Short => PositionIndex::HedgeSell,
        }
    }
}

impl fmt::Display for PositionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// ──────────────────────────────────────────────────────────────────
// Snapshots
// ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderMetadata {
    pub reduce_only: bool,
    pub close_on_trigger: bool,
    pub stop_order_type: Option<StopOrderType>,
    pub trigger_price: Option<Decimal>,
    /// OCO / order-list identifier shared by linked siblings.
    pub order_list_id: Option<String>,
    pub position_idx: Option<PositionIndex>,
    /// Lives in the venue's conditional/algo book and needs the conditional
    /// flag to be cancelled.
    pub conditional: bool,
}

/// Venue-reported open order. Re-fetched every cycle, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeOrder {
    pub exchange: Exchange,
    pub order_id: String,
    pub client_order_id: Option<String>,
    /// Raw venue spelling. Compare through `normalize_symbol`.
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub meta: OrderMetadata,
}

impl ExchangeOrder {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }

    pub fn is_tp_sl(&self) -> bool {
        self.meta
            .stop_order_type
            .as_ref()
            .is_some_and(StopOrderType::is_tp_sl)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePosition {
    pub exchange: Exchange,
    pub symbol: String,
    pub side: PositionSide,
    /// Absolute size. Zero-size rows are not positions.
    pub size: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Option<Decimal>,
    pub position_idx: PositionIndex,
}

impl ExchangePosition {
    pub fn is_active(&self) -> bool {
        self.size > Decimal::ZERO
    }
}

/// The trading system's own belief about an open position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalPosition {
    pub exchange: Exchange,
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelRequest {
    pub order_id: String,
    pub symbol: String,
    pub conditional: bool,
    pub position_idx: Option<PositionIndex>,
}

impl CancelRequest {
    pub fn for_order(order: &ExchangeOrder) -> Self {
        Self {
            order_id: order.order_id.clone(),
            symbol: order.symbol.clone(),
            conditional: order.meta.conditional,
            position_idx: order.meta.position_idx,
        }
    }
}
