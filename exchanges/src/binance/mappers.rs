//! Binance payloads to venue-neutral snapshots.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use sweeper_core::types::{
    Exchange, ExchangeOrder, ExchangePosition, OrderKind, OrderMetadata, OrderSide, OrderStatus,
    PositionIndex, PositionSide, StopOrderType,
};

use crate::binance::types::{BinanceAlgoOrder, BinanceOrder, BinancePositionRisk};

pub fn ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Binance sends "0" for unset prices.
fn non_zero(raw: Option<&str>) -> Option<Decimal> {
    raw.and_then(|s| Decimal::from_str(s).ok())
        .filter(|d| !d.is_zero())
}

pub fn parse_side(raw: &str) -> Option<OrderSide> {
    match raw {
        "BUY" => Some(OrderSide::Buy),
        "SELL" => Some(OrderSide::Sell),
        _ => None,
    }
}

pub fn parse_kind(raw: &str) -> OrderKind {
    match raw {
        "LIMIT" => OrderKind::Limit,
        "MARKET" => OrderKind::Market,
        "STOP" => OrderKind::StopLimit,
        "STOP_MARKET" => OrderKind::StopMarket,
        "TAKE_PROFIT" => OrderKind::TakeProfitLimit,
        "TAKE_PROFIT_MARKET" => OrderKind::TakeProfitMarket,
        "TRAILING_STOP_MARKET" => OrderKind::TrailingStop,
        _ => OrderKind::Other,
    }
}

pub fn parse_status(raw: &str) -> Option<OrderStatus> {
    match raw {
        "NEW" => Some(OrderStatus::New),
        "PARTIALLY_FILLED" => Some(OrderStatus::PartiallyFilled),
        "FILLED" | "FINISHED" => Some(OrderStatus::Filled),
        "CANCELED" | "CANCELLED" => Some(OrderStatus::Canceled),
        "REJECTED" => Some(OrderStatus::Rejected),
        "EXPIRED" | "EXPIRED_IN_MATCH" => Some(OrderStatus::Expired),
        // Algo orders waiting for their trigger
        "WORKING" | "TRIGGERING" => Some(OrderStatus::Untriggered),
        "TRIGGERED" => Some(OrderStatus::Filled),
        _ => None,
    }
}

/// `BOTH` is one-way mode. A missing field is treated the same.
pub fn parse_position_side(raw: Option<&str>) -> PositionIndex {
    match raw {
        Some("LONG") => PositionIndex::HedgeBuy,
        Some("SHORT") => PositionIndex::HedgeSell,
        _ => PositionIndex::OneWay,
    }
}

fn stop_type_for(kind: OrderKind) -> Option<StopOrderType> {
    match kind {
        OrderKind::StopMarket | OrderKind::StopLimit => Some(StopOrderType::StopLoss),
        OrderKind::TakeProfitMarket | OrderKind::TakeProfitLimit => {
            Some(StopOrderType::TakeProfit)
        }
        OrderKind::TrailingStop => Some(StopOrderType::TrailingStop),
        _ => None,
    }
}

pub fn order_to_snapshot(order: &BinanceOrder) -> Option<ExchangeOrder> {
    let kind = parse_kind(&order.order_type);
    let trigger_price = non_zero(order.stop_price.as_deref());
    Some(ExchangeOrder {
        exchange: Exchange::Binance,
        order_id: order.order_id.to_string(),
        client_order_id: order.client_order_id.clone().filter(|s| !s.is_empty()),
        symbol: order.symbol.clone(),
        side: parse_side(&order.side)?,
        kind,
        quantity: Decimal::from_str(&order.orig_qty).ok()?,
        price: non_zero(order.price.as_deref()),
        status: parse_status(&order.status)?,
        created_at: ms_to_datetime(order.time)?,
        meta: OrderMetadata {
            reduce_only: order.reduce_only,
            close_on_trigger: order.close_position,
            stop_order_type: stop_type_for(kind),
            trigger_price,
            order_list_id: None,
            position_idx: Some(parse_position_side(order.position_side.as_deref())),
            conditional: false,
        },
    })
}

pub fn algo_order_to_snapshot(order: &BinanceAlgoOrder) -> Option<ExchangeOrder> {
    let kind = parse_kind(&order.order_type);
    Some(ExchangeOrder {
        exchange: Exchange::Binance,
        order_id: order.algo_id.to_string(),
        client_order_id: order.client_algo_id.clone().filter(|s| !s.is_empty()),
        symbol: order.symbol.clone(),
        side: parse_side(&order.side)?,
        kind,
        quantity: Decimal::from_str(&order.quantity).unwrap_or(Decimal::ZERO),
        price: non_zero(order.price.as_deref()),
        // An algo order is NEW until its trigger fires
        status: match order.algo_status.as_str() {
            "NEW" => OrderStatus::Untriggered,
            other => parse_status(other).unwrap_or(OrderStatus::Untriggered),
        },
        created_at: ms_to_datetime(order.create_time)?,
        meta: OrderMetadata {
            reduce_only: order.reduce_only,
            close_on_trigger: order.close_position,
            stop_order_type: stop_type_for(kind),
            trigger_price: non_zero(order.trigger_price.as_deref()),
            order_list_id: None,
            position_idx: Some(parse_position_side(order.position_side.as_deref())),
            conditional: true,
        },
    })
}

/// Zero-amount rows are kept; the fetcher filters them.
pub fn position_to_snapshot(risk: &BinancePositionRisk) -> Option<ExchangePosition> {
    let amount = Decimal::from_str(&risk.position_amt).ok()?;
    let position_idx = parse_position_side(risk.position_side.as_deref());
    let side = match position_idx {
        PositionIndex::HedgeBuy => PositionSide::Long,
        PositionIndex::HedgeSell => PositionSide::Short,
        PositionIndex::OneWay if amount < Decimal::ZERO => PositionSide::Short,
        PositionIndex::OneWay => PositionSide::Long,
    };
    Some(ExchangePosition {
        exchange: Exchange::Binance,
        symbol: risk.symbol.clone(),
        side,
        size: amount.abs(),
        entry_price: Decimal::from_str(&risk.entry_price).unwrap_or(Decimal::ZERO),
        mark_price: non_zero(risk.mark_price.as_deref()),
        position_idx,
    })
}
