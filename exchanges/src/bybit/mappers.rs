use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;
use sweeper_core::types::{
    Exchange, ExchangeOrder, ExchangePosition, OrderKind, OrderMetadata, OrderSide, OrderStatus,
    PositionIndex, PositionSide, StopOrderType,
};

use crate::bybit::types::{BybitOrder, BybitPosition};

/// `retCode`/`retMsg` of a 200 reply that is really an error.
pub fn bybit_error(raw: &str) -> Option<(i64, String)> {
    let v: serde_json::Value = serde_json::from_str(raw).ok()?;
    let code = v.get("retCode")?.as_i64()?;
    if code == 0 {
        return None;
    }
    let message = v
        .get("retMsg")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some((code, message))
}

fn ms_string_to_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let ms = raw.parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(ms).single()
}

fn non_zero(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw).ok().filter(|d| !d.is_zero())
}

pub fn parse_side(raw: &str) -> Option<OrderSide> {
    match raw {
        "Buy" => Some(OrderSide::Buy),
        "Sell" => Some(OrderSide::Sell),
        _ => None,
    }
}

pub fn parse_status(raw: &str) -> Option<OrderStatus> {
    match raw {
        "New" | "Created" | "Active" => Some(OrderStatus::New),
        "PartiallyFilled" => Some(OrderStatus::PartiallyFilled),
        "Untriggered" => Some(OrderStatus::Untriggered),
        "Filled" | "Triggered" => Some(OrderStatus::Filled),
        "Cancelled" | "PartiallyFilledCanceled" => Some(OrderStatus::Canceled),
        "Rejected" => Some(OrderStatus::Rejected),
        "Deactivated" => Some(OrderStatus::Deactivated),
        _ => None,
    }
}

/// Bybit keeps the execution type (`Market`/`Limit`) and the stop flavour in
/// separate fields.
pub fn parse_kind(order_type: &str, stop: Option<&StopOrderType>) -> OrderKind {
    let market = order_type == "Market";
    match (stop, market) {
        (None, true) => OrderKind::Market,
        (None, false) if order_type == "Limit" => OrderKind::Limit,
        (None, false) => OrderKind::Other,
        (Some(StopOrderType::TrailingStop), _) => OrderKind::TrailingStop,
        (Some(StopOrderType::TakeProfit | StopOrderType::PartialTakeProfit), true) => {
            OrderKind::TakeProfitMarket
        }
        (Some(StopOrderType::TakeProfit | StopOrderType::PartialTakeProfit), false) => {
            OrderKind::TakeProfitLimit
        }
        (Some(_), true) => OrderKind::StopMarket,
        (Some(_), false) => OrderKind::StopLimit,
    }
}

pub fn order_to_snapshot(order: &BybitOrder) -> Option<ExchangeOrder> {
    let stop_order_type = StopOrderType::from_bybit(&order.stop_order_type);
    let trigger_price = non_zero(&order.trigger_price);
    let kind = parse_kind(&order.order_type, stop_order_type.as_ref());
    let conditional = stop_order_type.is_some() || trigger_price.is_some();
    Some(ExchangeOrder {
        exchange: Exchange::Bybit,
        order_id: order.order_id.clone(),
        client_order_id: Some(order.order_link_id.clone()).filter(|s| !s.is_empty()),
        symbol: order.symbol.clone(),
        side: parse_side(&order.side)?,
        kind,
        quantity: Decimal::from_str(&order.qty).ok()?,
        price: non_zero(&order.price),
        status: parse_status(&order.order_status)?,
        created_at: ms_string_to_datetime(&order.created_time)?,
        meta: OrderMetadata {
            reduce_only: order.reduce_only,
            close_on_trigger: order.close_on_trigger,
            stop_order_type,
            trigger_price,
            order_list_id: None,
            position_idx: PositionIndex::from_u8(order.position_idx),
            conditional,
        },
    })
}

/// Flat slots (`side` empty, size zero) are kept; the fetcher filters them.
pub fn position_to_snapshot(position: &BybitPosition) -> Option<ExchangePosition> {
    let position_idx = PositionIndex::from_u8(position.position_idx)?;
    let side = match position.side.as_str() {
        "Sell" => PositionSide::Short,
        "Buy" => PositionSide::Long,
        _ => match position_idx {
            PositionIndex::HedgeSell => PositionSide::Short,
            _ => PositionSide::Long,
        },
    };
    Some(ExchangePosition {
        exchange: Exchange::Bybit,
        symbol: position.symbol.clone(),
        side,
        size: Decimal::from_str(&position.size).ok()?.abs(),
        entry_price: Decimal::from_str(&position.avg_price).unwrap_or(Decimal::ZERO),
        mark_price: non_zero(&position.mark_price),
        position_idx,
    })
}
