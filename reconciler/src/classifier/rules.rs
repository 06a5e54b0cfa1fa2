//! Per-venue classification rules.
//!
//! The rule chain in [`super::Classifier`] is shared. Venues only decide what
//! else counts as protective, which hedge index an order should carry, and
//! which orders are worth confirming by id.

use std::time::Duration;
use sweeper_core::types::{
    Exchange, ExchangeOrder, ExchangePosition, OrderSide, PositionIndex,
};

pub trait VenueRules: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// Extra orders the venue treats as position protection. Can only widen
    /// the shared protective set.
    fn widens_protective(&self, order: &ExchangeOrder) -> bool {
        let _ = order;
        false
    }

    fn is_protective(&self, order: &ExchangeOrder) -> bool {
        order.kind.is_protective()
            || order.is_tp_sl()
            || order.meta.reduce_only
            || order.meta.close_on_trigger
            || self.widens_protective(order)
    }

    /// Index the order should carry given the live positions on its symbol,
    /// or `None` when a live position sits under the order's own index or
    /// the index is unknown.
    ///
    /// With several live slots the one matching the order's side wins,
    /// otherwise the first live slot.
    fn expected_position_idx(
        &self,
        order: &ExchangeOrder,
        positions: &[&ExchangePosition],
    ) -> Option<PositionIndex> {
        let actual = order.meta.position_idx?;
        if positions.is_empty() || positions.iter().any(|p| p.position_idx == actual) {
            return None;
        }
        let side_slot = match order.side {
            OrderSide::Buy => PositionIndex::HedgeBuy,
            OrderSide::Sell => PositionIndex::HedgeSell,
        };
        positions
            .iter()
            .map(|p| p.position_idx)
            .find(|idx| *idx == side_slot)
            .or_else(|| positions.first().map(|p| p.position_idx))
    }

    /// Whether the listed order should be confirmed with a by-id lookup.
    fn needs_lookup(&self, order: &ExchangeOrder, age: Duration, lookup_after: Duration) -> bool {
        let _ = order;
        age >= lookup_after
    }
}

/// Binance USDⓈ-M futures.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinanceRules;

impl VenueRules for BinanceRules {
    fn exchange(&self) -> Exchange {
        Exchange::Binance
    }

    /// Algo-book orders are conditional by construction.
    fn widens_protective(&self, order: &ExchangeOrder) -> bool {
        order.meta.conditional && order.meta.trigger_price.is_some()
    }

    /// `/fapi/v1/order` does not serve the algo book, so conditional orders
    /// cannot be confirmed by id.
    fn needs_lookup(&self, order: &ExchangeOrder, age: Duration, lookup_after: Duration) -> bool {
        !order.meta.conditional && age >= lookup_after
    }
}

/// Bybit V5 linear perpetuals.
#[derive(Debug, Clone, Copy, Default)]
pub struct BybitRules;

impl VenueRules for BybitRules {
    fn exchange(&self) -> Exchange {
        Exchange::Bybit
    }

    /// Any stop subtype, including ones this build does not know, and any
    /// order armed with a trigger price.
    fn widens_protective(&self, order: &ExchangeOrder) -> bool {
        order.meta.stop_order_type.is_some() || order.meta.trigger_price.is_some()
    }
}

pub fn rules_for(exchange: Exchange) -> Box<dyn VenueRules> {
    match exchange {
        Exchange::Binance => Box::new(BinanceRules),
        Exchange::Bybit => Box::new(BybitRules),
    }
}
