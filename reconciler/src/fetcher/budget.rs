//! Weight-based rolling rate budget.
//!
//! Venues charge each endpoint a weight against a per-window ceiling. The
//! budget is checked before every call so the fetcher sleeps until the
//! window rolls instead of firing into a hard rejection.

use std::time::Duration;
use sweeper_core::types::Exchange;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchOp {
    OpenOrdersAll,
    OpenOrdersSymbol,
    Positions,
    OrderById,
    Cancel,
    CancelOrderList,
    ClearStops,
    CancelAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightTable {
    pub open_orders_all: u32,
    pub open_orders_symbol: u32,
    pub positions: u32,
    pub order_by_id: u32,
    pub cancel: u32,
    pub cancel_order_list: u32,
    pub clear_stops: u32,
    pub cancel_all: u32,
}

impl WeightTable {
    /// USDⓈ-M futures request weights. Listing every symbol's open orders
    /// costs 40 against 1 for a single symbol.
    pub fn binance() -> Self {
        Self {
            open_orders_all: 40,
            open_orders_symbol: 1,
            positions: 5,
            order_by_id: 1,
            cancel: 1,
            cancel_order_list: 1,
            clear_stops: 1,
            cancel_all: 1,
        }
    }

    /// Bybit counts requests per endpoint, so every call weighs the same.
    pub fn uniform(weight: u32) -> Self {
        Self {
            open_orders_all: weight,
            open_orders_symbol: weight,
            positions: weight,
            order_by_id: weight,
            cancel: weight,
            cancel_order_list: weight,
            clear_stops: weight,
            cancel_all: weight,
        }
    }

    pub fn for_exchange(exchange: Exchange) -> Self {
        match exchange {
            Exchange::Binance => Self::binance(),
            Exchange::Bybit => Self::uniform(1),
        }
    }

    pub fn weight(&self, op: FetchOp) -> u32 {
        match op {
            FetchOp::OpenOrdersAll => self.open_orders_all,
            FetchOp::OpenOrdersSymbol => self.open_orders_symbol,
            FetchOp::Positions => self.positions,
            FetchOp::OrderById => self.order_by_id,
            FetchOp::Cancel => self.cancel,
            FetchOp::CancelOrderList => self.cancel_order_list,
            FetchOp::ClearStops => self.clear_stops,
            FetchOp::CancelAll => self.cancel_all,
        }
    }
}

/// Used weight within the current window. Process-local, never persisted.
#[derive(Debug, Clone)]
pub struct RateBudget {
    ceiling: u32,
    window: Duration,
    used: u32,
    window_start: Instant,
}

impl RateBudget {
    pub fn new(ceiling: u32, window: Duration, now: Instant) -> Self {
        Self {
            ceiling: ceiling.max(1),
            window,
            used: 0,
            window_start: now,
        }
    }

    fn roll(&mut self, now: Instant) {
        if now >= self.reset_at() {
            self.used = 0;
            self.window_start = now;
        }
    }

    /// Charge `weight` if it fits. Otherwise return how long until the window
    /// resets. A single call heavier than the ceiling is charged as the whole
    /// window so it can still go through after a reset.
    pub fn try_acquire(&mut self, weight: u32, now: Instant) -> Result<(), Duration> {
        self.roll(now);
        let weight = weight.min(self.ceiling);
        if self.used + weight <= self.ceiling {
            self.used += weight;
            Ok(())
        } else {
            Err(self.reset_at().saturating_duration_since(now))
        }
    }

    /// Start a fresh window. Used after the venue itself reports a rate
    /// limit, at which point local accounting is known to be wrong.
    pub fn reset(&mut self, now: Instant) {
        self.used = 0;
        self.window_start = now;
    }

    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    pub fn reset_at(&self) -> Instant {
        self.window_start + self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn binance_all_symbols_costs_more_than_one() {
        let w = WeightTable::binance();
        assert!(w.weight(FetchOp::OpenOrdersAll) > w.weight(FetchOp::OpenOrdersSymbol));
    }

    #[test]
    fn exhausted_budget_reports_wait_until_reset() {
        let start = Instant::now();
        let mut budget = RateBudget::new(10, Duration::from_secs(60), start);
        assert!(budget.try_acquire(10, start).is_ok());

        let later = start + Duration::from_secs(15);
        assert_eq!(budget.try_acquire(1, later), Err(Duration::from_secs(45)));

        let after_reset = start + Duration::from_secs(60);
        assert!(budget.try_acquire(1, after_reset).is_ok());
        assert_eq!(budget.used(), 1);
    }

    #[test]
    fn oversized_weight_is_clamped_to_ceiling() {
        let now = Instant::now();
        let mut budget = RateBudget::new(5, Duration::from_secs(1), now);
        assert!(budget.try_acquire(40, now).is_ok());
        assert_eq!(budget.used(), 5);
    }

    #[test]
    fn reset_clears_usage() {
        let now = Instant::now();
        let mut budget = RateBudget::new(3, Duration::from_secs(10), now);
        budget.try_acquire(3, now).unwrap();
        budget.reset(now);
        assert_eq!(budget.used(), 0);
        assert!(budget.try_acquire(3, now).is_ok());
    }

    proptest! {
        #[test]
        fn used_never_exceeds_ceiling(
            ceiling in 1u32..200,
            calls in proptest::collection::vec((0u32..60, 0u64..3_000), 1..200),
        ) {
            let start = Instant::now();
            let mut budget = RateBudget::new(ceiling, Duration::from_secs(1), start);
            let mut elapsed = Duration::ZERO;
            for (weight, step_ms) in calls {
                elapsed += Duration::from_millis(step_ms);
                let now = start + elapsed;
                let before = budget.used();
                match budget.try_acquire(weight, now) {
                    Ok(()) => {}
                    Err(wait) => {
                        prop_assert!(wait > Duration::ZERO);
                        prop_assert!(wait <= Duration::from_secs(1));
                        prop_assert!(before + weight.min(ceiling) > ceiling);
                    }
                }
                prop_assert!(budget.used() <= budget.ceiling());
            }
        }
    }
}
