//! Per-exchange cleanup counters.
//!
//! Every increment is also emitted as a tracing event carrying a
//! `monotonic_counter.*` field, so a metrics-aware subscriber can aggregate
//! without this crate depending on one.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use sweeper_core::types::Exchange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// Empty order list on an early attempt, non-empty on a later one.
    EmptyResponseMitigated,
    /// Every attempt empty, accepted as truth.
    EmptyResponseAccepted,
    /// Every attempt empty, previous list served from cache.
    EmptyResponseServedFromCache,
    RateLimitWaits,
    RateLimitHits,
    PhantomPositions,
    UntrackedPositions,
    QuantityMismatches,
    ZombiesFound,
    ZombiesCancelled,
    CancelFailures,
    Cycles,
}

#[derive(Debug, Default)]
pub struct CleanupMetrics {
    exchange: Option<Exchange>,
    empty_response_mitigated: AtomicU64,
    empty_response_accepted: AtomicU64,
    empty_response_served_from_cache: AtomicU64,
    rate_limit_waits: AtomicU64,
    rate_limit_hits: AtomicU64,
    phantom_positions: AtomicU64,
    untracked_positions: AtomicU64,
    quantity_mismatches: AtomicU64,
    zombies_found: AtomicU64,
    zombies_cancelled: AtomicU64,
    cancel_failures: AtomicU64,
    cycles: AtomicU64,
    last_cycle_ms: AtomicU64,
    total_cycle_ms: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub empty_response_mitigated: u64,
    pub empty_response_accepted: u64,
    pub empty_response_served_from_cache: u64,
    pub rate_limit_waits: u64,
    pub rate_limit_hits: u64,
    pub phantom_positions: u64,
    pub untracked_positions: u64,
    pub quantity_mismatches: u64,
    pub zombies_found: u64,
    pub zombies_cancelled: u64,
    pub cancel_failures: u64,
    pub cycles: u64,
    pub last_cycle_ms: u64,
    pub avg_cycle_ms: u64,
}

impl CleanupMetrics {
    pub fn new(exchange: Exchange) -> Self {
        Self {
            exchange: Some(exchange),
            ..Default::default()
        }
    }

    fn slot(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::EmptyResponseMitigated => &self.empty_response_mitigated,
            Counter::EmptyResponseAccepted => &self.empty_response_accepted,
            Counter::EmptyResponseServedFromCache => &self.empty_response_served_from_cache,
            Counter::RateLimitWaits => &self.rate_limit_waits,
            Counter::RateLimitHits => &self.rate_limit_hits,
            Counter::PhantomPositions => &self.phantom_positions,
            Counter::UntrackedPositions => &self.untracked_positions,
            Counter::QuantityMismatches => &self.quantity_mismatches,
            Counter::ZombiesFound => &self.zombies_found,
            Counter::ZombiesCancelled => &self.zombies_cancelled,
            Counter::CancelFailures => &self.cancel_failures,
            Counter::Cycles => &self.cycles,
        }
    }

    pub fn incr(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, n: u64) {
        if n == 0 {
            return;
        }
        self.slot(counter).fetch_add(n, Ordering::Relaxed);

        let exchange = self.exchange;
        match counter {
            Counter::EmptyResponseMitigated => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.empty_response_mitigated = n)
            }
            Counter::EmptyResponseAccepted => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.empty_response_accepted = n)
            }
            Counter::EmptyResponseServedFromCache => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.empty_response_served_from_cache = n)
            }
            Counter::RateLimitWaits => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.rate_limit_waits = n)
            }
            Counter::RateLimitHits => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.rate_limit_hits = n)
            }
            Counter::PhantomPositions => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.phantom_positions = n)
            }
            Counter::UntrackedPositions => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.untracked_positions = n)
            }
            Counter::QuantityMismatches => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.quantity_mismatches = n)
            }
            Counter::ZombiesFound => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.zombies_found = n)
            }
            Counter::ZombiesCancelled => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.zombies_cancelled = n)
            }
            Counter::CancelFailures => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.cancel_failures = n)
            }
            Counter::Cycles => {
                tracing::debug!(exchange = ?exchange, monotonic_counter.cleanup_cycles = n)
            }
        }
    }

    pub fn record_cycle_duration(&self, elapsed: Duration) {
        let ms = elapsed.as_millis() as u64;
        self.last_cycle_ms.store(ms, Ordering::Relaxed);
        self.total_cycle_ms.fetch_add(ms, Ordering::Relaxed);
        tracing::debug!(exchange = ?self.exchange, histogram.cleanup_cycle_ms = ms);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.slot(counter).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let cycles = self.get(Counter::Cycles);
        let total_ms = self.total_cycle_ms.load(Ordering::Relaxed);
        MetricsSnapshot {
            empty_response_mitigated: self.get(Counter::EmptyResponseMitigated),
            empty_response_accepted: self.get(Counter::EmptyResponseAccepted),
            empty_response_served_from_cache: self.get(Counter::EmptyResponseServedFromCache),
            rate_limit_waits: self.get(Counter::RateLimitWaits),
            rate_limit_hits: self.get(Counter::RateLimitHits),
            phantom_positions: self.get(Counter::PhantomPositions),
            untracked_positions: self.get(Counter::UntrackedPositions),
            quantity_mismatches: self.get(Counter::QuantityMismatches),
            zombies_found: self.get(Counter::ZombiesFound),
            zombies_cancelled: self.get(Counter::ZombiesCancelled),
            cancel_failures: self.get(Counter::CancelFailures),
            cycles,
            last_cycle_ms: self.last_cycle_ms.load(Ordering::Relaxed),
            avg_cycle_ms: total_ms.checked_div(cycles).unwrap_or(0),
        }
    }
}
