//! Rate-limited, cached view of one venue's orders and positions.
//!
//! One `StateFetcher` per exchange. It exclusively owns that exchange's rate
//! budget and order cache; nothing else mutates them.

pub mod budget;

use moka::sync::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use sweeper_core::config::types::CleanupConfig;
use sweeper_core::normalize_symbol;
use sweeper_core::traits::{ExchangeGateway, GatewayError};
use sweeper_core::types::{Exchange, ExchangeOrder, ExchangePosition};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::metrics::{CleanupMetrics, Counter};
pub use budget::{FetchOp, RateBudget, WeightTable};

const ALL_SYMBOLS_KEY: &str = "ALL";

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub weights: WeightTable,
    pub ceiling: u32,
    pub window: Duration,
    pub cache_ttl: Duration,
    pub call_timeout: Duration,
    pub rate_limit_cooldown: Duration,
    /// Venue rate-limit replies tolerated per call before giving up.
    pub max_rate_limit_retries: u32,
    /// Reads of an empty open-order list before empty is believed.
    pub empty_read_attempts: u32,
    pub empty_read_backoff: Duration,
    pub empty_read_backoff_cap: Duration,
}

impl FetcherConfig {
    /// Venue profile defaults.
    pub fn for_exchange(exchange: Exchange) -> Self {
        match exchange {
            Exchange::Binance => Self {
                weights: WeightTable::binance(),
                // Half of the 2400/min account limit, leaving room for the trading system
                ceiling: 1200,
                window: Duration::from_secs(60),
                empty_read_attempts: 1,
                ..Self::base()
            },
            Exchange::Bybit => Self {
                weights: WeightTable::uniform(1),
                ceiling: 600,
                window: Duration::from_secs(5),
                // Bybit's realtime order list intermittently comes back empty
                empty_read_attempts: 3,
                ..Self::base()
            },
        }
    }

    fn base() -> Self {
        Self {
            weights: WeightTable::uniform(1),
            ceiling: 100,
            window: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(3),
            call_timeout: Duration::from_secs(10),
            rate_limit_cooldown: Duration::from_secs(5),
            max_rate_limit_retries: 3,
            empty_read_attempts: 1,
            empty_read_backoff: Duration::from_millis(250),
            empty_read_backoff_cap: Duration::from_secs(2),
        }
    }

    /// Venue profile with `[cleanup]` settings and per-venue overrides applied.
    pub fn from_cleanup(exchange: Exchange, cfg: &CleanupConfig) -> Self {
        let overrides = cfg.overrides_for(exchange);
        let profile = Self::for_exchange(exchange);
        Self {
            cache_ttl: overrides
                .cache_ttl_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| cfg.cache_ttl()),
            call_timeout: cfg.call_timeout(),
            rate_limit_cooldown: Duration::from_secs(cfg.rate_limit_cooldown_secs),
            max_rate_limit_retries: cfg.max_rate_limit_retries,
            empty_read_attempts: overrides
                .empty_read_attempts
                .unwrap_or(profile.empty_read_attempts),
            empty_read_backoff: Duration::from_millis(cfg.empty_read_backoff_ms),
            ..profile
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    orders: Arc<Vec<ExchangeOrder>>,
    fetched_at: Instant,
}

pub struct StateFetcher {
    gateway: Arc<dyn ExchangeGateway>,
    config: FetcherConfig,
    budget: Mutex<RateBudget>,
    cache: Cache<String, CacheEntry>,
    metrics: Arc<CleanupMetrics>,
}

impl StateFetcher {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        config: FetcherConfig,
        metrics: Arc<CleanupMetrics>,
    ) -> Self {
        let budget = RateBudget::new(config.ceiling, config.window, Instant::now());
        let cache = Cache::builder()
            .max_capacity(512)
            .time_to_live(config.cache_ttl)
            .build();
        Self {
            gateway,
            config,
            budget: Mutex::new(budget),
            cache,
            metrics,
        }
    }

    pub fn exchange(&self) -> Exchange {
        self.gateway.exchange()
    }

    pub fn gateway(&self) -> &dyn ExchangeGateway {
        self.gateway.as_ref()
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    pub async fn budget_used(&self) -> u32 {
        self.budget.lock().await.used()
    }

    fn cache_key(symbol: Option<&str>) -> String {
        symbol
            .map(normalize_symbol)
            .unwrap_or_else(|| ALL_SYMBOLS_KEY.to_string())
    }

    /// Block until the budget can absorb `op`. Each wait is bounded by the
    /// window length.
    async fn acquire(&self, op: FetchOp) {
        let weight = self.config.weights.weight(op);
        loop {
            let wait = {
                let mut budget = self.budget.lock().await;
                match budget.try_acquire(weight, Instant::now()) {
                    Ok(()) => return,
                    Err(wait) => wait.min(self.config.window),
                }
            };
            self.metrics.incr(Counter::RateLimitWaits);
            debug!(
                exchange = %self.exchange(),
                op = ?op,
                wait_ms = wait.as_millis() as u64,
                "Rate budget exhausted, waiting for window reset"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Run one venue call under the rate budget and a bounded wait.
    ///
    /// A venue rate-limit reply resets the local budget, cools down and
    /// retries, up to `max_rate_limit_retries` times. Other errors are
    /// returned untouched for the caller's own retry policy.
    pub async fn throttled<T, F, Fut>(&self, op: FetchOp, mut call: F) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let mut rate_limit_hits = 0;
        loop {
            self.acquire(op).await;

            let result = match tokio::time::timeout(self.config.call_timeout, call()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(
                        exchange = %self.exchange(),
                        op = ?op,
                        timeout_ms = self.config.call_timeout.as_millis() as u64,
                        "Venue call timed out"
                    );
                    return Err(GatewayError::Timeout);
                }
            };

            match result {
                Err(e) if e.is_rate_limit() => {
                    rate_limit_hits += 1;
                    self.metrics.incr(Counter::RateLimitHits);
                    if rate_limit_hits > self.config.max_rate_limit_retries {
                        warn!(
                            exchange = %self.exchange(),
                            op = ?op,
                            hits = rate_limit_hits,
                            "Rate limited repeatedly, giving up on call"
                        );
                        return Err(e);
                    }
                    self.budget.lock().await.reset(Instant::now());
                    warn!(
                        exchange = %self.exchange(),
                        op = ?op,
                        cooldown_ms = self.config.rate_limit_cooldown.as_millis() as u64,
                        "Venue rate limit hit, cooling down"
                    );
                    tokio::time::sleep(self.config.rate_limit_cooldown).await;
                }
                other => return other,
            }
        }
    }

    /// Open orders, served from cache when the last read is within TTL.
    pub async fn fetch_open_orders(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<ExchangeOrder>, GatewayError> {
        let key = Self::cache_key(symbol);
        if let Some(entry) = self.cache.get(&key)
            && entry.fetched_at.elapsed() <= self.config.cache_ttl
        {
            debug!(exchange = %self.exchange(), key = %key, "Open orders served from cache");
            return Ok(entry.orders.as_ref().clone());
        }
        self.read_orders(symbol, key).await
    }

    /// Open orders straight from the venue, skipping any cache hit.
    pub async fn fetch_open_orders_fresh(
        &self,
        symbol: Option<&str>,
    ) -> Result<Vec<ExchangeOrder>, GatewayError> {
        let key = Self::cache_key(symbol);
        self.read_orders(symbol, key).await
    }

    async fn read_orders(
        &self,
        symbol: Option<&str>,
        key: String,
    ) -> Result<Vec<ExchangeOrder>, GatewayError> {
        let op = if symbol.is_some() {
            FetchOp::OpenOrdersSymbol
        } else {
            FetchOp::OpenOrdersAll
        };
        let attempts = self.config.empty_read_attempts.max(1);
        let mut backoff = self.config.empty_read_backoff;

        for attempt in 1..=attempts {
            let orders = self
                .throttled(op, || self.gateway.fetch_open_orders(symbol))
                .await?;

            if !orders.is_empty() {
                if attempt > 1 {
                    self.metrics.incr(Counter::EmptyResponseMitigated);
                    info!(
                        exchange = %self.exchange(),
                        key = %key,
                        attempt = attempt,
                        orders = orders.len(),
                        "Empty open-order response mitigated by retry"
                    );
                }
                self.cache.insert(
                    key,
                    CacheEntry {
                        orders: Arc::new(orders.clone()),
                        fetched_at: Instant::now(),
                    },
                );
                return Ok(orders);
            }

            if attempt < attempts {
                debug!(
                    exchange = %self.exchange(),
                    key = %key,
                    attempt = attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Open-order list empty, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.config.empty_read_backoff_cap);
            }
        }

        // Every attempt empty. A list seen within TTL outranks one empty read.
        if let Some(entry) = self.cache.get(&key)
            && !entry.orders.is_empty()
            && entry.fetched_at.elapsed() <= self.config.cache_ttl
        {
            self.metrics.incr(Counter::EmptyResponseServedFromCache);
            warn!(
                exchange = %self.exchange(),
                key = %key,
                cached = entry.orders.len(),
                "Open-order list empty on every attempt, serving cached list"
            );
            return Ok(entry.orders.as_ref().clone());
        }

        if attempts > 1 {
            self.metrics.incr(Counter::EmptyResponseAccepted);
        }
        self.cache.insert(
            key,
            CacheEntry {
                orders: Arc::new(Vec::new()),
                fetched_at: Instant::now(),
            },
        );
        Ok(Vec::new())
    }

    /// Positions with size > 0. Zero-size rows are not positions.
    pub async fn fetch_positions(&self) -> Result<Vec<ExchangePosition>, GatewayError> {
        let positions = self
            .throttled(FetchOp::Positions, || self.gateway.fetch_positions())
            .await?;
        Ok(positions.into_iter().filter(|p| p.is_active()).collect())
    }

    pub async fn fetch_order(
        &self,
        order_id: &str,
        symbol: &str,
    ) -> Result<ExchangeOrder, GatewayError> {
        self.throttled(FetchOp::OrderById, || {
            self.gateway.fetch_order(order_id, symbol)
        })
        .await
    }

    /// Drop every cached list. Called after cancels so the next read reflects them.
    pub fn invalidate(&self) {
        self.cache.invalidate_all();
    }
}
