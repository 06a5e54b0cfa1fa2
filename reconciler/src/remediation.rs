//! Cancels and clears zombies. Every operation is idempotent: an order that
//! is already gone counts as handled.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use sweeper_core::config::types::RetryCfg;
use sweeper_core::traits::GatewayError;
use sweeper_core::types::{CancelRequest, ExchangeOrder, PositionIndex};
use tracing::{debug, error, info, warn};

use crate::classifier::{Classification, RemediationPlan};
use crate::fetcher::{FetchOp, StateFetcher};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
        }
    }
}

impl From<&RetryCfg> for RetryConfig {
    fn from(cfg: &RetryCfg) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_backoff: Duration::from_millis(cfg.base_backoff_ms),
            max_backoff: Duration::from_millis(cfg.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationOutcome {
    Cancelled,
    AlreadyGone,
    /// The venue refuses this operation for this order or symbol.
    Skipped(String),
    Failed(String),
}

impl RemediationOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(
            self,
            RemediationOutcome::Cancelled | RemediationOutcome::AlreadyGone
        )
    }
}

pub struct RemediationExecutor {
    fetcher: Arc<StateFetcher>,
    retry: RetryConfig,
}

impl RemediationExecutor {
    pub fn new(fetcher: Arc<StateFetcher>, retry: RetryConfig) -> Self {
        Self { fetcher, retry }
    }

    /// Transient failures are retried with capped exponential backoff. Rate
    /// limits are left to the fetcher's throttle and not retried here.
    async fn with_retry<F, Fut>(&self, op: FetchOp, mut call: F) -> Result<(), GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), GatewayError>>,
    {
        let mut backoff = self.retry.base_backoff;
        let mut attempt = 1;
        loop {
            match self.fetcher.throttled(op, &mut call).await {
                Ok(()) => return Ok(()),
                Err(e)
                    if e.is_transient()
                        && !e.is_rate_limit()
                        && attempt < self.retry.max_attempts => {
                    debug!(
                        exchange = %self.fetcher.exchange(),
                        op = ?op,
                        attempt = attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Transient venue error, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn outcome(
        &self,
        result: Result<(), GatewayError>,
        order: &ExchangeOrder,
        label: &str,
    ) -> RemediationOutcome {
        let exchange = self.fetcher.exchange();
        match result {
            Ok(()) => {
                info!(
                    exchange = %exchange,
                    order_id = %order.order_id,
                    symbol = %order.symbol,
                    classification = label,
                    "Zombie order cancelled"
                );
                RemediationOutcome::Cancelled
            }
            Err(e) if e.is_order_gone() => {
                info!(
                    exchange = %exchange,
                    order_id = %order.order_id,
                    symbol = %order.symbol,
                    classification = label,
                    "Order already gone"
                );
                RemediationOutcome::AlreadyGone
            }
            Err(e) if e.is_precondition() => {
                warn!(
                    exchange = %exchange,
                    order_id = %order.order_id,
                    symbol = %order.symbol,
                    classification = label,
                    error = %e,
                    "Venue refused cancel, skipping"
                );
                RemediationOutcome::Skipped(e.to_string())
            }
            Err(e) => {
                error!(
                    exchange = %exchange,
                    order_id = %order.order_id,
                    symbol = %order.symbol,
                    classification = label,
                    error = %e,
                    "Cancel failed"
                );
                RemediationOutcome::Failed(e.to_string())
            }
        }
    }

    async fn cancel_single(
        &self,
        order: &ExchangeOrder,
        conditional: bool,
        label: &str,
    ) -> RemediationOutcome {
        let request = CancelRequest {
            conditional,
            ..CancelRequest::for_order(order)
        };
        let gateway = self.fetcher.gateway();
        let result = self
            .with_retry(FetchOp::Cancel, || gateway.cancel_order(&request))
            .await;
        self.outcome(result, order, label)
    }

    /// Act on one classification. Stop clearing for a single order goes
    /// through [`Self::clear_symbol_stops`]; the orchestrator batches those
    /// per symbol instead.
    pub async fn remediate(&self, classification: &Classification) -> RemediationOutcome {
        let order = &classification.order;
        let label = classification.verdict.label();
        match classification.plan() {
            RemediationPlan::None => RemediationOutcome::Skipped("not a zombie".to_string()),
            RemediationPlan::CancelOrder { conditional } => {
                self.cancel_single(order, conditional, label).await
            }
            RemediationPlan::CancelOrderList { list_id } => {
                let gateway = self.fetcher.gateway();
                let result = self
                    .with_retry(FetchOp::CancelOrderList, || {
                        gateway.cancel_order_list(&list_id, &order.symbol)
                    })
                    .await;
                match result {
                    Ok(()) => self.outcome(Ok(()), order, label),
                    Err(e) if e.is_order_gone() => self.outcome(Err(e), order, label),
                    Err(e) => {
                        warn!(
                            exchange = %self.fetcher.exchange(),
                            order_id = %order.order_id,
                            list_id = %list_id,
                            error = %e,
                            "Order-list cancel unavailable, cancelling order directly"
                        );
                        self.cancel_single(order, order.meta.conditional, label)
                            .await
                    }
                }
            }
            RemediationPlan::ClearPositionStops => {
                let mut outcomes = self.clear_symbol_stops(&order.symbol, &[order]).await;
                outcomes
                    .pop()
                    .unwrap_or_else(|| RemediationOutcome::Skipped("nothing to clear".to_string()))
            }
        }
    }

    /// Clear stop levels left on `symbol` after its position closed.
    ///
    /// When the venue supports position-level clearing for the symbol, every
    /// hedge index is zeroed since the owning index is often unknown. "Not
    /// modified" and index-mismatch replies mean that index had nothing set.
    /// If no index was cleared, or the symbol is not eligible, each order is
    /// cancelled individually with the conditional flag.
    ///
    /// Returns one outcome per entry of `orders`, in order.
    pub async fn clear_symbol_stops(
        &self,
        symbol: &str,
        orders: &[&ExchangeOrder],
    ) -> Vec<RemediationOutcome> {
        let exchange = self.fetcher.exchange();
        let gateway = self.fetcher.gateway();

        if gateway.supports_position_stops(symbol) {
            let mut cleared = 0;
            for idx in PositionIndex::ALL {
                let result = self
                    .with_retry(FetchOp::ClearStops, || {
                        gateway.clear_position_stops(symbol, idx)
                    })
                    .await;
                match result {
                    Ok(()) => cleared += 1,
                    Err(e) if e.is_precondition() || e.is_order_gone() => {
                        debug!(
                            exchange = %exchange,
                            symbol = symbol,
                            position_idx = %idx,
                            error = %e,
                            "Nothing to clear on index"
                        );
                    }
                    Err(e) => {
                        warn!(
                            exchange = %exchange,
                            symbol = symbol,
                            position_idx = %idx,
                            error = %e,
                            "Position stop clearing failed on index"
                        );
                    }
                }
            }

            if cleared > 0 {
                info!(
                    exchange = %exchange,
                    symbol = symbol,
                    indices = cleared,
                    orders = orders.len(),
                    "Position-level stops cleared"
                );
                return vec![RemediationOutcome::Cancelled; orders.len()];
            }
        } else {
            debug!(
                exchange = %exchange,
                symbol = symbol,
                "Symbol not eligible for position-level stop clearing"
            );
        }

        let mut outcomes = Vec::with_capacity(orders.len());
        for order in orders {
            outcomes.push(
                self.cancel_single(order, true, "protective_for_closed_position")
                    .await,
            );
        }
        outcomes
    }

    /// Cancel every open order on `symbol`.
    pub async fn cancel_all_for_symbol(&self, symbol: &str) -> RemediationOutcome {
        let exchange = self.fetcher.exchange();
        let gateway = self.fetcher.gateway();
        let result = self
            .with_retry(FetchOp::CancelAll, || gateway.cancel_all_orders(symbol))
            .await;
        match result {
            Ok(()) => {
                info!(exchange = %exchange, symbol = symbol, "All open orders cancelled");
                RemediationOutcome::Cancelled
            }
            Err(e) if e.is_order_gone() => RemediationOutcome::AlreadyGone,
            Err(e) if e.is_precondition() => {
                warn!(exchange = %exchange, symbol = symbol, error = %e, "Cancel-all refused");
                RemediationOutcome::Skipped(e.to_string())
            }
            Err(e) => {
                error!(exchange = %exchange, symbol = symbol, error = %e, "Cancel-all failed");
                RemediationOutcome::Failed(e.to_string())
            }
        }
    }
}
