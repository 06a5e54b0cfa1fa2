//! Per-exchange cleanup cycle: fetch, classify, remediate, verify.

pub mod cadence;
pub mod report;

use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;
use sweeper_core::config::types::CleanupConfig;
use sweeper_core::normalize_symbol;
use sweeper_core::traits::{ExchangeGateway, GatewayError};
use sweeper_core::types::{Exchange, ExchangeOrder, ExchangePosition};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::book::LocalPositionBook;
use crate::classifier::{
    Classification, Classifier, ClassifierConfig, ClassifyContext, Lookup, PositionBook,
    RemediationPlan, SiblingIndex, ZombieVerdict,
};
use crate::drift::{DriftConfig, DriftSummary, PositionDrift, detect_drift};
use crate::events::{EventKind, EventSink, ReconEvent, Severity, emit_logged};
use crate::fetcher::{FetcherConfig, StateFetcher};
use crate::metrics::{CleanupMetrics, Counter, MetricsSnapshot};
use crate::remediation::{RemediationExecutor, RemediationOutcome, RetryConfig};
pub use cadence::{AdaptiveCadence, CadenceChange};
pub use report::{CleanupReport, ZombieRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CyclePhase {
    Idle = 0,
    Fetching = 1,
    Classifying = 2,
    Remediating = 3,
    Verifying = 4,
}

impl CyclePhase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => CyclePhase::Fetching,
            2 => CyclePhase::Classifying,
            3 => CyclePhase::Remediating,
            4 => CyclePhase::Verifying,
            _ => CyclePhase::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOptions {
    /// Classify and report only.
    pub dry_run: bool,
    /// Skip the propagation hold and use cancel-all on positionless symbols.
    pub aggressive: bool,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub classifier: ClassifierConfig,
    pub drift: DriftConfig,
    pub retry: RetryConfig,
    pub cadence: AdaptiveCadence,
    pub async_recheck_delay: Duration,
    pub verify_delay: Duration,
    pub max_lookups_per_cycle: usize,
}

impl OrchestratorConfig {
    pub fn from_cleanup(exchange: Exchange, cfg: &CleanupConfig) -> Self {
        let overrides = cfg.overrides_for(exchange);
        Self {
            classifier: ClassifierConfig::from_cleanup(exchange, cfg),
            drift: DriftConfig {
                qty_tolerance_pct: cfg.qty_tolerance_pct,
            },
            retry: RetryConfig::from(&cfg.retry),
            cadence: AdaptiveCadence::from(&cfg.cadence),
            async_recheck_delay: overrides
                .async_recheck_delay_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| cfg.async_recheck_delay()),
            verify_delay: cfg.verify_delay(),
            max_lookups_per_cycle: cfg.max_lookups_per_cycle,
        }
    }
}

/// Clears the running flag however the cycle ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct CleanupOrchestrator {
    exchange: Exchange,
    fetcher: Arc<StateFetcher>,
    classifier: Classifier,
    executor: RemediationExecutor,
    book: Option<Arc<dyn LocalPositionBook>>,
    events: Arc<dyn EventSink>,
    metrics: Arc<CleanupMetrics>,
    async_recheck_delay: Duration,
    verify_delay: Duration,
    max_lookups_per_cycle: usize,
    drift: DriftConfig,
    cadence: Mutex<AdaptiveCadence>,
    running: AtomicBool,
    phase: AtomicU8,
}

impl CleanupOrchestrator {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        config: OrchestratorConfig,
        fetcher_config: FetcherConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let exchange = gateway.exchange();
        let metrics = Arc::new(CleanupMetrics::new(exchange));
        let fetcher = Arc::new(StateFetcher::new(gateway, fetcher_config, metrics.clone()));
        let executor = RemediationExecutor::new(fetcher.clone(), config.retry.clone());
        Self {
            exchange,
            fetcher,
            classifier: Classifier::for_exchange(exchange, config.classifier),
            executor,
            book: None,
            events,
            metrics,
            async_recheck_delay: config.async_recheck_delay,
            verify_delay: config.verify_delay,
            max_lookups_per_cycle: config.max_lookups_per_cycle,
            drift: config.drift,
            cadence: Mutex::new(config.cadence),
            running: AtomicBool::new(false),
            phase: AtomicU8::new(CyclePhase::Idle as u8),
        }
    }

    pub fn from_cleanup(
        gateway: Arc<dyn ExchangeGateway>,
        cfg: &CleanupConfig,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let exchange = gateway.exchange();
        Self::new(
            gateway,
            OrchestratorConfig::from_cleanup(exchange, cfg),
            FetcherConfig::from_cleanup(exchange, cfg),
            events,
        )
    }

    /// Compare venue positions against this book each cycle.
    pub fn with_local_book(mut self, book: Arc<dyn LocalPositionBook>) -> Self {
        self.book = Some(book);
        self
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    pub fn fetcher(&self) -> &StateFetcher {
        &self.fetcher
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn next_interval(&self) -> Duration {
        self.cadence
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .current()
    }

    pub fn phase(&self) -> CyclePhase {
        CyclePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn set_phase(&self, phase: CyclePhase) {
        self.phase.store(phase as u8, Ordering::Release);
        debug!(exchange = %self.exchange, phase = ?phase, "Cleanup phase");
    }

    async fn emit(&self, event: ReconEvent) {
        emit_logged(self.events.as_ref(), event).await;
    }

    /// Run one full cycle. Never fails: problems are reported in
    /// `CleanupReport::errors`. A call while a cycle is already running
    /// returns immediately with an error entry.
    pub async fn run_cleanup_cycle(&self, options: CycleOptions) -> CleanupReport {
        let mut report = CleanupReport::new(self.exchange, options.dry_run, options.aggressive);

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(exchange = %self.exchange, "Cleanup cycle already running, skipping");
            report.error("cycle already running");
            report.next_interval_secs = self.next_interval().as_secs();
            return report;
        }
        let _guard = RunningGuard(&self.running);
        let started = Instant::now();

        info!(
            exchange = %self.exchange,
            dry_run = options.dry_run,
            aggressive = options.aggressive,
            "Cleanup cycle starting"
        );

        let aborted = match self.run_phases(options, &mut report).await {
            Ok(()) => false,
            Err(e) => {
                error!(exchange = %self.exchange, error = %e, "Cleanup cycle aborted");
                report.error(format!("fetch failed: {e}"));
                true
            }
        };
        self.set_phase(CyclePhase::Idle);

        // Cadence. An aborted cycle saw nothing, so it neither relaxes nor
        // tightens the interval.
        let (change, next_interval, high_water_mark) = {
            let mut cadence = self.cadence.lock().unwrap_or_else(|e| e.into_inner());
            let change = if aborted {
                CadenceChange::Unchanged
            } else {
                cadence.observe(report.found)
            };
            (change, cadence.current(), cadence.high_water_mark())
        };
        report.next_interval_secs = next_interval.as_secs();

        match change {
            CadenceChange::Tightened => {
                error!(
                    exchange = %self.exchange,
                    found = report.found,
                    high_water_mark = high_water_mark,
                    next_interval_secs = next_interval.as_secs(),
                    "Zombie count above high-water mark, tightening cadence"
                );
                self.emit(
                    ReconEvent::new(EventKind::HighZombieCount, self.exchange, Severity::Critical)
                        .count(report.found)
                        .message(format!(
                            "{} zombies found (high-water mark {}), next cycle in {}s",
                            report.found,
                            high_water_mark,
                            next_interval.as_secs()
                        )),
                )
                .await;
            }
            CadenceChange::Relaxed => {
                info!(
                    exchange = %self.exchange,
                    next_interval_secs = next_interval.as_secs(),
                    "Venue quiet, relaxing cadence"
                );
            }
            CadenceChange::Unchanged => {}
        }

        let elapsed = started.elapsed();
        report.duration_ms = elapsed.as_millis() as u64;
        self.metrics.incr(Counter::Cycles);
        self.metrics.record_cycle_duration(elapsed);

        let severity = if report.errors.is_empty() {
            Severity::Info
        } else {
            Severity::Warning
        };
        self.emit(
            ReconEvent::new(EventKind::CleanupCompleted, self.exchange, severity)
                .count(report.found)
                .message(format!(
                    "found {} cancelled {} already_gone {} skipped {} failed {} still_zombie {}",
                    report.found,
                    report.cancelled,
                    report.already_gone,
                    report.skipped,
                    report.failed,
                    report.still_zombie.len()
                )),
        )
        .await;

        info!(
            exchange = %self.exchange,
            found = report.found,
            cancelled = report.cancelled,
            already_gone = report.already_gone,
            skipped = report.skipped,
            failed = report.failed,
            still_zombie = report.still_zombie.len(),
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "Cleanup cycle complete"
        );
        report
    }

    async fn run_phases(
        &self,
        options: CycleOptions,
        report: &mut CleanupReport,
    ) -> Result<(), GatewayError> {
        // 1. Snapshot
        self.set_phase(CyclePhase::Fetching);
        let positions = self.fetcher.fetch_positions().await?;
        let orders = self.fetcher.fetch_open_orders(None).await?;
        debug!(
            exchange = %self.exchange,
            orders = orders.len(),
            positions = positions.len(),
            "Snapshot fetched"
        );

        // 2. Drift
        self.reconcile_positions(&positions, options, report).await;

        // 3. Lookups and first classification
        self.set_phase(CyclePhase::Classifying);
        let mut book = PositionBook::from_positions(&positions);
        let lookups = self.lookup_orders(&orders, &book).await;
        let siblings = SiblingIndex::from_orders(&orders);
        let ctx = ClassifyContext {
            positions: &book,
            siblings: &siblings,
            lookups: &lookups,
            now: chrono::Utc::now(),
            aggressive: options.aggressive,
            recheck: false,
        };
        let mut classifications = self.classifier.classify_all(&orders, &ctx);
        let mut snapshot = orders;

        // 4. Second read for orders too young to judge
        let pending: HashSet<String> = classifications
            .iter()
            .filter(|c| matches!(c.verdict, ZombieVerdict::AsyncPending { .. }))
            .map(|c| c.order.order_id.clone())
            .collect();
        report.async_pending = pending.len();

        if !pending.is_empty() && !options.aggressive {
            info!(
                exchange = %self.exchange,
                pending = pending.len(),
                delay_secs = self.async_recheck_delay.as_secs(),
                "Orders inside propagation window, re-checking after delay"
            );
            tokio::time::sleep(self.async_recheck_delay).await;

            let positions = self.fetcher.fetch_positions().await?;
            let orders = self.fetcher.fetch_open_orders_fresh(None).await?;
            book = PositionBook::from_positions(&positions);
            let siblings = SiblingIndex::from_orders(&orders);
            let now = chrono::Utc::now();

            // The first snapshot is older than the cache TTL by now, so every
            // order is judged again on the fresh one. Orders that first
            // appear here stay held until the next cycle.
            classifications = orders
                .iter()
                .map(|order| {
                    let ctx = ClassifyContext {
                        positions: &book,
                        siblings: &siblings,
                        lookups: &lookups,
                        now,
                        aggressive: false,
                        recheck: pending.contains(&order.order_id),
                    };
                    self.classifier.classify(order, &ctx)
                })
                .collect();

            report.async_resolved = pending
                .iter()
                .filter(|id| {
                    !classifications
                        .iter()
                        .any(|c| &c.order.order_id == *id && c.is_zombie())
                })
                .count();
            debug!(
                exchange = %self.exchange,
                resolved = report.async_resolved,
                "Propagation re-check done"
            );
            snapshot = orders;
        }

        let zombies: Vec<Classification> =
            classifications.into_iter().filter(|c| c.is_zombie()).collect();
        report.record_found(&zombies);
        self.metrics.add(Counter::ZombiesFound, zombies.len() as u64);

        for z in &zombies {
            warn!(
                exchange = %self.exchange,
                order_id = %z.order.order_id,
                symbol = %z.order.symbol,
                classification = z.verdict.label(),
                reason = %z.reason,
                "Zombie detected"
            );
            self.emit(
                ReconEvent::new(EventKind::ZombieDetected, self.exchange, Severity::Warning)
                    .symbol(z.order.symbol.clone())
                    .message(format!("{} {}: {}", z.verdict.label(), z.order.order_id, z.reason)),
            )
            .await;
        }

        // 5.
        if options.dry_run || zombies.is_empty() {
            return Ok(());
        }

        // 6. Remediation
        self.set_phase(CyclePhase::Remediating);
        let outcomes = self.remediate(&zombies, &snapshot, &book, options).await;
        for (order_id, outcome) in &outcomes {
            report.record_outcome(order_id, outcome);
        }
        self.metrics.add(Counter::ZombiesCancelled, report.cancelled as u64);
        self.metrics.add(Counter::CancelFailures, report.failed as u64);

        // 7. Verify
        self.set_phase(CyclePhase::Verifying);
        self.verify(&zombies, report).await;
        Ok(())
    }

    /// Diff venue positions against the local book. Phantom records are
    /// closed outside dry-run; everything else is reported only.
    async fn reconcile_positions(
        &self,
        positions: &[ExchangePosition],
        options: CycleOptions,
        report: &mut CleanupReport,
    ) {
        let Some(book) = &self.book else {
            return;
        };
        let local = match book.positions(self.exchange).await {
            Ok(local) => local,
            Err(e) => {
                warn!(exchange = %self.exchange, error = %e, "Local position book unavailable");
                report.error(format!("local book: {e}"));
                return;
            }
        };

        let findings = detect_drift(&local, positions, &self.drift);
        report.drift = DriftSummary::from_findings(&findings);
        // One close per symbol covers all of its legs
        let mut closed_symbols: HashMap<String, bool> = HashMap::new();

        for finding in &findings {
            match finding {
                PositionDrift::Phantom { local } => {
                    self.metrics.incr(Counter::PhantomPositions);
                    warn!(
                        exchange = %self.exchange,
                        symbol = %local.symbol,
                        quantity = %local.quantity,
                        "Local position not on venue"
                    );
                    if options.dry_run {
                        continue;
                    }
                    let key = normalize_symbol(&local.symbol);
                    if let Some(&closed) = closed_symbols.get(&key) {
                        if closed {
                            report.drift.closed += 1;
                        }
                        continue;
                    }
                    let result = book
                        .mark_closed(self.exchange, &local.symbol, Decimal::ZERO)
                        .await;
                    closed_symbols.insert(key, result.is_ok());
                    match result {
                        Ok(()) => {
                            report.drift.closed += 1;
                            self.emit(
                                ReconEvent::new(
                                    EventKind::PhantomPositionClosed,
                                    self.exchange,
                                    Severity::Warning,
                                )
                                .symbol(local.symbol.clone())
                                .message("local position closed, venue reports none"),
                            )
                            .await;
                        }
                        Err(e) => {
                            error!(
                                exchange = %self.exchange,
                                symbol = %local.symbol,
                                error = %e,
                                "Failed to close phantom local position"
                            );
                            report.error(format!("close {}: {e}", local.symbol));
                        }
                    }
                }
                PositionDrift::Untracked { exchange } => {
                    self.metrics.incr(Counter::UntrackedPositions);
                    warn!(
                        exchange = %self.exchange,
                        symbol = %exchange.symbol,
                        size = %exchange.size,
                        side = %exchange.side,
                        "Venue position not tracked locally, needs manual review"
                    );
                    self.emit(
                        ReconEvent::new(
                            EventKind::UntrackedPosition,
                            self.exchange,
                            Severity::Warning,
                        )
                        .symbol(exchange.symbol.clone())
                        .message(format!(
                            "{} {} open on venue, not tracked locally",
                            exchange.side, exchange.size
                        )),
                    )
                    .await;
                }
                PositionDrift::QuantityMismatch {
                    symbol,
                    local_net,
                    venue_net,
                    diff_pct,
                    ..
                } => {
                    self.metrics.incr(Counter::QuantityMismatches);
                    warn!(
                        exchange = %self.exchange,
                        symbol = %symbol,
                        local_net = %local_net,
                        venue_net = %venue_net,
                        diff_pct = %diff_pct,
                        "Position quantity disagrees with venue"
                    );
                    self.emit(
                        ReconEvent::new(
                            EventKind::QuantityMismatch,
                            self.exchange,
                            Severity::Warning,
                        )
                        .symbol(symbol.clone())
                        .message(format!("quantity differs by {diff_pct}%")),
                    )
                    .await;
                }
            }
        }
    }

    /// Confirm listed orders by id where the venue rules ask for it. Only
    /// orders that could reach the lookup rule are checked: non-protective
    /// orders on symbols with a live position.
    async fn lookup_orders(
        &self,
        orders: &[ExchangeOrder],
        book: &PositionBook,
    ) -> HashMap<String, Lookup> {
        let now = chrono::Utc::now();
        let mut lookups = HashMap::new();
        let candidates = orders
            .iter()
            .filter(|o| book.has_active(&o.symbol))
            .filter(|o| !self.classifier.rules().is_protective(o))
            .filter(|o| self.classifier.needs_lookup(o, now))
            .take(self.max_lookups_per_cycle);

        for order in candidates {
            match self.fetcher.fetch_order(&order.order_id, &order.symbol).await {
                Ok(found) => {
                    lookups.insert(order.order_id.clone(), Lookup::Found(found.status));
                }
                Err(e) if e.is_order_gone() => {
                    lookups.insert(order.order_id.clone(), Lookup::Gone(e.to_string()));
                }
                Err(e) => {
                    debug!(
                        exchange = %self.exchange,
                        order_id = %order.order_id,
                        error = %e,
                        "Order lookup failed, not used for classification"
                    );
                }
            }
        }
        lookups
    }

    /// OCO orphans first, then single cancels, then per-symbol stop clearing.
    async fn remediate(
        &self,
        zombies: &[Classification],
        snapshot: &[ExchangeOrder],
        book: &PositionBook,
        options: CycleOptions,
    ) -> Vec<(String, RemediationOutcome)> {
        let mut outcomes: Vec<(String, RemediationOutcome)> = Vec::with_capacity(zombies.len());
        let mut stops: BTreeMap<String, Vec<&Classification>> = BTreeMap::new();
        let mut singles: Vec<&Classification> = Vec::new();

        for z in zombies {
            match z.plan() {
                RemediationPlan::CancelOrderList { .. } => {
                    let outcome = self.executor.remediate(z).await;
                    outcomes.push((z.order.order_id.clone(), outcome));
                }
                RemediationPlan::ClearPositionStops => {
                    stops.entry(z.symbol_key()).or_default().push(z);
                }
                RemediationPlan::CancelOrder { .. } => singles.push(z),
                RemediationPlan::None => {}
            }
        }

        // Aggressive: sweep positionless symbols in one call each.
        let mut swept: HashSet<String> = HashSet::new();
        if options.aggressive {
            let symbols: BTreeMap<String, String> = singles
                .iter()
                .filter(|z| !book.has_active(&z.order.symbol))
                .map(|z| (z.symbol_key(), z.order.symbol.clone()))
                .collect();
            for (key, raw) in symbols {
                if self.executor.cancel_all_for_symbol(&raw).await.is_resolved() {
                    swept.insert(key);
                }
            }
        }

        let mut failed_symbols: BTreeMap<String, String> = BTreeMap::new();
        for z in singles {
            let key = z.symbol_key();
            let outcome = if swept.contains(&key) {
                RemediationOutcome::Cancelled
            } else {
                self.executor.remediate(z).await
            };
            if matches!(outcome, RemediationOutcome::Failed(_)) && !book.has_active(&z.order.symbol)
            {
                failed_symbols.insert(key, z.order.symbol.clone());
            }
            outcomes.push((z.order.order_id.clone(), outcome));
        }

        // Cancel-all fallback where every live order on a positionless
        // symbol is a zombie and a single cancel failed.
        for (key, raw) in failed_symbols {
            let zombie_ids: HashSet<&str> = zombies
                .iter()
                .filter(|z| z.symbol_key() == key)
                .map(|z| z.order.order_id.as_str())
                .collect();
            let all_zombie = snapshot
                .iter()
                .filter(|o| o.status.is_open() && normalize_symbol(&o.symbol) == key)
                .all(|o| zombie_ids.contains(o.order_id.as_str()));
            if !all_zombie {
                debug!(
                    exchange = %self.exchange,
                    symbol = %raw,
                    "Symbol has healthy orders, no cancel-all fallback"
                );
                continue;
            }
            warn!(
                exchange = %self.exchange,
                symbol = %raw,
                "Single cancels failed, falling back to cancel-all"
            );
            if self.executor.cancel_all_for_symbol(&raw).await.is_resolved() {
                for (order_id, outcome) in outcomes.iter_mut() {
                    if zombie_ids.contains(order_id.as_str())
                        && matches!(outcome, RemediationOutcome::Failed(_))
                    {
                        *outcome = RemediationOutcome::Cancelled;
                    }
                }
            }
        }

        // Position-level clears last, once no per-order cancel is in flight.
        for (_, group) in stops {
            let Some(first) = group.first() else {
                continue;
            };
            let symbol = first.order.symbol.clone();
            let orders: Vec<&ExchangeOrder> = group.iter().map(|z| &z.order).collect();
            let results = self.executor.clear_symbol_stops(&symbol, &orders).await;
            let cleared = results.iter().filter(|o| o.is_resolved()).count();
            for (z, outcome) in group.iter().zip(results) {
                outcomes.push((z.order.order_id.clone(), outcome));
            }
            if cleared > 0 {
                self.emit(
                    ReconEvent::new(EventKind::TpSlCleared, self.exchange, Severity::Info)
                        .symbol(symbol)
                        .count(cleared)
                        .message("stop levels cleared for closed position"),
                )
                .await;
            }
        }

        for (order_id, outcome) in &outcomes {
            if outcome.is_resolved() {
                self.emit(
                    ReconEvent::new(EventKind::ZombieCancelled, self.exchange, Severity::Info)
                        .symbol(
                            zombies
                                .iter()
                                .find(|z| &z.order.order_id == order_id)
                                .map(|z| z.order.symbol.clone())
                                .unwrap_or_default(),
                        )
                        .message(format!("{order_id} resolved")),
                )
                .await;
            }
        }
        outcomes
    }

    /// Fresh read after remediation. Zombies from this cycle that are still
    /// listed and still classify as zombies are reported.
    async fn verify(&self, zombies: &[Classification], report: &mut CleanupReport) {
        self.fetcher.invalidate();
        tokio::time::sleep(self.verify_delay).await;

        let positions = match self.fetcher.fetch_positions().await {
            Ok(p) => p,
            Err(e) => {
                warn!(exchange = %self.exchange, error = %e, "Verify read failed");
                report.error(format!("verify failed: {e}"));
                return;
            }
        };
        let orders = match self.fetcher.fetch_open_orders_fresh(None).await {
            Ok(o) => o,
            Err(e) => {
                warn!(exchange = %self.exchange, error = %e, "Verify read failed");
                report.error(format!("verify failed: {e}"));
                return;
            }
        };

        let targeted: HashSet<&str> = zombies.iter().map(|z| z.order.order_id.as_str()).collect();
        let book = PositionBook::from_positions(&positions);
        let siblings = SiblingIndex::from_orders(&orders);
        let lookups = HashMap::new();
        let ctx = ClassifyContext {
            positions: &book,
            siblings: &siblings,
            lookups: &lookups,
            now: chrono::Utc::now(),
            aggressive: false,
            recheck: true,
        };

        for order in orders
            .iter()
            .filter(|o| targeted.contains(o.order_id.as_str()))
        {
            let c = self.classifier.classify(order, &ctx);
            if c.is_zombie() {
                warn!(
                    exchange = %self.exchange,
                    order_id = %order.order_id,
                    symbol = %order.symbol,
                    classification = c.verdict.label(),
                    "Still zombie after cleanup"
                );
                report.still_zombie.push(ZombieRecord::from_classification(&c));
            }
        }
    }
}
