use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use sweeper_core::types::Exchange;

use crate::classifier::Classification;
use crate::drift::DriftSummary;
use crate::remediation::RemediationOutcome;

/// One zombie as seen by this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZombieRecord {
    pub order_id: String,
    pub symbol: String,
    pub classification: &'static str,
    pub reason: String,
    /// `None` in dry-run.
    pub outcome: Option<String>,
}

impl ZombieRecord {
    pub fn from_classification(c: &Classification) -> Self {
        Self {
            order_id: c.order.order_id.clone(),
            symbol: c.order.symbol.clone(),
            classification: c.verdict.label(),
            reason: c.reason.clone(),
            outcome: None,
        }
    }
}

/// Outcome of one cleanup cycle. Always returned, even when the cycle fails
/// part way; failures land in `errors`.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub exchange: Exchange,
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    pub aggressive: bool,
    pub found: usize,
    pub cancelled: usize,
    pub already_gone: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Orders held for propagation on the first read.
    pub async_pending: usize,
    /// Held orders that were gone or healthy on the second read.
    pub async_resolved: usize,
    pub breakdown: BTreeMap<String, usize>,
    pub zombies: Vec<ZombieRecord>,
    pub still_zombie: Vec<ZombieRecord>,
    pub drift: DriftSummary,
    pub errors: Vec<String>,
    pub next_interval_secs: u64,
    pub duration_ms: u64,
}

impl CleanupReport {
    pub fn new(exchange: Exchange, dry_run: bool, aggressive: bool) -> Self {
        Self {
            exchange,
            started_at: Utc::now(),
            dry_run,
            aggressive,
            found: 0,
            cancelled: 0,
            already_gone: 0,
            skipped: 0,
            failed: 0,
            async_pending: 0,
            async_resolved: 0,
            breakdown: BTreeMap::new(),
            zombies: Vec::new(),
            still_zombie: Vec::new(),
            drift: DriftSummary::default(),
            errors: Vec::new(),
            next_interval_secs: 0,
            duration_ms: 0,
        }
    }

    pub fn record_found(&mut self, zombies: &[Classification]) {
        self.found = zombies.len();
        for z in zombies {
            *self
                .breakdown
                .entry(z.verdict.label().to_string())
                .or_default() += 1;
            self.zombies.push(ZombieRecord::from_classification(z));
        }
    }

    pub fn record_outcome(&mut self, order_id: &str, outcome: &RemediationOutcome) {
        let text = match outcome {
            RemediationOutcome::Cancelled => {
                self.cancelled += 1;
                "cancelled".to_string()
            }
            RemediationOutcome::AlreadyGone => {
                self.already_gone += 1;
                "already_gone".to_string()
            }
            RemediationOutcome::Skipped(reason) => {
                self.skipped += 1;
                format!("skipped: {reason}")
            }
            RemediationOutcome::Failed(reason) => {
                self.failed += 1;
                self.errors.push(format!("{order_id}: {reason}"));
                format!("failed: {reason}")
            }
        };
        if let Some(record) = self.zombies.iter_mut().find(|z| z.order_id == order_id) {
            record.outcome = Some(text);
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Zombies this cycle resolved, cancelled or already gone.
    pub fn resolved(&self) -> usize {
        self.cancelled + self.already_gone
    }
}
