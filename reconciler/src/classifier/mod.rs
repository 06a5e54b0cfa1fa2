//! Zombie classification.
//!
//! One verdict vocabulary for every venue. The rule chain below is shared so
//! the protective-order rule behaves identically everywhere; [`VenueRules`]
//! isolates what differs between venues.

pub mod rules;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use strum_macros::IntoStaticStr;
use sweeper_core::config::types::CleanupConfig;
use sweeper_core::normalize_symbol;
use sweeper_core::types::{Exchange, ExchangeOrder, ExchangePosition, OrderStatus, PositionIndex};

pub use rules::{BinanceRules, BybitRules, VenueRules, rules_for};

// ──────────────────────────────────────────────────────────────────
// Vocabulary
// ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ZombieVerdict {
    NotZombie,
    /// No position and no protective role.
    Orphaned,
    /// Listed open, but a direct lookup says otherwise.
    Phantom { observed: String },
    Stuck { age_secs: u64 },
    /// Too young to judge. Held for a second fresh read.
    AsyncPending { age_ms: u64 },
    OcoOrphan { list_id: String },
    ProtectiveForClosedPosition,
    WrongPositionIndex {
        expected: PositionIndex,
        actual: PositionIndex,
    },
    ReduceOnlyWithoutPosition,
    ConditionalWithoutPosition,
}

impl ZombieVerdict {
    /// Whether the verdict calls for remediation.
    pub fn is_zombie(&self) -> bool {
        !matches!(
            self,
            ZombieVerdict::NotZombie | ZombieVerdict::AsyncPending { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        self.into()
    }
}

/// What the executor should do about one classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationPlan {
    CancelOrder { conditional: bool },
    CancelOrderList { list_id: String },
    /// Batched per symbol and run after every per-order cancel.
    ClearPositionStops,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub order: ExchangeOrder,
    pub verdict: ZombieVerdict,
    pub reason: String,
}

impl Classification {
    pub fn new(order: &ExchangeOrder, verdict: ZombieVerdict, reason: impl Into<String>) -> Self {
        Self {
            order: order.clone(),
            verdict,
            reason: reason.into(),
        }
    }

    pub fn is_zombie(&self) -> bool {
        self.verdict.is_zombie()
    }

    pub fn symbol_key(&self) -> String {
        normalize_symbol(&self.order.symbol)
    }

    pub fn plan(&self) -> RemediationPlan {
        match &self.verdict {
            ZombieVerdict::NotZombie | ZombieVerdict::AsyncPending { .. } => RemediationPlan::None,
            ZombieVerdict::OcoOrphan { list_id } => RemediationPlan::CancelOrderList {
                list_id: list_id.clone(),
            },
            ZombieVerdict::ProtectiveForClosedPosition => RemediationPlan::ClearPositionStops,
            _ => RemediationPlan::CancelOrder {
                conditional: self.order.meta.conditional,
            },
        }
    }
}

// ──────────────────────────────────────────────────────────────────
// Snapshot indexes
// ──────────────────────────────────────────────────────────────────

/// Active positions keyed by normalized symbol.
#[derive(Debug, Clone, Default)]
pub struct PositionBook {
    by_symbol: HashMap<String, Vec<ExchangePosition>>,
}

impl PositionBook {
    pub fn from_positions(positions: &[ExchangePosition]) -> Self {
        let mut by_symbol: HashMap<String, Vec<ExchangePosition>> = HashMap::new();
        for p in positions.iter().filter(|p| p.is_active()) {
            by_symbol
                .entry(normalize_symbol(&p.symbol))
                .or_default()
                .push(p.clone());
        }
        Self { by_symbol }
    }

    pub fn has_active(&self, symbol: &str) -> bool {
        self.by_symbol.contains_key(&normalize_symbol(symbol))
    }

    pub fn on_symbol(&self, symbol: &str) -> Vec<&ExchangePosition> {
        self.by_symbol
            .get(&normalize_symbol(symbol))
            .map(|v| v.iter().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_symbol.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

/// Live orders per order-list id, built from the same snapshot as the
/// orders being classified.
#[derive(Debug, Clone, Default)]
pub struct SiblingIndex {
    live: HashMap<String, usize>,
}

impl SiblingIndex {
    pub fn from_orders(orders: &[ExchangeOrder]) -> Self {
        let mut live: HashMap<String, usize> = HashMap::new();
        for order in orders.iter().filter(|o| o.status.is_open()) {
            if let Some(list_id) = &order.meta.order_list_id {
                *live.entry(list_id.clone()).or_default() += 1;
            }
        }
        Self { live }
    }

    pub fn live_count(&self, list_id: &str) -> usize {
        self.live.get(list_id).copied().unwrap_or(0)
    }
}

/// Result of confirming a listed order by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Found(OrderStatus),
    /// The venue answered "no such order".
    Gone(String),
}

pub struct ClassifyContext<'a> {
    pub positions: &'a PositionBook,
    pub siblings: &'a SiblingIndex,
    pub lookups: &'a HashMap<String, Lookup>,
    pub now: DateTime<Utc>,
    /// Skip the propagation hold.
    pub aggressive: bool,
    /// Second read of a held order. The hold is not applied twice.
    pub recheck: bool,
}

// ──────────────────────────────────────────────────────────────────
// Classifier
// ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub stale_after: Duration,
    pub propagation_window: Duration,
    pub lookup_after: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(24 * 3600),
            propagation_window: Duration::from_secs(10),
            lookup_after: Duration::from_secs(300),
        }
    }
}

impl ClassifierConfig {
    pub fn from_cleanup(exchange: Exchange, cfg: &CleanupConfig) -> Self {
        let overrides = cfg.overrides_for(exchange);
        Self {
            stale_after: cfg.stale_after(),
            propagation_window: overrides
                .propagation_window_secs
                .map(Duration::from_secs)
                .unwrap_or_else(|| cfg.propagation_window()),
            lookup_after: cfg.lookup_after(),
        }
    }
}

pub struct Classifier {
    rules: Box<dyn VenueRules>,
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(rules: Box<dyn VenueRules>, config: ClassifierConfig) -> Self {
        Self { rules, config }
    }

    pub fn for_exchange(exchange: Exchange, config: ClassifierConfig) -> Self {
        Self::new(rules_for(exchange), config)
    }

    pub fn rules(&self) -> &dyn VenueRules {
        self.rules.as_ref()
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Whether `order` should be confirmed by id before classification.
    pub fn needs_lookup(&self, order: &ExchangeOrder, now: DateTime<Utc>) -> bool {
        order.status.is_open()
            && self
                .rules
                .needs_lookup(order, age_of(order, now), self.config.lookup_after)
    }

    /// Pure verdict for one order. First matching rule wins:
    ///
    /// 1. Terminal status                                → NotZombie
    /// 2. Protective and the symbol has a live position  → NotZombie
    /// 3. Younger than the propagation window            → AsyncPending
    /// 4. No live position on the symbol                 → ReduceOnlyWithoutPosition,
    ///    ProtectiveForClosedPosition, ConditionalWithoutPosition or Orphaned
    /// 5. No live position under the order's index       → WrongPositionIndex
    /// 6. Lookup says closed or unknown                  → Phantom
    /// 7. Older than `stale_after`                       → Stuck
    /// 8. Last live member of its order list             → OcoOrphan
    /// 9. Otherwise                                      → NotZombie
    ///
    /// Rule 3 sits ahead of rule 4 so an order placed a moment before its
    /// position shows up is never cancelled.
    pub fn classify(&self, order: &ExchangeOrder, ctx: &ClassifyContext<'_>) -> Classification {
        let symbol = normalize_symbol(&order.symbol);
        let has_position = ctx.positions.has_active(&order.symbol);
        let protective = self.rules.is_protective(order);
        let age = age_of(order, ctx.now);

        // 1.
        if order.status.is_terminal() {
            return Classification::new(
                order,
                ZombieVerdict::NotZombie,
                format!("status {} is terminal", order.status),
            );
        }

        // 2. The venue owns protective orders while the position lives.
        if protective && has_position {
            return Classification::new(
                order,
                ZombieVerdict::NotZombie,
                format!("protective order with live position on {symbol}"),
            );
        }

        // 3.
        if !ctx.aggressive && !ctx.recheck && age < self.config.propagation_window {
            return Classification::new(
                order,
                ZombieVerdict::AsyncPending {
                    age_ms: age.as_millis() as u64,
                },
                format!(
                    "{}ms old, inside {}s propagation window",
                    age.as_millis(),
                    self.config.propagation_window.as_secs()
                ),
            );
        }

        // 4.
        if !has_position {
            let (verdict, reason) = if order.meta.reduce_only {
                (
                    ZombieVerdict::ReduceOnlyWithoutPosition,
                    format!("reduce-only order with no position on {symbol}"),
                )
            } else if order.is_tp_sl() || order.kind.is_protective() {
                (
                    ZombieVerdict::ProtectiveForClosedPosition,
                    format!("{} order left behind by closed position on {symbol}", order.kind),
                )
            } else if order.meta.close_on_trigger || order.meta.conditional {
                (
                    ZombieVerdict::ConditionalWithoutPosition,
                    format!("conditional order with no position on {symbol}"),
                )
            } else {
                (
                    ZombieVerdict::Orphaned,
                    format!("no position on {symbol}"),
                )
            };
            return Classification::new(order, verdict, reason);
        }

        // 5.
        let positions = ctx.positions.on_symbol(&order.symbol);
        if let (Some(expected), Some(actual)) = (
            self.rules.expected_position_idx(order, &positions),
            order.meta.position_idx,
        ) {
            return Classification::new(
                order,
                ZombieVerdict::WrongPositionIndex { expected, actual },
                format!("order on index {actual}, position on {symbol} needs index {expected}"),
            );
        }

        // 6.
        match ctx.lookups.get(&order.order_id) {
            Some(Lookup::Found(status)) if !status.is_open() => {
                return Classification::new(
                    order,
                    ZombieVerdict::Phantom {
                        observed: status.to_string(),
                    },
                    format!("listed open but lookup reports {status}"),
                );
            }
            Some(Lookup::Gone(message)) => {
                return Classification::new(
                    order,
                    ZombieVerdict::Phantom {
                        observed: message.clone(),
                    },
                    format!("listed open but lookup failed: {message}"),
                );
            }
            _ => {}
        }

        // 7.
        if age > self.config.stale_after {
            return Classification::new(
                order,
                ZombieVerdict::Stuck {
                    age_secs: age.as_secs(),
                },
                format!("open for {}h", age.as_secs() / 3600),
            );
        }

        // 8. Two live members is a healthy pair; zero is not analyzed.
        if let Some(list_id) = &order.meta.order_list_id
            && ctx.siblings.live_count(list_id) == 1
        {
            return Classification::new(
                order,
                ZombieVerdict::OcoOrphan {
                    list_id: list_id.clone(),
                },
                format!("sole live member of order list {list_id}"),
            );
        }

        Classification::new(order, ZombieVerdict::NotZombie, "no rule matched")
    }

    pub fn classify_all(
        &self,
        orders: &[ExchangeOrder],
        ctx: &ClassifyContext<'_>,
    ) -> Vec<Classification> {
        orders.iter().map(|o| self.classify(o, ctx)).collect()
    }
}

/// Order age. A creation time ahead of the local clock counts as zero.
fn age_of(order: &ExchangeOrder, now: DateTime<Utc>) -> Duration {
    order.age(now).to_std().unwrap_or(Duration::ZERO)
}
