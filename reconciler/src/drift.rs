//! Position drift between the venue and the local book.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use sweeper_core::normalize_symbol;
use sweeper_core::types::{ExchangePosition, LocalPosition, PositionSide};

#[derive(Debug, Clone)]
pub struct DriftConfig {
    /// Relative quantity disagreement tolerated before a mismatch is
    /// reported, in percent of the local quantity.
    pub qty_tolerance_pct: Decimal,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            qty_tolerance_pct: Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PositionDrift {
    /// Tracked locally, absent on the venue. The local record gets closed.
    Phantom { local: LocalPosition },
    /// Open on the venue, unknown locally. Left for manual review.
    Untracked { exchange: ExchangePosition },
    /// Net quantities disagree. Every leg on the symbol is carried, both
    /// local and venue.
    QuantityMismatch {
        symbol: String,
        local: Vec<LocalPosition>,
        exchange: Vec<ExchangePosition>,
        local_net: Decimal,
        venue_net: Decimal,
        diff_pct: Decimal,
    },
}

impl PositionDrift {
    pub fn symbol(&self) -> &str {
        match self {
            PositionDrift::Phantom { local } => &local.symbol,
            PositionDrift::Untracked { exchange } => &exchange.symbol,
            PositionDrift::QuantityMismatch { symbol, .. } => symbol,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftSummary {
    pub phantom: usize,
    pub untracked: usize,
    pub quantity_mismatch: usize,
    /// Phantom records actually closed in the local book.
    pub closed: usize,
}

impl DriftSummary {
    pub fn from_findings(findings: &[PositionDrift]) -> Self {
        let mut summary = Self::default();
        for f in findings {
            match f {
                PositionDrift::Phantom { .. } => summary.phantom += 1,
                PositionDrift::Untracked { .. } => summary.untracked += 1,
                PositionDrift::QuantityMismatch { .. } => summary.quantity_mismatch += 1,
            }
        }
        summary
    }
}

fn signed_local(p: &LocalPosition) -> Decimal {
    match p.side {
        PositionSide::Long => p.quantity.abs(),
        PositionSide::Short => -p.quantity.abs(),
    }
}

fn signed_exchange(p: &ExchangePosition) -> Decimal {
    match p.side {
        PositionSide::Long => p.size.abs(),
        PositionSide::Short => -p.size.abs(),
    }
}

/// Symmetric difference over normalized symbols, plus quantity checks on
/// the intersection. Exchange rows with size zero are ignored. Several legs
/// on one symbol (hedge mode) are compared by net quantity on both sides.
pub fn detect_drift(
    local: &[LocalPosition],
    exchange: &[ExchangePosition],
    config: &DriftConfig,
) -> Vec<PositionDrift> {
    let mut local_by_symbol: BTreeMap<String, Vec<&LocalPosition>> = BTreeMap::new();
    for p in local {
        local_by_symbol
            .entry(normalize_symbol(&p.symbol))
            .or_default()
            .push(p);
    }

    let mut venue_by_symbol: BTreeMap<String, Vec<ExchangePosition>> = BTreeMap::new();
    for p in exchange.iter().filter(|p| p.is_active()) {
        venue_by_symbol
            .entry(normalize_symbol(&p.symbol))
            .or_default()
            .push(p.clone());
    }

    let mut findings = Vec::new();

    for (symbol, legs) in &local_by_symbol {
        let Some(venue) = venue_by_symbol.get(symbol) else {
            findings.extend(legs.iter().map(|l| PositionDrift::Phantom {
                local: (*l).clone(),
            }));
            continue;
        };

        let local_net: Decimal = legs.iter().map(|l| signed_local(l)).sum();
        let venue_net: Decimal = venue.iter().map(signed_exchange).sum();
        let diff = (venue_net - local_net).abs();
        if diff.is_zero() {
            continue;
        }
        let diff_pct = if local_net.is_zero() {
            Decimal::ONE_HUNDRED
        } else {
            (diff / local_net.abs() * Decimal::ONE_HUNDRED).round_dp(4)
        };
        if diff_pct > config.qty_tolerance_pct {
            findings.push(PositionDrift::QuantityMismatch {
                symbol: legs[0].symbol.clone(),
                local: legs.iter().map(|l| (*l).clone()).collect(),
                exchange: venue.clone(),
                local_net,
                venue_net,
                diff_pct,
            });
        }
    }

    for (symbol, venue) in venue_by_symbol {
        if !local_by_symbol.contains_key(&symbol) {
            findings.extend(
                venue
                    .into_iter()
                    .map(|exchange| PositionDrift::Untracked { exchange }),
            );
        }
    }

    findings
}
