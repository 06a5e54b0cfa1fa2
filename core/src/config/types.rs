use super::errors::ConfigError;
use crate::types::{Exchange, ExecutionMode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ── Adaptive cadence ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceCfg {
    #[serde(default = "default_60")]
    pub base_interval_secs: u64,
    #[serde(default = "default_15")]
    pub floor_secs: u64,
    #[serde(default = "default_300")]
    pub ceiling_secs: u64,
    /// Zombie count above which the interval shrinks and a critical alert fires.
    #[serde(default = "default_10_usize")]
    pub high_water_mark: usize,
    /// Consecutive zero-zombie cycles before the interval grows again.
    #[serde(default = "default_3")]
    pub quiet_cycles_to_relax: u32,
}

impl Default for CadenceCfg {
    fn default() -> Self {
        Self {
            base_interval_secs: 60,
            floor_secs: 15,
            ceiling_secs: 300,
            high_water_mark: 10,
            quiet_cycles_to_relax: 3,
        }
    }
}

// ── Remediation retries ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryCfg {
    #[serde(default = "default_3")]
    pub max_attempts: u32,
    #[serde(default = "default_200")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_2000")]
    pub max_backoff_ms: u64,
}

impl Default for RetryCfg {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 200,
            max_backoff_ms: 2000,
        }
    }
}

// ── Per-venue overrides ──────────────────────────────────────────────────────

/// Venue-specific timing. Unset fields fall back to the `[cleanup]` values or
/// the venue profile defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupOverrides {
    pub propagation_window_secs: Option<u64>,
    pub async_recheck_delay_secs: Option<u64>,
    pub empty_read_attempts: Option<u32>,
    pub cache_ttl_ms: Option<u64>,
}

// ── Cleanup engine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_3000")]
    pub cache_ttl_ms: u64,
    #[serde(default = "default_10")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_5")]
    pub rate_limit_cooldown_secs: u64,
    #[serde(default = "default_3")]
    pub max_rate_limit_retries: u32,
    #[serde(default = "default_250")]
    pub empty_read_backoff_ms: u64,
    /// Orders younger than this may not have propagated yet.
    #[serde(default = "default_10")]
    pub propagation_window_secs: u64,
    /// Wait before the second fresh read of async-pending orders.
    #[serde(default = "default_10")]
    pub async_recheck_delay_secs: u64,
    #[serde(default = "default_24")]
    pub stale_after_hours: u64,
    #[serde(default = "default_3_u64")]
    pub verify_delay_secs: u64,
    /// Listed orders older than this are confirmed by id before classification.
    #[serde(default = "default_300")]
    pub lookup_after_secs: u64,
    #[serde(default = "default_20_usize")]
    pub max_lookups_per_cycle: usize,
    #[serde(default = "default_qty_tolerance")]
    pub qty_tolerance_pct: Decimal,
    #[serde(default)]
    pub cadence: CadenceCfg,
    #[serde(default)]
    pub retry: RetryCfg,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub overrides: HashMap<String, CleanupOverrides>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 3000,
            call_timeout_secs: 10,
            rate_limit_cooldown_secs: 5,
            max_rate_limit_retries: 3,
            empty_read_backoff_ms: 250,
            propagation_window_secs: 10,
            async_recheck_delay_secs: 10,
            stale_after_hours: 24,
            verify_delay_secs: 3,
            lookup_after_secs: 300,
            max_lookups_per_cycle: 20,
            qty_tolerance_pct: default_qty_tolerance(),
            cadence: CadenceCfg::default(),
            retry: RetryCfg::default(),
            overrides: HashMap::new(),
        }
    }
}

impl CleanupConfig {
    pub fn overrides_for(&self, exchange: Exchange) -> CleanupOverrides {
        self.overrides
            .get(&exchange.to_string())
            .cloned()
            .unwrap_or_default()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn propagation_window(&self) -> Duration {
        Duration::from_secs(self.propagation_window_secs)
    }

    pub fn async_recheck_delay(&self) -> Duration {
        Duration::from_secs(self.async_recheck_delay_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_hours * 3600)
    }

    pub fn verify_delay(&self) -> Duration {
        Duration::from_secs(self.verify_delay_secs)
    }

    pub fn lookup_after(&self) -> Duration {
        Duration::from_secs(self.lookup_after_secs)
    }
}

// ── Runner ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Exchange names to reconcile. Each must have an `[exchanges.<name>]` section.
    #[serde(default)]
    pub exchanges: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub aggressive: bool,
    #[serde(default = "default_256_usize")]
    pub event_capacity: usize,
    /// JSON file holding the locally tracked positions. Drift detection is
    /// off when unset.
    #[serde(default)]
    pub position_book_path: Option<String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            exchanges: vec![],
            dry_run: false,
            aggressive: false,
            event_capacity: 256,
            position_book_path: None,
        }
    }
}

pub trait ExchangeConfig: serde::de::DeserializeOwned + Default {
    const EXCHANGE_NAME: &'static str;

    fn from_app_config(app_config: &AppConfig) -> Result<Self, ConfigError> {
        match app_config.exchanges.get(Self::EXCHANGE_NAME) {
            Some(val) => val
                .clone()
                .try_into()
                .map_err(|e: toml::de::Error| ConfigError::ExchangeSection {
                    exchange: Self::EXCHANGE_NAME.to_string(),
                    reason: e.message().to_string(),
                }),
            None => Ok(Self::default()),
        }
    }

    /// Exchange-specific credential checks, reported rather than panicking.
    fn validate(&self, execution_mode: ExecutionMode) -> Vec<String> {
        let _ = execution_mode;
        Vec::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub exchanges: HashMap<String, toml::Value>,
}

impl AppConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let c = &self.cleanup;

        if c.call_timeout_secs == 0 {
            errors.push("cleanup.call_timeout_secs must be > 0".to_string());
        }
        if c.stale_after_hours == 0 {
            errors.push("cleanup.stale_after_hours must be > 0".to_string());
        }
        if c.qty_tolerance_pct < Decimal::ZERO {
            errors.push("cleanup.qty_tolerance_pct must be >= 0".to_string());
        }
        if c.retry.max_attempts == 0 {
            errors.push("cleanup.retry.max_attempts must be > 0".to_string());
        }
        if c.cadence.floor_secs == 0 {
            errors.push("cleanup.cadence.floor_secs must be > 0".to_string());
        }
        if c.cadence.floor_secs > c.cadence.base_interval_secs
            || c.cadence.base_interval_secs > c.cadence.ceiling_secs
        {
            errors.push(
                "cleanup.cadence must satisfy floor_secs <= base_interval_secs <= ceiling_secs"
                    .to_string(),
            );
        }
        for name in c.overrides.keys() {
            if name.parse::<Exchange>().is_err() {
                errors.push(format!("cleanup.overrides.{} is not a known exchange", name));
            }
        }
        // The async re-check must outlive the cache, or its empty-read
        // fallback could serve the list taken before the hold.
        if c.async_recheck_delay_secs * 1000 <= c.cache_ttl_ms {
            errors.push(
                "cleanup.async_recheck_delay_secs must be longer than cleanup.cache_ttl_ms"
                    .to_string(),
            );
        }
        let mut names: Vec<&String> = c.overrides.keys().collect();
        names.sort();
        for name in names {
            let o = &c.overrides[name];
            if o.async_recheck_delay_secs.is_none() && o.cache_ttl_ms.is_none() {
                continue;
            }
            let recheck_ms = o.async_recheck_delay_secs.unwrap_or(c.async_recheck_delay_secs) * 1000;
            let ttl_ms = o.cache_ttl_ms.unwrap_or(c.cache_ttl_ms);
            if recheck_ms <= ttl_ms {
                errors.push(format!(
                    "cleanup.overrides.{name}: async recheck delay ({recheck_ms}ms) must be longer than cache ttl ({ttl_ms}ms)"
                ));
            }
        }

        if self.execution_mode == ExecutionMode::Live && self.runner.exchanges.is_empty() {
            errors.push("No exchanges configured for Live mode".to_string());
        }

        for name in &self.runner.exchanges {
            if name.parse::<Exchange>().is_err() {
                errors.push(format!("runner.exchanges lists unknown exchange '{}'", name));
            } else if !self.exchanges.contains_key(name) {
                errors.push(format!(
                    "runner.exchanges lists '{}' but no [exchanges.{}] config found",
                    name, name
                ));
            }
        }

        errors
    }

    /// Parsed `runner.exchanges`, skipping names `validate` already reported.
    pub fn enabled_exchanges(&self) -> Vec<Exchange> {
        self.runner
            .exchanges
            .iter()
            .filter_map(|name| name.parse::<Exchange>().ok())
            .collect()
    }
}

fn default_3() -> u32 {
    3
}
fn default_3_u64() -> u64 {
    3
}
fn default_3000() -> u64 {
    3000
}
fn default_5() -> u64 {
    5
}
fn default_10() -> u64 {
    10
}
fn default_10_usize() -> usize {
    10
}
fn default_15() -> u64 {
    15
}
fn default_20_usize() -> usize {
    20
}
fn default_24() -> u64 {
    24
}
fn default_60() -> u64 {
    60
}
fn default_200() -> u64 {
    200
}
fn default_250() -> u64 {
    250
}
fn default_256_usize() -> usize {
    256
}
fn default_300() -> u64 {
    300
}
fn default_2000() -> u64 {
    2000
}
fn default_qty_tolerance() -> Decimal {
    Decimal::ONE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_exchange(name: &str) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.runner.exchanges = vec![name.to_string()];
        cfg.exchanges
            .insert(name.to_string(), toml::Value::Table(Default::default()));
        cfg
    }

    #[test]
    fn defaults_are_valid() {
        assert!(AppConfig::default().validate().is_empty());
    }

    #[test]
    fn live_without_exchanges_is_rejected() {
        let cfg = AppConfig {
            execution_mode: ExecutionMode::Live,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), vec!["No exchanges configured for Live mode"]);
    }

    #[test]
    fn runner_exchange_needs_section() {
        let mut cfg = with_exchange("bybit");
        cfg.exchanges.clear();
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("[exchanges.bybit]"));
    }

    #[test]
    fn unknown_exchange_name_is_reported() {
        let cfg = with_exchange("kraken");
        assert!(cfg.validate()[0].contains("unknown exchange 'kraken'"));
        assert!(cfg.enabled_exchanges().is_empty());
    }

    #[test]
    fn inverted_cadence_bounds_are_reported() {
        let mut cfg = AppConfig::default();
        cfg.cleanup.cadence.floor_secs = 120;
        assert_eq!(cfg.validate().len(), 1);
    }

    #[test]
    fn recheck_delay_must_outlive_cache_ttl() {
        let mut cfg = AppConfig::default();
        cfg.cleanup.async_recheck_delay_secs = 2;
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("async_recheck_delay_secs"));

        let mut cfg = AppConfig::default();
        cfg.cleanup.overrides.insert(
            "bybit".to_string(),
            CleanupOverrides {
                cache_ttl_ms: Some(15_000),
                ..Default::default()
            },
        );
        let errors = cfg.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("cleanup.overrides.bybit"));
    }

    #[test]
    fn overrides_resolve_by_exchange_name() {
        let mut cfg = CleanupConfig::default();
        cfg.overrides.insert(
            "bybit".to_string(),
            CleanupOverrides {
                empty_read_attempts: Some(5),
                ..Default::default()
            },
        );
        assert_eq!(cfg.overrides_for(Exchange::Bybit).empty_read_attempts, Some(5));
        assert_eq!(cfg.overrides_for(Exchange::Binance).empty_read_attempts, None);
    }

    #[derive(Debug, Default, Deserialize)]
    struct VenueCfg {
        #[serde(default)]
        timeout_secs: u64,
    }

    impl ExchangeConfig for VenueCfg {
        const EXCHANGE_NAME: &'static str = "bybit";
    }

    #[test]
    fn venue_section_parses_or_reports_the_exchange() {
        let mut cfg = with_exchange("bybit");
        assert_eq!(VenueCfg::from_app_config(&cfg).unwrap().timeout_secs, 0);

        let mut table = toml::Table::new();
        table.insert("timeout_secs".into(), toml::Value::String("ten".into()));
        cfg.exchanges
            .insert("bybit".to_string(), toml::Value::Table(table));
        let err = VenueCfg::from_app_config(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::ExchangeSection { ref exchange, .. } if exchange == "bybit"));
    }

    #[test]
    fn durations_derive_from_fields() {
        let cfg = CleanupConfig::default();
        assert_eq!(cfg.stale_after(), Duration::from_secs(24 * 3600));
        assert_eq!(cfg.cache_ttl(), Duration::from_millis(3000));
    }
}
