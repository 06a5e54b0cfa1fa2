use exchanges::{BinanceClient, BinanceConfig, BybitClient, BybitConfig};
use sweeper_core::config::types::{AppConfig, ExchangeConfig};
use sweeper_core::types::Exchange;

fn report_credentials(app: &AppConfig, name: &str, errors: Vec<String>) -> bool {
    let section = app.exchanges.get(name);
    let present = |key: &str| section.and_then(|s| s.get(key)).is_some();
    println!("  - {name}");
    println!(
        "    API Key: {}",
        if present("api_key") { "[PRESENT]" } else { "[MISSING]" }
    );
    println!(
        "    API Secret: {}",
        if present("api_secret") { "[PRESENT]" } else { "[MISSING]" }
    );
    for e in &errors {
        println!("    [FAIL] {e}");
    }
    errors.is_empty()
}

async fn ping(app: &AppConfig, exchange: Exchange) -> anyhow::Result<()> {
    match exchange {
        Exchange::Binance => {
            BinanceClient::new(BinanceConfig::from_app_config(app)?)?
                .ping()
                .await?
        }
        Exchange::Bybit => {
            BybitClient::new(BybitConfig::from_app_config(app)?)?
                .ping()
                .await?
        }
    }
    Ok(())
}

pub async fn run_doctor(check_connectivity: bool) -> anyhow::Result<()> {
    println!("--- Sweeper Config Doctor ---");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("[FAIL] Configuration validation failed.");
            println!("Error: {e}");
            return Ok(());
        }
    };

    println!("[OK] Configuration loaded successfully.");
    println!("Execution Mode: {:?}", config.execution_mode);
    println!(
        "Runner: dry_run={} aggressive={}",
        config.runner.dry_run, config.runner.aggressive
    );
    let c = &config.cleanup;
    println!("Cleanup:");
    println!("  Propagation Window: {}s", c.propagation_window_secs);
    println!("  Async Recheck Delay: {}s", c.async_recheck_delay_secs);
    println!("  Stale After: {}h", c.stale_after_hours);
    println!("  Cache TTL: {} ms", c.cache_ttl_ms);
    println!("  Qty Tolerance: {}%", c.qty_tolerance_pct);
    println!(
        "  Cadence: {}s (floor {}s, ceiling {}s)",
        c.cadence.base_interval_secs, c.cadence.floor_secs, c.cadence.ceiling_secs
    );
    match &config.runner.position_book_path {
        Some(path) => println!("Position Book: {path}"),
        None => println!("Position Book: [NONE] (drift detection off)"),
    }

    let enabled = config.enabled_exchanges();
    println!("Exchanges Enabled: {}", enabled.len());
    let mut healthy = true;
    for &exchange in &enabled {
        let errors = match exchange {
            Exchange::Binance => BinanceConfig::from_app_config(&config)?.validate(config.execution_mode),
            Exchange::Bybit => BybitConfig::from_app_config(&config)?.validate(config.execution_mode),
        };
        healthy &= report_credentials(&config, &exchange.to_string(), errors);

        if check_connectivity {
            match ping(&config, exchange).await {
                Ok(()) => println!("    Connectivity: [OK]"),
                Err(e) => {
                    healthy = false;
                    println!("    Connectivity: [FAIL] {e}");
                }
            }
        }
    }

    if healthy {
        println!("\n[OK] All checks passed.");
    } else {
        println!("\n[FAIL] Some checks failed, see above.");
    }
    Ok(())
}
