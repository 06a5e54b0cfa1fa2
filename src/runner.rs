//! Exchange runner: one cleanup loop per configured venue, sharing an event
//! fan-out and stopping together on Ctrl-C.

use std::sync::Arc;

use exchanges::{BinanceClient, BinanceConfig, BybitClient, BybitConfig, MockExchange};
use reconciler::{
    BroadcastEventSink, CleanupOrchestrator, CleanupReport, CycleOptions, EventSink,
    FanoutEventSink, JsonFilePositionBook, Severity, TracingEventSink,
};
use sweeper_core::config::types::{AppConfig, ExchangeConfig};
use sweeper_core::traits::ExchangeGateway;
use sweeper_core::types::{Exchange, ExecutionMode};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("no exchanges enabled")]
    NoExchanges,

    #[error("{exchange} config invalid: {reason}")]
    ExchangeConfig { exchange: Exchange, reason: String },

    #[error("{exchange} client build failed: {reason}")]
    ClientBuild { exchange: Exchange, reason: String },

    #[error("task join error: {0}")]
    TaskJoin(String),
}

fn checked<C: ExchangeConfig>(
    app: &AppConfig,
    exchange: Exchange,
) -> Result<C, RunnerError> {
    let cfg = C::from_app_config(app).map_err(|e| RunnerError::ExchangeConfig {
        exchange,
        reason: e.to_string(),
    })?;
    let errors = cfg.validate(app.execution_mode);
    if !errors.is_empty() {
        return Err(RunnerError::ExchangeConfig {
            exchange,
            reason: errors.join(", "),
        });
    }
    Ok(cfg)
}

fn paper_or_live<G: ExchangeGateway + 'static>(
    client: G,
    mode: ExecutionMode,
) -> Arc<dyn ExchangeGateway> {
    match mode {
        ExecutionMode::Paper => Arc::new(MockExchange::new(client)),
        ExecutionMode::Live => Arc::new(client),
    }
}

/// Venue client for `exchange`, wrapped for paper mode when configured so.
pub fn build_gateway(
    app: &AppConfig,
    exchange: Exchange,
) -> Result<Arc<dyn ExchangeGateway>, RunnerError> {
    let build_err = |e: anyhow::Error| RunnerError::ClientBuild {
        exchange,
        reason: e.to_string(),
    };
    let gateway = match exchange {
        Exchange::Binance => {
            let cfg: BinanceConfig = checked(app, exchange)?;
            paper_or_live(BinanceClient::new(cfg).map_err(build_err)?, app.execution_mode)
        }
        Exchange::Bybit => {
            let cfg: BybitConfig = checked(app, exchange)?;
            paper_or_live(BybitClient::new(cfg).map_err(build_err)?, app.execution_mode)
        }
    };
    Ok(gateway)
}

/// CLI flags only ever widen what the config asks for.
pub fn cycle_options(app: &AppConfig, dry_run: bool, aggressive: bool) -> CycleOptions {
    CycleOptions {
        dry_run: dry_run || app.runner.dry_run,
        aggressive: aggressive || app.runner.aggressive,
    }
}

pub struct ExchangeRunner {
    orchestrators: Vec<Arc<CleanupOrchestrator>>,
    options: CycleOptions,
    broadcast: Arc<BroadcastEventSink>,
}

impl ExchangeRunner {
    pub fn from_app_config(
        app: &AppConfig,
        exchanges: &[Exchange],
        options: CycleOptions,
    ) -> Result<Self, RunnerError> {
        if exchanges.is_empty() {
            return Err(RunnerError::NoExchanges);
        }

        let broadcast = Arc::new(BroadcastEventSink::new(app.runner.event_capacity));
        let sink: Arc<dyn EventSink> = Arc::new(
            FanoutEventSink::new()
                .with(Arc::new(TracingEventSink))
                .with(broadcast.clone()),
        );
        let book = app
            .runner
            .position_book_path
            .as_ref()
            .map(|path| Arc::new(JsonFilePositionBook::new(path)));

        let mut orchestrators = Vec::with_capacity(exchanges.len());
        for &exchange in exchanges {
            let gateway = build_gateway(app, exchange)?;
            let mut orch = CleanupOrchestrator::from_cleanup(gateway, &app.cleanup, sink.clone());
            if let Some(book) = &book {
                orch = orch.with_local_book(book.clone());
            }
            info!(exchange = %exchange, mode = ?app.execution_mode, "Cleanup orchestrator ready");
            orchestrators.push(Arc::new(orch));
        }

        Ok(Self {
            orchestrators,
            options,
            broadcast,
        })
    }

    /// One cycle per venue, concurrently.
    pub async fn run_once(&self) -> Result<Vec<CleanupReport>, RunnerError> {
        let _events = self.broadcast.subscribe();
        let mut tasks = JoinSet::new();
        for (i, orch) in self.orchestrators.iter().enumerate() {
            let orch = Arc::clone(orch);
            let options = self.options;
            tasks.spawn(async move { (i, orch.run_cleanup_cycle(options).await) });
        }

        let mut reports = Vec::with_capacity(self.orchestrators.len());
        while let Some(res) = tasks.join_next().await {
            reports.push(res.map_err(|e| RunnerError::TaskJoin(e.to_string()))?);
        }
        reports.sort_by_key(|(i, _)| *i);
        Ok(reports.into_iter().map(|(_, r)| r).collect())
    }

    /// Loop every venue on its adaptive cadence until Ctrl-C.
    pub async fn run(self) -> Result<(), RunnerError> {
        let token = CancellationToken::new();
        let mut tasks = JoinSet::new();

        tasks.spawn(watch_events(self.broadcast.subscribe(), token.clone()));
        for orch in &self.orchestrators {
            tasks.spawn(cleanup_loop(Arc::clone(orch), self.options, token.clone()));
        }

        info!(
            venues = self.orchestrators.len(),
            dry_run = self.options.dry_run,
            aggressive = self.options.aggressive,
            "ExchangeRunner running, press Ctrl-C to stop"
        );

        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Ctrl-C handler failed, shutting down");
        } else {
            info!("Ctrl-C received, shutting down ExchangeRunner");
        }
        token.cancel();

        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                error!(error = %e, "Runner task panicked");
                return Err(RunnerError::TaskJoin(e.to_string()));
            }
        }
        Ok(())
    }
}

async fn cleanup_loop(
    orch: Arc<CleanupOrchestrator>,
    options: CycleOptions,
    token: CancellationToken,
) {
    let exchange = orch.exchange();
    loop {
        let report = orch.run_cleanup_cycle(options).await;
        let wait = orch.next_interval();
        info!(
            exchange = %exchange,
            found = report.found,
            resolved = report.resolved(),
            failed = report.failed,
            still_zombie = report.still_zombie.len(),
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            next_in_secs = wait.as_secs(),
            "Cleanup cycle finished"
        );

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    let metrics = orch.get_metrics();
    info!(exchange = %exchange, metrics = ?metrics, "Cleanup loop stopped");
}

/// Keeps the broadcast channel subscribed and tallies what went past it.
async fn watch_events(mut rx: broadcast::Receiver<reconciler::ReconEvent>, token: CancellationToken) {
    let (mut warnings, mut criticals) = (0u64, 0u64);
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            msg = rx.recv() => match msg {
                Ok(event) => match event.severity {
                    Severity::Critical => criticals += 1,
                    Severity::Warning => warnings += 1,
                    Severity::Info => {}
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "Event watcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
    info!(warnings, criticals, "Event watcher stopped");
}
