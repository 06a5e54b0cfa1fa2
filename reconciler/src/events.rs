use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use strum_macros::Display;
use sweeper_core::types::Exchange;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    ZombieDetected,
    ZombieCancelled,
    CleanupCompleted,
    HighZombieCount,
    TpSlCleared,
    UntrackedPosition,
    PhantomPositionClosed,
    QuantityMismatch,
}

/// Structured audit record. Sinks decide where it goes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconEvent {
    pub kind: EventKind,
    pub exchange: Exchange,
    pub symbol: Option<String>,
    pub count: usize,
    pub severity: Severity,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl ReconEvent {
    pub fn new(kind: EventKind, exchange: Exchange, severity: Severity) -> Self {
        Self {
            kind,
            exchange,
            symbol: None,
            count: 1,
            severity,
            message: String::new(),
            at: Utc::now(),
        }
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

#[derive(Debug, Error)]
pub enum EventSinkError {
    #[error("no subscribers")]
    NoSubscribers,
    #[error("sink failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: ReconEvent) -> Result<(), EventSinkError>;
}

/// Emit and swallow failures. An audit hiccup must never abort a cycle.
pub async fn emit_logged(sink: &dyn EventSink, event: ReconEvent) {
    let kind = event.kind;
    let exchange = event.exchange;
    if let Err(e) = sink.emit(event).await {
        tracing::warn!(
            exchange = %exchange,
            event = %kind,
            error = %e,
            "Event sink failed, continuing"
        );
    }
}

/// Writes events to the log at a level matching their severity.
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: ReconEvent) -> Result<(), EventSinkError> {
        let symbol = event.symbol.as_deref().unwrap_or("-");
        match event.severity {
            Severity::Info => tracing::info!(
                target: "audit",
                kind = %event.kind,
                exchange = %event.exchange,
                symbol = symbol,
                count = event.count,
                "{}",
                event.message
            ),
            Severity::Warning => tracing::warn!(
                target: "audit",
                kind = %event.kind,
                exchange = %event.exchange,
                symbol = symbol,
                count = event.count,
                "{}",
                event.message
            ),
            Severity::Critical => tracing::error!(
                target: "audit",
                kind = %event.kind,
                exchange = %event.exchange,
                symbol = symbol,
                count = event.count,
                severity = "CRITICAL",
                "{}",
                event.message
            ),
        }
        Ok(())
    }
}

/// Fans events out to in-process subscribers (alerting, a UI, tests).
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<ReconEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReconEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventSink for BroadcastEventSink {
    async fn emit(&self, event: ReconEvent) -> Result<(), EventSinkError> {
        self.tx
            .send(event)
            .map(|_| ())
            .map_err(|_| EventSinkError::NoSubscribers)
    }
}

/// Sends every event to each inner sink; one failing sink does not stop the rest.
#[derive(Clone, Default)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

#[async_trait]
impl EventSink for FanoutEventSink {
    async fn emit(&self, event: ReconEvent) -> Result<(), EventSinkError> {
        let mut failures = Vec::new();
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event.clone()).await {
                failures.push(e.to_string());
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(EventSinkError::Other(failures.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_without_subscribers_reports_error() {
        let sink = BroadcastEventSink::new(4);
        let event = ReconEvent::new(EventKind::CleanupCompleted, Exchange::Bybit, Severity::Info);
        assert!(matches!(
            sink.emit(event).await,
            Err(EventSinkError::NoSubscribers)
        ));
    }

    #[tokio::test]
    async fn fanout_reaches_remaining_sinks_after_failure() {
        let failing = Arc::new(BroadcastEventSink::new(4));
        let listening = Arc::new(BroadcastEventSink::new(4));
        let mut rx = listening.subscribe();

        let fanout = FanoutEventSink::new()
            .with(failing)
            .with(listening.clone());

        let event = ReconEvent::new(EventKind::TpSlCleared, Exchange::Bybit, Severity::Info)
            .symbol("BTCUSDT")
            .count(2);
        assert!(fanout.emit(event.clone()).await.is_err());
        assert_eq!(rx.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn emit_logged_swallows_failures() {
        let sink = BroadcastEventSink::new(1);
        let event =
            ReconEvent::new(EventKind::HighZombieCount, Exchange::Binance, Severity::Critical);
        emit_logged(&sink, event).await;
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(Severity::Critical > Severity::Warning);
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
        assert_eq!(EventKind::HighZombieCount.to_string(), "high_zombie_count");
    }
}
