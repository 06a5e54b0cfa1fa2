//! Zombie order and position reconciliation engine.
//!
//! One [`orchestrator::CleanupOrchestrator`] per venue drives a
//! fetch → classify → remediate → verify cycle over an
//! [`sweeper_core::traits::ExchangeGateway`].

pub mod book;
pub mod classifier;
pub mod drift;
pub mod events;
pub mod fetcher;
pub mod metrics;
pub mod orchestrator;
pub mod remediation;

#[cfg(test)]
pub(crate) mod stubs;
#[cfg(test)]
mod tests;

pub use book::{BookError, InMemoryPositionBook, JsonFilePositionBook, LocalPositionBook};
pub use classifier::{Classification, Classifier, ClassifierConfig, ZombieVerdict};
pub use drift::{DriftConfig, PositionDrift, detect_drift};
pub use events::{
    BroadcastEventSink, EventKind, EventSink, FanoutEventSink, ReconEvent, Severity,
    TracingEventSink,
};
pub use fetcher::{FetcherConfig, StateFetcher};
pub use metrics::{CleanupMetrics, MetricsSnapshot};
pub use orchestrator::{CleanupOrchestrator, CleanupReport, CycleOptions, CyclePhase};
pub use remediation::{RemediationExecutor, RemediationOutcome, RetryConfig};
