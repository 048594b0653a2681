//! Feed accounting metrics
//!
//! Prometheus counters exposed through the `/metrics` endpoint in `main`.

use prometheus::{IntCounterVec, IntGaugeVec, Opts};

/// Mutation outcome label values
pub const OUTCOME_APPLIED: &str = "applied";
pub const OUTCOME_STALE: &str = "stale";
pub const OUTCOME_IGNORED: &str = "ignored";

/// Counters and gauges tracking feed throughput and book health
#[derive(Clone)]
pub struct FeedMetrics {
    /// Wire messages dispatched, by exchange and tag
    pub messages: IntCounterVec,
    /// Messages whose tag had no registered handler
    pub unhandled: IntCounterVec,
    /// Book mutations by symbol and outcome (applied / stale / ignored)
    pub mutations: IntCounterVec,
    /// Last applied sequence per symbol
    pub last_sequence: IntGaugeVec,
}

impl FeedMetrics {
    /// Build the metric families and register them with the default registry
    pub fn new() -> prometheus::Result<Self> {
        let metrics = Self::build()?;
        prometheus::register(Box::new(metrics.messages.clone()))?;
        prometheus::register(Box::new(metrics.unhandled.clone()))?;
        prometheus::register(Box::new(metrics.mutations.clone()))?;
        prometheus::register(Box::new(metrics.last_sequence.clone()))?;
        Ok(metrics)
    }

    /// Build without registering; used by tests to avoid registry collisions
    pub fn build() -> prometheus::Result<Self> {
        Ok(Self {
            messages: IntCounterVec::new(
                Opts::new("depthcast_messages_total", "Wire messages dispatched"),
                &["exchange", "tag"],
            )?,
            unhandled: IntCounterVec::new(
                Opts::new("depthcast_unhandled_total", "Messages with no registered handler"),
                &["exchange", "tag"],
            )?,
            mutations: IntCounterVec::new(
                Opts::new("depthcast_mutations_total", "Book mutations by outcome"),
                &["symbol", "outcome"],
            )?,
            last_sequence: IntGaugeVec::new(
                Opts::new("depthcast_last_sequence", "Last applied sequence per symbol"),
                &["symbol"],
            )?,
        })
    }
}
