//! Sampled ladder persistence
//!
//! Best-effort telemetry for the time-series boundary: on a fixed interval,
//! each symbol's latest published view is written out; a symbol with no
//! mutation in the sampling window gets absent ladder fields. This is not a
//! durability guarantee.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{FeedError, Result};
use crate::pipeline::TopOfBookWatch;

/// One sampled point for one symbol
///
/// Ladders are JSON arrays of `[price, quantity]` string pairs, or absent
/// when nothing landed in the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LadderSample {
    pub topic: String,
    pub timestamp: DateTime<Utc>,
    pub sequence: Option<u64>,
    pub bids: Option<String>,
    pub asks: Option<String>,
}

/// Persistence boundary consumed by the sampler
#[async_trait]
pub trait SampleSink: Send + Sync {
    async fn write(&self, sample: &LadderSample) -> Result<()>;
}

/// Appends samples as JSON lines to a file
pub struct JsonlSink {
    path: String,
    file: Mutex<Option<tokio::fs::File>>,
}

impl JsonlSink {
    pub fn new(path: &str) -> Self {
        Self {
            path: path.to_string(),
            file: Mutex::new(None),
        }
    }
}

#[async_trait]
impl SampleSink for JsonlSink {
    async fn write(&self, sample: &LadderSample) -> Result<()> {
        let mut line = serde_json::to_vec(sample)
            .map_err(|e| FeedError::Persistence(format!("Failed to encode sample: {}", e)))?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await
                .map_err(|e| {
                    FeedError::Persistence(format!("Failed to open {}: {}", self.path, e))
                })?;
            *guard = Some(file);
        }

        if let Some(file) = guard.as_mut() {
            if let Err(e) = file.write_all(&line).await {
                *guard = None; // Reopen on the next write
                return Err(FeedError::Persistence(format!(
                    "Failed to append to {}: {}",
                    self.path, e
                )));
            }
        }

        Ok(())
    }
}

/// Periodic sampler over the pipeline's watch channels
pub struct Sampler {
    interval: Duration,
    feeds: Vec<(String, TopOfBookWatch)>,
    sink: Arc<dyn SampleSink>,
}

impl Sampler {
    /// `feeds` pairs each symbol's topic with its pipeline watch channel
    pub fn new(
        interval: Duration,
        feeds: Vec<(String, TopOfBookWatch)>,
        sink: Arc<dyn SampleSink>,
    ) -> Self {
        Self {
            interval,
            feeds,
            sink,
        }
    }

    /// Sample every feed once
    pub async fn sample_once(&mut self) {
        for (topic, watch_rx) in &mut self.feeds {
            let sample = match watch_rx.has_changed() {
                Ok(true) => {
                    let record = watch_rx.borrow_and_update().clone();
                    match record {
                        Some(record) => LadderSample {
                            topic: topic.clone(),
                            timestamp: Utc::now(),
                            sequence: Some(record.sequence),
                            bids: serde_json::to_string(&record.bids).ok(),
                            asks: serde_json::to_string(&record.asks).ok(),
                        },
                        None => empty_sample(topic),
                    }
                }
                // Unchanged window, or the writer is gone: fields absent
                _ => empty_sample(topic),
            };

            if let Err(e) = self.sink.write(&sample).await {
                warn!(error = %e, topic = %sample.topic, "Failed to persist ladder sample");
            }
        }
    }

    /// Run forever on the configured interval
    pub async fn run(mut self) {
        debug!(interval_secs = self.interval.as_secs(), "Starting ladder sampler");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sample_once().await;
        }
    }
}

fn empty_sample(topic: &str) -> LadderSample {
    LadderSample {
        topic: topic.to_string(),
        timestamp: Utc::now(),
        sequence: None,
        bids: None,
        asks: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::TopOfBook;
    use tokio::sync::watch;

    struct CapturingSink {
        samples: Mutex<Vec<LadderSample>>,
    }

    impl CapturingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                samples: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl SampleSink for CapturingSink {
        async fn write(&self, sample: &LadderSample) -> Result<()> {
            self.samples.lock().await.push(sample.clone());
            Ok(())
        }
    }

    fn record(sequence: u64) -> TopOfBook {
        TopOfBook {
            symbol: "btcusd".to_string(),
            topic: "btcusd.tst".to_string(),
            sequence,
            bids: vec![["100".to_string(), "2".to_string()]],
            asks: vec![["101".to_string(), "3".to_string()]],
        }
    }

    #[tokio::test]
    async fn test_sample_present_after_update_absent_after_quiet_window() {
        let (tx, rx) = watch::channel(None);
        let sink = CapturingSink::new();
        let mut sampler = Sampler::new(
            Duration::from_secs(1),
            vec![("btcusd.tst".to_string(), rx)],
            sink.clone(),
        );

        tx.send_replace(Some(record(5)));
        sampler.sample_once().await;
        // no further mutation in this window
        sampler.sample_once().await;

        let samples = sink.samples.lock().await;
        assert_eq!(samples.len(), 2);

        assert_eq!(samples[0].sequence, Some(5));
        assert_eq!(samples[0].bids.as_deref(), Some(r#"[["100","2"]]"#));
        assert_eq!(samples[0].asks.as_deref(), Some(r#"[["101","3"]]"#));

        assert_eq!(samples[1].sequence, None);
        assert!(samples[1].bids.is_none());
        assert!(samples[1].asks.is_none());
    }

    #[tokio::test]
    async fn test_only_latest_view_in_window_is_sampled() {
        let (tx, rx) = watch::channel(None);
        let sink = CapturingSink::new();
        let mut sampler = Sampler::new(
            Duration::from_secs(1),
            vec![("btcusd.tst".to_string(), rx)],
            sink.clone(),
        );

        tx.send_replace(Some(record(5)));
        tx.send_replace(Some(record(9)));
        sampler.sample_once().await;

        let samples = sink.samples.lock().await;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].sequence, Some(9));
    }

    #[tokio::test]
    async fn test_jsonl_sink_appends_lines() {
        let path = std::env::temp_dir().join("depthcast_sampler_test.jsonl");
        let _ = tokio::fs::remove_file(&path).await;
        let sink = JsonlSink::new(path.to_str().unwrap());

        sink.write(&empty_sample("btcusd.tst")).await.unwrap();
        sink.write(&empty_sample("ethusd.tst")).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: LadderSample = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.topic, "btcusd.tst");
        assert!(first.bids.is_none());

        let _ = tokio::fs::remove_file(&path).await;
    }
}
