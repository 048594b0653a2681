//! Serialized mutation pipeline
//!
//! One writer task per symbol owns that symbol's order book exclusively.
//! Network readers submit commands over bounded per-symbol queues: commands
//! for one symbol execute strictly in submission order, different symbols run
//! concurrently, and a full queue suspends the producer instead of dropping.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::book::{OrderBook, TopOfBook};
use crate::error::{FeedError, Result};
use crate::feed::{Incremental, IncrementalKind, Snapshot};
use crate::metrics::{FeedMetrics, OUTCOME_APPLIED, OUTCOME_IGNORED, OUTCOME_STALE};
use crate::publisher::RelaySink;

/// A unit of work for a symbol's writer
#[derive(Debug, Clone)]
pub enum BookCommand {
    Snapshot(Snapshot),
    Incremental(Incremental),
    Clear,
}

/// Latest published view per symbol, for read paths outside the writer
pub type TopOfBookWatch = watch::Receiver<Option<TopOfBook>>;

struct Writer {
    tx: mpsc::Sender<BookCommand>,
    watch_rx: TopOfBookWatch,
    task: JoinHandle<()>,
}

/// Owns the per-symbol writer tasks
pub struct MutationPipeline {
    writers: HashMap<String, Writer>,
    publisher: Arc<dyn RelaySink>,
    metrics: Arc<FeedMetrics>,
    depth: usize,
    queue_capacity: usize,
}

impl MutationPipeline {
    pub fn new(
        publisher: Arc<dyn RelaySink>,
        metrics: Arc<FeedMetrics>,
        depth: usize,
        queue_capacity: usize,
    ) -> Self {
        Self {
            writers: HashMap::new(),
            publisher,
            metrics,
            depth,
            queue_capacity,
        }
    }

    /// Bind a book to its own writer task
    ///
    /// The book moves into the task; nothing else can reach it afterwards.
    pub fn register(&mut self, book: OrderBook) {
        let symbol = book.symbol().to_string();
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let (watch_tx, watch_rx) = watch::channel(None);

        let task = tokio::spawn(run_writer(
            book,
            rx,
            watch_tx,
            self.publisher.clone(),
            self.metrics.clone(),
            self.depth,
        ));

        info!(symbol = %symbol, "Registered order book writer");
        self.writers.insert(
            symbol,
            Writer {
                tx,
                watch_rx,
                task,
            },
        );
    }

    /// Clonable submission handle for network readers
    pub fn handle(&self) -> PipelineHandle {
        PipelineHandle {
            senders: Arc::new(
                self.writers
                    .iter()
                    .map(|(symbol, writer)| (symbol.clone(), writer.tx.clone()))
                    .collect(),
            ),
        }
    }

    /// Watch channels carrying the latest published view per symbol
    pub fn watches(&self) -> Vec<(String, TopOfBookWatch)> {
        self.writers
            .iter()
            .map(|(symbol, writer)| (symbol.clone(), writer.watch_rx.clone()))
            .collect()
    }

    /// Close the queues and wait for every writer to drain
    ///
    /// Commands already enqueued still execute; call after the producers have
    /// stopped submitting (handles dropped), otherwise their clones keep the
    /// queues open.
    pub async fn shutdown(self) {
        for (symbol, writer) in self.writers {
            drop(writer.tx);
            if writer.task.await.is_err() {
                debug!(symbol = %symbol, "Writer task aborted before drain");
            }
        }
    }
}

/// Submission side of the pipeline, cheap to clone across reader tasks
#[derive(Clone)]
pub struct PipelineHandle {
    senders: Arc<HashMap<String, mpsc::Sender<BookCommand>>>,
}

impl PipelineHandle {
    /// Enqueue a command for the symbol's writer
    ///
    /// Suspends when the queue is full (backpressure) rather than dropping.
    pub async fn submit(&self, symbol: &str, command: BookCommand) -> Result<()> {
        let tx = self
            .senders
            .get(symbol)
            .ok_or_else(|| FeedError::UnknownSymbol(symbol.to_string()))?;
        tx.send(command)
            .await
            .map_err(|_| FeedError::PipelineClosed(symbol.to_string()))
    }

    pub fn symbols(&self) -> Vec<String> {
        self.senders.keys().cloned().collect()
    }
}

async fn run_writer(
    mut book: OrderBook,
    mut rx: mpsc::Receiver<BookCommand>,
    watch_tx: watch::Sender<Option<TopOfBook>>,
    publisher: Arc<dyn RelaySink>,
    metrics: Arc<FeedMetrics>,
    depth: usize,
) {
    while let Some(command) = rx.recv().await {
        let applied = match command {
            BookCommand::Snapshot(snapshot) => {
                book.apply_snapshot(&snapshot);
                metrics
                    .mutations
                    .with_label_values(&[book.symbol(), OUTCOME_APPLIED])
                    .inc();
                true
            }
            BookCommand::Incremental(incremental) => {
                let applied = book.apply_incremental(&incremental);
                let outcome = if applied {
                    OUTCOME_APPLIED
                } else if incremental.kind == IncrementalKind::Unknown {
                    OUTCOME_IGNORED
                } else {
                    OUTCOME_STALE
                };
                metrics
                    .mutations
                    .with_label_values(&[book.symbol(), outcome])
                    .inc();
                applied
            }
            BookCommand::Clear => {
                book.clear();
                false
            }
        };

        if applied {
            metrics
                .last_sequence
                .with_label_values(&[book.symbol()])
                .set(book.last_sequence() as i64);

            // Read on the writer task, so the view is always consistent with
            // a specific last_sequence.
            let record = book.top_of_book_record(depth);
            publisher.publish(&record).await;
            watch_tx.send_replace(Some(record));
        }
    }

    debug!(symbol = %book.symbol(), "Writer queue closed, draining done");
}
