//! Event dispatch router
//!
//! Per-exchange table mapping a wire message-type tag to a handler. This is
//! the single integration point between exchange parsers and the mutation
//! pipeline: handlers either perform a side effect (ack, trade logging) or
//! forward Snapshot/Incremental commands to the symbol's writer.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::feed::{Incremental, Snapshot, TradeTick};
use crate::metrics::FeedMetrics;
use crate::pipeline::{BookCommand, PipelineHandle};

/// Wire message classes an exchange feed can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    /// Full book state
    Snapshot,
    /// Incremental depth diff
    Diff,
    /// Subscription / command acknowledgement
    Ack,
    /// Trade print
    Trade,
}

impl EventTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventTag::Snapshot => "snapshot",
            EventTag::Diff => "diff",
            EventTag::Ack => "ack",
            EventTag::Trade => "trade",
        }
    }
}

/// A wire message decoded into engine values
#[derive(Debug, Clone)]
pub enum DecodedEvent {
    Snapshot(Snapshot),
    /// One wire diff can carry an update batch and a delete batch at the
    /// same sequence.
    Incrementals(Vec<Incremental>),
    Ack { id: Option<u64> },
    Trade(TradeTick),
}

/// Handler capability bound to one dispatch tag
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: DecodedEvent) -> Result<()>;
}

/// Dispatch table for one exchange connection: exactly one handler per tag
pub struct EventRouter {
    exchange: String,
    handlers: HashMap<EventTag, Box<dyn EventHandler>>,
    metrics: Arc<FeedMetrics>,
}

impl EventRouter {
    pub fn new(exchange: &str, metrics: Arc<FeedMetrics>) -> Self {
        Self {
            exchange: exchange.to_string(),
            handlers: HashMap::new(),
            metrics,
        }
    }

    /// Bind `handler` to `tag`, replacing (and warning about) any previous
    /// binding.
    pub fn register(mut self, tag: EventTag, handler: Box<dyn EventHandler>) -> Self {
        if self.handlers.insert(tag, handler).is_some() {
            warn!(exchange = %self.exchange, tag = tag.as_str(), "Replacing handler binding");
        }
        self
    }

    /// Route a decoded event to its tag's handler
    ///
    /// An unregistered tag is a recoverable no-op, never fatal.
    pub async fn dispatch(&self, tag: EventTag, event: DecodedEvent) -> Result<()> {
        self.metrics
            .messages
            .with_label_values(&[&self.exchange, tag.as_str()])
            .inc();

        match self.handlers.get(&tag) {
            Some(handler) => handler.handle(event).await,
            None => {
                self.metrics
                    .unhandled
                    .with_label_values(&[&self.exchange, tag.as_str()])
                    .inc();
                debug!(exchange = %self.exchange, tag = tag.as_str(), "No handler for tag, dropping");
                Ok(())
            }
        }
    }
}

/// Forwards snapshots and incrementals to the mutation pipeline
pub struct BookFeedHandler {
    pipeline: PipelineHandle,
}

impl BookFeedHandler {
    pub fn new(pipeline: PipelineHandle) -> Self {
        Self { pipeline }
    }

    /// Traffic for a symbol without a registered book is dropped, not fatal;
    /// a closed pipeline is.
    async fn forward(&self, symbol: &str, command: BookCommand) -> Result<()> {
        match self.pipeline.submit(symbol, command).await {
            Err(crate::error::FeedError::UnknownSymbol(symbol)) => {
                debug!(symbol = %symbol, "No book registered for symbol, dropping");
                Ok(())
            }
            other => other,
        }
    }
}

#[async_trait]
impl EventHandler for BookFeedHandler {
    async fn handle(&self, event: DecodedEvent) -> Result<()> {
        match event {
            DecodedEvent::Snapshot(snapshot) => {
                let symbol = snapshot.symbol.clone();
                self.forward(&symbol, BookCommand::Snapshot(snapshot)).await
            }
            DecodedEvent::Incrementals(incrementals) => {
                for incremental in incrementals {
                    let symbol = incremental.symbol.clone();
                    self.forward(&symbol, BookCommand::Incremental(incremental))
                        .await?;
                }
                Ok(())
            }
            other => {
                debug!(event = ?other, "Book handler received non-book event, dropping");
                Ok(())
            }
        }
    }
}

/// Acknowledgement side effect, no book interaction
pub struct AckHandler {
    exchange: String,
}

impl AckHandler {
    pub fn new(exchange: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
        }
    }
}

#[async_trait]
impl EventHandler for AckHandler {
    async fn handle(&self, event: DecodedEvent) -> Result<()> {
        if let DecodedEvent::Ack { id } = event {
            info!(exchange = %self.exchange, id = ?id, "Subscription acknowledged");
        }
        Ok(())
    }
}

/// Trade prints are observed, not applied
pub struct TradeLogHandler;

#[async_trait]
impl EventHandler for TradeLogHandler {
    async fn handle(&self, event: DecodedEvent) -> Result<()> {
        if let DecodedEvent::Trade(trade) = event {
            trace!(
                symbol = %trade.symbol,
                price = %trade.price,
                qty = %trade.quantity,
                "Trade received"
            );
        }
        Ok(())
    }
}
