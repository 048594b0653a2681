//! depthcast - exchange-agnostic order book cache
//!
//! Ingests depth snapshots and sequenced incremental diffs from exchange
//! WebSocket feeds, reconstructs per-symbol limit order books behind a
//! single-writer pipeline, and relays top-of-book views downstream.

pub mod book;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod exchange;
pub mod feed;
pub mod metrics;
pub mod persist;
pub mod pipeline;
pub mod publisher;
pub mod websocket;

pub use book::{OrderBook, PriceLevel, Side, SideLadder, TopOfBook};
pub use config::Config;
pub use dispatch::{DecodedEvent, EventRouter, EventTag};
pub use error::{FeedError, Result};
pub use feed::{BookEntry, Incremental, IncrementalKind, Snapshot};
pub use pipeline::{BookCommand, MutationPipeline, PipelineHandle};
pub use publisher::{RelaySink, SocketPublisher};
pub use websocket::FeedConnection;
