//! Exchange adapter boundary
//!
//! Everything venue-specific lives behind this trait: wire-format decoding,
//! message classification, and endpoint shapes. The engine only ever sees
//! dispatch tags and normalized feed values.

mod binance;

pub use binance::BinanceAdapter;

use crate::dispatch::{DecodedEvent, EventTag};
use crate::error::Result;
use crate::feed::Snapshot;

/// Venue-specific parsing and endpoint layout
pub trait ExchangeAdapter: Send + Sync {
    /// Short venue code used in topic derivation, e.g. `bnc`
    fn code(&self) -> &'static str;

    /// Classify a raw frame into exactly one dispatch tag plus its decoded
    /// event. A frame that cannot be decoded is a parse error; the transport
    /// logs and drops it.
    fn classify(&self, raw: &str) -> Result<(EventTag, DecodedEvent)>;

    /// WebSocket URL subscribing to depth and trade streams for `symbols`
    fn stream_url(&self, endpoint: &str, symbols: &[String]) -> String;

    /// REST URL serving a full depth snapshot for `symbol`
    fn snapshot_url(&self, endpoint: &str, symbol: &str, depth: usize) -> String;

    /// Decode a REST snapshot body into the normalized full-state value
    fn decode_snapshot(&self, symbol: &str, body: &str) -> Result<Snapshot>;
}
