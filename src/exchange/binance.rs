//! Binance depth-stream adapter
//!
//! Decodes combined-stream depth diffs, trade prints, and REST snapshots.
//! Depth diff rows with zero quantity are the venue's deletion convention and
//! become Delete incrementals; malformed rows are skipped individually so the
//! rest of the batch still applies.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use tracing::debug;

use super::ExchangeAdapter;
use crate::book::Side;
use crate::dispatch::{DecodedEvent, EventTag};
use crate::error::{FeedError, Result};
use crate::feed::{normalize_symbol, BookEntry, Incremental, IncrementalKind, Snapshot, TradeTick};

/// Depth diff message
#[derive(Debug, Clone, Deserialize)]
struct DepthUpdate {
    /// Event type
    #[serde(rename = "e")]
    event_type: String,

    /// Symbol
    #[serde(rename = "s")]
    symbol: String,

    /// Final update ID in event, the diff's sequence number
    #[serde(rename = "u")]
    final_update_id: u64,

    /// Bid rows
    #[serde(rename = "b", deserialize_with = "deserialize_rows")]
    bids: Vec<RawRow>,

    /// Ask rows
    #[serde(rename = "a", deserialize_with = "deserialize_rows")]
    asks: Vec<RawRow>,
}

/// Trade message, only the fields the engine observes
#[derive(Debug, Clone, Deserialize)]
struct TradeMessage {
    #[serde(rename = "e")]
    event_type: String,

    #[serde(rename = "s")]
    symbol: String,

    #[serde(rename = "p", deserialize_with = "deserialize_decimal")]
    price: Decimal,

    #[serde(rename = "q", deserialize_with = "deserialize_decimal")]
    quantity: Decimal,
}

/// Command acknowledgement, e.g. `{"result":null,"id":1}`
///
/// Unknown fields are rejected so arbitrary objects don't classify as acks.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct AckMessage {
    #[allow(dead_code)]
    result: Option<serde_json::Value>,
    id: Option<u64>,
}

/// One (price, quantity) wire row
#[derive(Debug, Clone)]
struct RawRow {
    price: Decimal,
    quantity: Decimal,
}

/// REST depth snapshot
#[derive(Debug, Clone, Deserialize)]
struct DepthSnapshot {
    #[serde(rename = "lastUpdateId")]
    last_update_id: u64,

    #[serde(deserialize_with = "deserialize_rows")]
    bids: Vec<RawRow>,

    #[serde(deserialize_with = "deserialize_rows")]
    asks: Vec<RawRow>,
}

/// Combined stream envelope
#[derive(Debug, Clone, Deserialize)]
struct StreamMessage {
    stream: String,
    data: serde_json::Value,
}

/// Adapter for the Binance combined depth/trade streams
#[derive(Debug, Default)]
pub struct BinanceAdapter;

impl BinanceAdapter {
    pub fn new() -> Self {
        Self
    }

    fn classify_value(&self, raw: &str) -> Result<(EventTag, DecodedEvent)> {
        // Combined streams wrap the payload in an envelope
        if let Ok(envelope) = serde_json::from_str::<StreamMessage>(raw) {
            if envelope.stream.contains("depth") {
                let depth: DepthUpdate = serde_json::from_value(envelope.data)?;
                return Ok((EventTag::Diff, diff_event(depth)));
            }
            if envelope.stream.contains("trade") {
                let trade: TradeMessage = serde_json::from_value(envelope.data)?;
                return Ok((EventTag::Trade, trade_event(trade)));
            }
            return Err(FeedError::Parse(format!(
                "unrecognized stream: {}",
                envelope.stream
            )));
        }

        if let Ok(depth) = serde_json::from_str::<DepthUpdate>(raw) {
            if depth.event_type == "depthUpdate" {
                return Ok((EventTag::Diff, diff_event(depth)));
            }
        }

        if let Ok(trade) = serde_json::from_str::<TradeMessage>(raw) {
            if trade.event_type == "trade" {
                return Ok((EventTag::Trade, trade_event(trade)));
            }
        }

        if let Ok(ack) = serde_json::from_str::<AckMessage>(raw) {
            return Ok((EventTag::Ack, DecodedEvent::Ack { id: ack.id }));
        }

        Err(FeedError::Parse(format!(
            "unclassifiable message: {}",
            raw.chars().take(120).collect::<String>()
        )))
    }
}

impl ExchangeAdapter for BinanceAdapter {
    fn code(&self) -> &'static str {
        "bnc"
    }

    fn classify(&self, raw: &str) -> Result<(EventTag, DecodedEvent)> {
        self.classify_value(raw)
    }

    fn stream_url(&self, endpoint: &str, symbols: &[String]) -> String {
        let streams: Vec<String> = symbols
            .iter()
            .flat_map(|s| {
                let s_lower = s.to_lowercase();
                vec![
                    format!("{}@depth@100ms", s_lower),
                    format!("{}@trade", s_lower),
                ]
            })
            .collect();

        format!("{}/stream?streams={}", endpoint, streams.join("/"))
    }

    fn snapshot_url(&self, endpoint: &str, symbol: &str, depth: usize) -> String {
        format!(
            "{}/depth?symbol={}&limit={}",
            endpoint,
            symbol.to_uppercase(),
            depth
        )
    }

    fn decode_snapshot(&self, symbol: &str, body: &str) -> Result<Snapshot> {
        let snapshot: DepthSnapshot = serde_json::from_str(body)?;
        let mut entries =
            Vec::with_capacity(snapshot.bids.len() + snapshot.asks.len());
        entries.extend(
            snapshot
                .bids
                .iter()
                .map(|row| BookEntry::new(Side::Buy, row.price, row.quantity)),
        );
        entries.extend(
            snapshot
                .asks
                .iter()
                .map(|row| BookEntry::new(Side::Sell, row.price, row.quantity)),
        );

        Ok(Snapshot {
            symbol: normalize_symbol(symbol),
            sequence: snapshot.last_update_id,
            entries,
        })
    }
}

/// Split a depth diff into absolute updates and deletions at one sequence
fn diff_event(depth: DepthUpdate) -> DecodedEvent {
    let symbol = normalize_symbol(&depth.symbol);
    let mut updates = Vec::new();
    let mut deletes = Vec::new();

    for (side, rows) in [(Side::Buy, &depth.bids), (Side::Sell, &depth.asks)] {
        for row in rows {
            let entry = BookEntry::new(side, row.price, row.quantity);
            if row.quantity.is_zero() {
                deletes.push(entry);
            } else {
                updates.push(entry);
            }
        }
    }

    let mut incrementals = Vec::new();
    if !updates.is_empty() {
        incrementals.push(
            Incremental::new(&symbol, depth.final_update_id, IncrementalKind::Update)
                .with_entries(updates),
        );
    }
    if !deletes.is_empty() {
        incrementals.push(
            Incremental::new(&symbol, depth.final_update_id, IncrementalKind::Delete)
                .with_entries(deletes),
        );
    }
    if incrementals.is_empty() {
        // An empty diff still advances the sequence gate
        incrementals.push(Incremental::new(
            &symbol,
            depth.final_update_id,
            IncrementalKind::Update,
        ));
    }

    DecodedEvent::Incrementals(incrementals)
}

fn trade_event(trade: TradeMessage) -> DecodedEvent {
    DecodedEvent::Trade(TradeTick {
        symbol: normalize_symbol(&trade.symbol),
        price: trade.price,
        quantity: trade.quantity,
    })
}

/// Decimal from string
fn deserialize_decimal<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    // Owned, so decoding from an envelope's Value works too
    let s: String = Deserialize::deserialize(deserializer)?;
    Decimal::from_str(&s).map_err(serde::de::Error::custom)
}

/// Rows from arrays of string pairs; a malformed row is skipped so the rest
/// of the batch still applies
fn deserialize_rows<'de, D>(deserializer: D) -> std::result::Result<Vec<RawRow>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<String>> = Deserialize::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .filter_map(|pair| {
            if pair.len() != 2 {
                debug!(row = ?pair, "Skipping malformed depth row");
                return None;
            }
            match (Decimal::from_str(&pair[0]), Decimal::from_str(&pair[1])) {
                (Ok(price), Ok(quantity)) => Some(RawRow { price, quantity }),
                _ => {
                    debug!(row = ?pair, "Skipping unparsable depth row");
                    None
                }
            }
        })
        .collect())
}
