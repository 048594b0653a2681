//! Feed value objects
//!
//! The normalized forms every exchange parser must produce: a full-state
//! `Snapshot` or a sequenced `Incremental` batch of book entries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::book::Side;

/// One row of a snapshot or incremental batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookEntry {
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
}

impl BookEntry {
    pub fn new(side: Side, price: Decimal, quantity: Decimal) -> Self {
        Self {
            side,
            price,
            quantity,
        }
    }
}

/// Full book state at a given sequence number
///
/// Applying a snapshot replaces everything the book previously held.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub symbol: String,
    pub sequence: u64,
    pub entries: Vec<BookEntry>,
}

/// Kind of incremental mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IncrementalKind {
    /// Absolute (price, quantity) replacement per entry
    Update,
    /// Removal of the level at each entry's price; quantity is ignored
    Delete,
    /// Unclassifiable message kind, ignored without mutating the book
    Unknown,
}

/// A sequenced delta applied on top of prior book state
#[derive(Debug, Clone)]
pub struct Incremental {
    pub symbol: String,
    pub sequence: u64,
    pub kind: IncrementalKind,
    pub entries: Vec<BookEntry>,
}

impl Incremental {
    pub fn new(symbol: &str, sequence: u64, kind: IncrementalKind) -> Self {
        Self {
            symbol: symbol.to_string(),
            sequence,
            kind,
            entries: Vec::new(),
        }
    }

    pub fn with_entries(mut self, entries: Vec<BookEntry>) -> Self {
        self.entries = entries;
        self
    }
}

/// A trade print, carried through dispatch for side-effect handlers only;
/// trades never mutate the book.
#[derive(Debug, Clone)]
pub struct TradeTick {
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
}

/// Normalize a venue symbol for topic derivation (e.g. `BTC-USD` -> `btcusd`)
pub fn normalize_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Downstream topic for a symbol: `{normalized_symbol}.{exchange_code}`
pub fn derive_topic(symbol: &str, exchange_code: &str) -> String {
    format!("{}.{}", normalize_symbol(symbol), exchange_code.to_lowercase())
}
