//! Order book module
//!
//! Per-symbol limit order book reconstruction from snapshots and sequenced
//! incremental diffs.

mod gate;
mod ladder;
mod limit_book;

pub use gate::{ContiguousGate, MonotonicGate, SequenceGate};
pub use ladder::SideLadder;
pub use limit_book::OrderBook;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Parse a wire side string; anything unclassifiable is `None` and the
    /// caller must skip that entry rather than guess.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "buy" | "bid" | "bids" | "b" => Some(Side::Buy),
            "sell" | "ask" | "asks" | "s" | "a" => Some(Side::Sell),
            _ => None,
        }
    }
}

/// A single level in the order book: total resting quantity at one price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    /// Exact decimal text pair for the relay boundary, lossless
    pub fn as_strings(&self) -> [String; 2] {
        [self.price.to_string(), self.quantity.to_string()]
    }
}

/// Top-of-book record emitted after every applied mutation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopOfBook {
    pub symbol: String,
    pub topic: String,
    pub sequence: u64,
    pub bids: Vec<[String; 2]>,
    pub asks: Vec<[String; 2]>,
}
