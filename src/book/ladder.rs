//! One side of the book: an ordered price -> quantity map
//!
//! Uses BTreeMap keyed by `Decimal`, so prices compare numerically and
//! `100.5`/`100.50` land on the same level.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::{PriceLevel, Side};

/// Price ladder for a single side, iteration order fixed at construction:
/// descending for bids, ascending for asks.
#[derive(Debug)]
pub struct SideLadder {
    side: Side,
    levels: BTreeMap<Decimal, Decimal>,
}

impl SideLadder {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            levels: BTreeMap::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Insert or replace the level at `price` with an absolute quantity
    pub fn upsert(&mut self, price: Decimal, quantity: Decimal) {
        self.levels.insert(price, quantity);
    }

    /// Remove the level at `price`; removing an absent price is a no-op
    pub fn remove(&mut self, price: &Decimal) {
        self.levels.remove(price);
    }

    /// Best-first levels, bounded to `limit` entries
    pub fn iter_best(&self, limit: usize) -> Box<dyn Iterator<Item = PriceLevel> + '_> {
        let to_level = |(price, quantity): (&Decimal, &Decimal)| PriceLevel::new(*price, *quantity);
        match self.side {
            Side::Buy => Box::new(self.levels.iter().rev().take(limit).map(to_level)),
            Side::Sell => Box::new(self.levels.iter().take(limit).map(to_level)),
        }
    }

    /// The best level, if any
    pub fn best(&self) -> Option<PriceLevel> {
        self.iter_best(1).next()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }
}
