//! Core order book implementation
//!
//! Merges a full snapshot with sequenced incremental diffs into a queryable
//! price ladder. Mutation is guarded by a sequence gate; callers guarantee a
//! single writer per book (see the pipeline module).

use tracing::debug;

use super::{MonotonicGate, PriceLevel, SequenceGate, Side, SideLadder, TopOfBook};
use crate::feed::{BookEntry, Incremental, IncrementalKind, Snapshot};

/// Order book for a single symbol
#[derive(Debug)]
pub struct OrderBook {
    symbol: String,
    /// Downstream topic, `{normalized_symbol}.{exchange_code}`
    topic: String,
    bids: SideLadder,
    asks: SideLadder,
    gate: Box<dyn SequenceGate>,
    /// Last applied sequence, 0 = uninitialized
    last_sequence: u64,
}

impl OrderBook {
    /// Create an empty book with the default monotonic gate
    pub fn new(symbol: &str, topic: &str) -> Self {
        Self::with_gate(symbol, topic, Box::new(MonotonicGate))
    }

    /// Create an empty book with an explicit gating policy
    pub fn with_gate(symbol: &str, topic: &str, gate: Box<dyn SequenceGate>) -> Self {
        Self {
            symbol: symbol.to_string(),
            topic: topic.to_string(),
            bids: SideLadder::new(Side::Buy),
            asks: SideLadder::new(Side::Sell),
            gate,
            last_sequence: 0,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    /// True once a snapshot or incremental has seeded the book
    pub fn is_initialized(&self) -> bool {
        self.last_sequence > 0
    }

    /// Empty both ladders and reset the sequence to uninitialized
    pub fn clear(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.last_sequence = 0;
    }

    /// Replace the whole book with the snapshot's entries
    ///
    /// No pre-existing level survives. Within the batch, a later entry at the
    /// same price overwrites an earlier one.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        debug!(symbol = %self.symbol, sequence = snapshot.sequence, "applying snapshot");
        self.clear();
        for entry in &snapshot.entries {
            self.upsert_entry(entry);
        }
        self.last_sequence = snapshot.sequence;
    }

    /// Apply an incremental diff, returns true iff the book advanced
    pub fn apply_incremental(&mut self, incremental: &Incremental) -> bool {
        if !self.gate.accept(incremental.sequence, self.last_sequence) {
            debug!(
                symbol = %self.symbol,
                sequence = incremental.sequence,
                last_sequence = self.last_sequence,
                "discarding stale incremental"
            );
            return false;
        }

        match incremental.kind {
            IncrementalKind::Update => {
                for entry in &incremental.entries {
                    self.upsert_entry(entry);
                }
            }
            IncrementalKind::Delete => {
                for entry in &incremental.entries {
                    self.sided_ladder(entry.side).remove(&entry.price);
                }
            }
            IncrementalKind::Unknown => {
                // Ignorable condition, leaves no trace: neither the ladders
                // nor the sequence move.
                debug!(
                    symbol = %self.symbol,
                    sequence = incremental.sequence,
                    "ignoring incremental of unknown kind"
                );
                return false;
            }
        }

        // Advances even when no entry changed anything; monotonicity of
        // last_sequence is the only ordering contract.
        self.last_sequence = incremental.sequence;
        true
    }

    /// Up to `depth` levels, best price first
    pub fn top_of_book(&self, side: Side, depth: usize) -> Vec<PriceLevel> {
        self.sided_ladder_ref(side).iter_best(depth).collect()
    }

    /// Relay record for the current state, prices and quantities as exact
    /// decimal text
    pub fn top_of_book_record(&self, depth: usize) -> TopOfBook {
        TopOfBook {
            symbol: self.symbol.clone(),
            topic: self.topic.clone(),
            sequence: self.last_sequence,
            bids: self
                .top_of_book(Side::Buy, depth)
                .iter()
                .map(PriceLevel::as_strings)
                .collect(),
            asks: self
                .top_of_book(Side::Sell, depth)
                .iter()
                .map(PriceLevel::as_strings)
                .collect(),
        }
    }

    fn upsert_entry(&mut self, entry: &BookEntry) {
        self.sided_ladder(entry.side).upsert(entry.price, entry.quantity);
    }

    fn sided_ladder(&mut self, side: Side) -> &mut SideLadder {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn sided_ladder_ref(&self, side: Side) -> &SideLadder {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::ContiguousGate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn entry(side: Side, price: Decimal, quantity: Decimal) -> BookEntry {
        BookEntry::new(side, price, quantity)
    }

    fn seeded_book() -> OrderBook {
        let mut book = OrderBook::new("btcusd", "btcusd.tst");
        book.apply_snapshot(&Snapshot {
            symbol: "btcusd".to_string(),
            sequence: 1,
            entries: vec![
                entry(Side::Buy, dec!(100), dec!(2)),
                entry(Side::Sell, dec!(101), dec!(3)),
            ],
        });
        book
    }

    #[test]
    fn test_snapshot_seeds_book() {
        let book = seeded_book();
        assert!(book.is_initialized());
        assert_eq!(book.last_sequence(), 1);
        assert_eq!(book.top_of_book(Side::Buy, 1), vec![PriceLevel::new(dec!(100), dec!(2))]);
        assert_eq!(book.top_of_book(Side::Sell, 1), vec![PriceLevel::new(dec!(101), dec!(3))]);
    }

    #[test]
    fn test_snapshot_replaces_prior_state() {
        let mut book = seeded_book();
        book.apply_snapshot(&Snapshot {
            symbol: "btcusd".to_string(),
            sequence: 9,
            entries: vec![entry(Side::Buy, dec!(55), dec!(1))],
        });

        assert_eq!(book.last_sequence(), 9);
        assert_eq!(book.top_of_book(Side::Buy, 10), vec![PriceLevel::new(dec!(55), dec!(1))]);
        assert!(book.top_of_book(Side::Sell, 10).is_empty());
    }

    #[test]
    fn test_snapshot_last_duplicate_price_wins() {
        let mut book = OrderBook::new("btcusd", "btcusd.tst");
        book.apply_snapshot(&Snapshot {
            symbol: "btcusd".to_string(),
            sequence: 3,
            entries: vec![
                entry(Side::Buy, dec!(100), dec!(1)),
                entry(Side::Buy, dec!(100), dec!(4)),
            ],
        });

        assert_eq!(book.top_of_book(Side::Buy, 10), vec![PriceLevel::new(dec!(100), dec!(4))]);
    }

    #[test]
    fn test_update_replaces_level() {
        let mut book = seeded_book();
        let applied = book.apply_incremental(
            &Incremental::new("btcusd", 2, IncrementalKind::Update)
                .with_entries(vec![entry(Side::Buy, dec!(100), dec!(5))]),
        );

        assert!(applied);
        assert_eq!(book.last_sequence(), 2);
        assert_eq!(book.top_of_book(Side::Buy, 1), vec![PriceLevel::new(dec!(100), dec!(5))]);
    }

    #[test]
    fn test_update_is_idempotent() {
        let mut book = seeded_book();
        let update = Incremental::new("btcusd", 2, IncrementalKind::Update)
            .with_entries(vec![entry(Side::Buy, dec!(100), dec!(5))]);

        book.apply_incremental(&update);
        let once = book.top_of_book(Side::Buy, 10);
        book.apply_incremental(&update);

        assert_eq!(book.top_of_book(Side::Buy, 10), once);
        assert_eq!(book.last_sequence(), 2);
    }

    #[test]
    fn test_stale_incremental_is_noop() {
        let mut book = seeded_book();
        book.apply_incremental(
            &Incremental::new("btcusd", 5, IncrementalKind::Update)
                .with_entries(vec![entry(Side::Buy, dec!(99), dec!(1))]),
        );

        let applied = book.apply_incremental(
            &Incremental::new("btcusd", 4, IncrementalKind::Update)
                .with_entries(vec![entry(Side::Buy, dec!(98), dec!(9))]),
        );

        assert!(!applied);
        assert_eq!(book.last_sequence(), 5);
        assert_eq!(
            book.top_of_book(Side::Buy, 10),
            vec![
                PriceLevel::new(dec!(100), dec!(2)),
                PriceLevel::new(dec!(99), dec!(1)),
            ]
        );
    }

    #[test]
    fn test_equal_sequence_is_processed() {
        // The gate rejects only regressions, so a delete arriving at the
        // current sequence still lands.
        let mut book = seeded_book();
        book.apply_incremental(
            &Incremental::new("btcusd", 2, IncrementalKind::Update)
                .with_entries(vec![entry(Side::Buy, dec!(100), dec!(5))]),
        );

        let applied = book.apply_incremental(
            &Incremental::new("btcusd", 2, IncrementalKind::Delete)
                .with_entries(vec![entry(Side::Buy, dec!(100), Decimal::ZERO)]),
        );

        assert!(applied);
        assert_eq!(book.last_sequence(), 2);
        assert!(book.top_of_book(Side::Buy, 10).is_empty());
    }

    #[test]
    fn test_delete_removes_exactly_one_level() {
        let mut book = seeded_book();
        book.apply_incremental(
            &Incremental::new("btcusd", 2, IncrementalKind::Update)
                .with_entries(vec![entry(Side::Buy, dec!(99), dec!(1))]),
        );

        book.apply_incremental(
            &Incremental::new("btcusd", 3, IncrementalKind::Delete)
                .with_entries(vec![entry(Side::Buy, dec!(100), Decimal::ZERO)]),
        );

        assert_eq!(book.top_of_book(Side::Buy, 10), vec![PriceLevel::new(dec!(99), dec!(1))]);
        assert_eq!(book.top_of_book(Side::Sell, 10), vec![PriceLevel::new(dec!(101), dec!(3))]);
    }

    #[test]
    fn test_delete_absent_price_still_advances_sequence() {
        let mut book = seeded_book();
        let applied = book.apply_incremental(
            &Incremental::new("btcusd", 7, IncrementalKind::Delete)
                .with_entries(vec![entry(Side::Sell, dec!(999), Decimal::ZERO)]),
        );

        assert!(applied);
        assert_eq!(book.last_sequence(), 7);
        assert_eq!(book.top_of_book(Side::Sell, 10), vec![PriceLevel::new(dec!(101), dec!(3))]);
    }

    #[test]
    fn test_unknown_kind_leaves_no_trace() {
        let mut book = seeded_book();
        let before_bids = book.top_of_book(Side::Buy, 10);

        let applied = book.apply_incremental(&Incremental::new("btcusd", 8, IncrementalKind::Unknown));

        assert!(!applied);
        assert_eq!(book.last_sequence(), 1);
        assert_eq!(book.top_of_book(Side::Buy, 10), before_bids);
    }

    #[test]
    fn test_empty_update_still_advances_sequence() {
        let mut book = seeded_book();
        let applied = book.apply_incremental(&Incremental::new("btcusd", 6, IncrementalKind::Update));

        assert!(applied);
        assert_eq!(book.last_sequence(), 6);
    }

    #[test]
    fn test_clear_resets_to_uninitialized() {
        let mut book = seeded_book();
        book.clear();

        assert!(!book.is_initialized());
        assert_eq!(book.last_sequence(), 0);
        assert!(book.top_of_book(Side::Buy, 10).is_empty());
        assert!(book.top_of_book(Side::Sell, 10).is_empty());
    }

    #[test]
    fn test_top_of_book_ordering_invariant() {
        let mut book = OrderBook::new("btcusd", "btcusd.tst");
        let mut entries = Vec::new();
        for i in 0..20 {
            entries.push(entry(Side::Buy, Decimal::from(100 - i), dec!(1)));
            entries.push(entry(Side::Sell, Decimal::from(101 + i), dec!(1)));
        }
        book.apply_snapshot(&Snapshot {
            symbol: "btcusd".to_string(),
            sequence: 1,
            entries,
        });

        let bids = book.top_of_book(Side::Buy, 20);
        assert!(bids.windows(2).all(|w| w[0].price > w[1].price));
        let asks = book.top_of_book(Side::Sell, 20);
        assert!(asks.windows(2).all(|w| w[0].price < w[1].price));

        // every depth is a prefix of the full ladder
        for n in 0..20 {
            assert_eq!(book.top_of_book(Side::Buy, n).as_slice(), &bids[..n]);
            assert_eq!(book.top_of_book(Side::Sell, n).as_slice(), &asks[..n]);
        }
    }

    #[test]
    fn test_record_serializes_exact_decimal_text() {
        let mut book = OrderBook::new("btcusd", "btcusd.tst");
        book.apply_snapshot(&Snapshot {
            symbol: "btcusd".to_string(),
            sequence: 4,
            entries: vec![
                entry(Side::Buy, dec!(100.50), dec!(2.000)),
                entry(Side::Sell, dec!(101.25), dec!(0.10)),
            ],
        });

        let record = book.top_of_book_record(5);
        assert_eq!(record.topic, "btcusd.tst");
        assert_eq!(record.sequence, 4);
        assert_eq!(record.bids, vec![["100.50".to_string(), "2.000".to_string()]]);
        assert_eq!(record.asks, vec![["101.25".to_string(), "0.10".to_string()]]);
    }

    #[test]
    fn test_contiguous_gate_rejects_gap() {
        let mut book = OrderBook::with_gate("btcusd", "btcusd.tst", Box::new(ContiguousGate));
        book.apply_snapshot(&Snapshot {
            symbol: "btcusd".to_string(),
            sequence: 10,
            entries: vec![entry(Side::Buy, dec!(100), dec!(1))],
        });

        let gapped = book.apply_incremental(
            &Incremental::new("btcusd", 12, IncrementalKind::Update)
                .with_entries(vec![entry(Side::Buy, dec!(101), dec!(1))]),
        );
        assert!(!gapped);

        let contiguous = book.apply_incremental(
            &Incremental::new("btcusd", 11, IncrementalKind::Update)
                .with_entries(vec![entry(Side::Buy, dec!(101), dec!(1))]),
        );
        assert!(contiguous);
        assert_eq!(book.last_sequence(), 11);
    }
}
