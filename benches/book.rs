//! Benchmarks for order book operations

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use depthcast::book::{OrderBook, Side};
use depthcast::feed::{BookEntry, Incremental, IncrementalKind, Snapshot};
use rust_decimal::Decimal;
use std::str::FromStr;

fn create_snapshot(levels: usize) -> Snapshot {
    let quantity = Decimal::from_str("1.5").unwrap();
    let mut entries = Vec::with_capacity(levels * 2);
    for i in 0..levels {
        entries.push(BookEntry::new(
            Side::Buy,
            Decimal::from(50000 - i as i64),
            quantity,
        ));
        entries.push(BookEntry::new(
            Side::Sell,
            Decimal::from(50001 + i as i64),
            quantity,
        ));
    }

    Snapshot {
        symbol: "btcusdt".to_string(),
        sequence: 1000,
        entries,
    }
}

fn create_update(sequence: u64) -> Incremental {
    Incremental::new("btcusdt", sequence, IncrementalKind::Update).with_entries(vec![
        BookEntry::new(Side::Buy, Decimal::from(49999), Decimal::from_str("2.0").unwrap()),
        BookEntry::new(Side::Sell, Decimal::from(50001), Decimal::from_str("2.5").unwrap()),
    ])
}

fn benchmark_apply_snapshot(c: &mut Criterion) {
    let snapshot = create_snapshot(100);

    c.bench_function("apply_snapshot_100_levels", |b| {
        b.iter(|| {
            let mut book = OrderBook::new("btcusdt", "btcusdt.bnc");
            book.apply_snapshot(black_box(&snapshot));
        })
    });
}

fn benchmark_apply_incremental(c: &mut Criterion) {
    let snapshot = create_snapshot(100);
    let mut book = OrderBook::new("btcusdt", "btcusdt.bnc");
    book.apply_snapshot(&snapshot);

    let mut sequence = 1000;
    c.bench_function("apply_incremental", |b| {
        b.iter(|| {
            sequence += 1;
            let update = create_update(sequence);
            book.apply_incremental(black_box(&update));
        })
    });
}

fn benchmark_top_of_book(c: &mut Criterion) {
    let snapshot = create_snapshot(100);
    let mut book = OrderBook::new("btcusdt", "btcusdt.bnc");
    book.apply_snapshot(&snapshot);

    c.bench_function("top_of_book_5", |b| {
        b.iter(|| {
            black_box(book.top_of_book(Side::Buy, 5));
            black_box(book.top_of_book(Side::Sell, 5));
        })
    });

    c.bench_function("top_of_book_record_5", |b| {
        b.iter(|| {
            black_box(book.top_of_book_record(5));
        })
    });
}

criterion_group!(
    benches,
    benchmark_apply_snapshot,
    benchmark_apply_incremental,
    benchmark_top_of_book
);
criterion_main!(benches);
