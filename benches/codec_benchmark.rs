//! Benchmarks for message decoding and snapshot construction

use bbo_stream::orderbook::BestOrderBook;
use bbo_stream::parser::IncomingMessage;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const BBO_MESSAGE: &str = r#"{"m":"bbo","symbol":"BTC/USDT","data":{"ts":1573068442532,"bid":["9309.11","0.0197172"],"ask":["9309.12","0.8851266"]}}"#;
const PING_MESSAGE: &str = r#"{"m":"ping","hp":3}"#;

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    group.bench_function("bbo", |b| {
        b.iter(|| IncomingMessage::decode(black_box(BBO_MESSAGE.as_bytes())))
    });

    group.bench_function("ping", |b| {
        b.iter(|| IncomingMessage::decode(black_box(PING_MESSAGE.as_bytes())))
    });

    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let bid = ["9309.11".to_string(), "0.0197172".to_string()];
    let ask = ["9309.12".to_string(), "0.8851266".to_string()];

    c.bench_function("build_best_order_book", |b| {
        b.iter(|| BestOrderBook::from_tokens(black_box(&bid[..]), black_box(&ask[..])))
    });

    c.bench_function("decode_and_build", |b| {
        b.iter(|| {
            if let Ok(IncomingMessage::Bbo(update)) =
                IncomingMessage::decode(black_box(BBO_MESSAGE.as_bytes()))
            {
                black_box(update.best_order_book().ok());
            }
        })
    });
}

criterion_group!(benches, bench_decode, bench_build);
criterion_main!(benches);
