//! Normalization and master-file parsing benchmarks (Criterion).
//!
//! Run: `cargo bench` or `cargo bench --bench normalize`.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use instrument_catalog::catalog::CatalogQuery;
use instrument_catalog::normalize::normalize_record;
use instrument_catalog::raw::{parse_master_file, RawRecord};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

fn option_record(i: usize) -> Value {
    json!({
        "symTicker": format!("NSE:NIFTY25JUL{}CE", 20000 + i * 50),
        "fyToken": format!("1011{:08}", i),
        "exToken": 40000 + i,
        "exSymbol": "NIFTY",
        "exSymName": "NIFTY 50",
        "exchange": 10,
        "exchangeName": "NSE",
        "segment": 11,
        "exInstType": 14,
        "tradeStatus": 1,
        "currencyCode": "INR",
        "lastUpdate": "2025-06-05",
        "underSym": "NIFTY",
        "underFyTok": "101000000026000",
        "optType": "CE",
        "strikePrice": (20000 + i * 50) as f64,
        "expiryDate": "1753351800",
        "minLotSize": 75,
        "tickSize": 0.05,
        "upperPrice": 1234.5,
        "lowerPrice": 0.05,
        "qtyFreeze": "1801",
        "previousClose": 1000.0,
        "isin": "NA",
        "symbolDesc": "NIFTY 24 Jul 25 CE",
        "is_mtf_tradable": 0
    })
}

fn master_file(n: usize) -> String {
    let map: Map<String, Value> = (0..n)
        .map(|i| (format!("1011{:08}", i), option_record(i)))
        .collect();
    Value::Object(map).to_string()
}

fn bench_normalize_records(c: &mut Criterion) {
    const N: usize = 1000;
    let records: Vec<RawRecord> = (0..N)
        .map(|i| RawRecord::from_json(i.to_string(), option_record(i)))
        .collect();
    let mut group = c.benchmark_group("normalize");
    group.throughput(Throughput::Elements(N as u64));
    group.bench_function("normalize_record_1000", |b| {
        b.iter(|| {
            for raw in &records {
                let _ = black_box(normalize_record(raw));
            }
        })
    });
    group.finish();
}

fn bench_parse_master_file(c: &mut Criterion) {
    const N: usize = 5000;
    let text = master_file(N);
    let mut group = c.benchmark_group("parse");
    group.throughput(Throughput::Bytes(text.len() as u64));
    group.bench_function("parse_master_file_5000", |b| {
        b.iter_batched(
            || text.clone(),
            |t| parse_master_file(&t).unwrap(),
            BatchSize::LargeInput,
        )
    });
    group.finish();
}

fn bench_query_parsing(c: &mut Criterion) {
    let params: HashMap<String, String> = [
        ("search", "nifty"),
        ("exchange_code", "10"),
        ("segment_code", "11"),
        ("page", "3"),
        ("limit", "100"),
        ("sortBy", "strikePrice"),
        ("sortOrder", "desc"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    c.bench_function("catalog_query_from_params", |b| {
        b.iter(|| CatalogQuery::from_params(black_box(&params)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_normalize_records,
    bench_parse_master_file,
    bench_query_parsing
);
criterion_main!(benches);
