//! Performance benchmarks for frame and clock encoding.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench frame_bench
//! ```

use chrono::{TimeZone, Utc};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use x10_core::{CommandCode, DimAmount, HouseCode, UnitCode};
use x10_protocol::{Frame, encode_address, encode_clock, encode_function};

fn bench_frame_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encoding");

    let unit = UnitCode::new(9).unwrap();
    group.bench_function("encode_address", |b| {
        b.iter(|| encode_address(black_box(HouseCode::E), black_box(unit)));
    });

    let dim = DimAmount::new(75).unwrap();
    group.bench_function("encode_function_plain", |b| {
        b.iter(|| {
            encode_function(
                black_box(HouseCode::E),
                black_box(CommandCode::On),
                black_box(dim),
            )
        });
    });

    group.bench_function("encode_function_dim", |b| {
        b.iter(|| {
            encode_function(
                black_box(HouseCode::E),
                black_box(CommandCode::Dim),
                black_box(dim),
            )
        });
    });

    group.finish();
}

fn bench_checksum(c: &mut Criterion) {
    let frame = Frame::from_parts(0x04, 0x66);
    c.bench_function("frame_checksum", |b| {
        b.iter(|| black_box(&frame).checksum());
    });
}

fn bench_clock_encoding(c: &mut Criterion) {
    let now = Utc.with_ymd_and_hms(2026, 8, 21, 15, 30, 45).unwrap();
    c.bench_function("encode_clock", |b| {
        b.iter(|| encode_clock(black_box(&now), black_box(HouseCode::A)));
    });
}

criterion_group!(
    benches,
    bench_frame_encoding,
    bench_checksum,
    bench_clock_encoding
);
criterion_main!(benches);
