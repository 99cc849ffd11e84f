//! Encoder throughput benchmarks.
//!
//! Run with:
//! ```sh
//! cargo bench --bench encoder_bench
//! ```

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use hwbus_protocol::{Chipset, LedBuffer, Rgb, ws281x};
use std::hint::black_box;

const STRIP_SIZES: [usize; 4] = [3, 12, 60, 300];

fn bench_ws281x_expand(c: &mut Criterion) {
    let mut group = c.benchmark_group("ws281x_expand");
    group.throughput(Throughput::Elements(256));

    group.bench_function("all_bytes", |b| {
        b.iter(|| {
            for byte in 0..=255u8 {
                black_box(ws281x::expand(black_box(byte)));
            }
        });
    });

    group.finish();
}

fn bench_set_led(c: &mut Criterion) {
    let mut group = c.benchmark_group("set_led");
    group.throughput(Throughput::Elements(1));

    for chipset in [Chipset::Ws281x, Chipset::Apa102] {
        let mut buffer = LedBuffer::new(chipset, 60).unwrap();
        group.bench_function(chipset.as_str(), |b| {
            b.iter(|| {
                buffer
                    .set_led(black_box(30), black_box(Rgb::new(0x12, 0x34, 0x56)), None)
                    .unwrap();
            });
        });
    }

    group.finish();
}

fn bench_encode_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_all");

    for chipset in [Chipset::Ws281x, Chipset::Apa102] {
        for size in STRIP_SIZES {
            group.throughput(Throughput::Elements(size as u64));
            let mut buffer = LedBuffer::new(chipset, size).unwrap();
            group.bench_with_input(
                BenchmarkId::new(chipset.as_str(), size),
                &size,
                |b, _| {
                    b.iter(|| buffer.encode_all(black_box(Rgb::new(0xFF, 0x80, 0x00))));
                },
            );
        }
    }

    group.finish();
}

fn bench_decode_strip(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_strip");

    for size in STRIP_SIZES {
        group.throughput(Throughput::Elements(size as u64));
        let mut buffer = LedBuffer::new(Chipset::Ws281x, size).unwrap();
        buffer.encode_all(Rgb::new(1, 2, 3));
        group.bench_with_input(BenchmarkId::from_parameter(size), &buffer, |b, buffer| {
            b.iter(|| black_box(buffer.colors()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_ws281x_expand,
    bench_set_led,
    bench_encode_all,
    bench_decode_strip,
);

criterion_main!(benches);
