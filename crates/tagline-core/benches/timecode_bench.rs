//! Benchmarks for tagline-core timecode operations.
//!
//! Run with: cargo bench -p tagline-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tagline_core::{FrameRate, FrameRounding, RationalTime, TimecodeEngine};

fn bench_rational_time_arithmetic(c: &mut Criterion) {
    let a = RationalTime::new(1001, 30);
    let b = RationalTime::new(500, 24);

    c.bench_function("rational_time_add", |bencher| {
        bencher.iter(|| black_box(a) + black_box(b));
    });

    c.bench_function("rational_time_mul_i64", |bencher| {
        bencher.iter(|| black_box(a) * black_box(100));
    });
}

fn bench_frame_conversion(c: &mut Criterion) {
    let engine = TimecodeEngine::new(FrameRate::FPS_29_97, false);

    c.bench_function("time_to_frame_1hr", |bencher| {
        bencher.iter(|| black_box(engine).time_to_frame(black_box(3600.0), FrameRounding::Floor));
    });

    c.bench_function("frame_to_time_107892", |bencher| {
        bencher.iter(|| black_box(engine).frame_to_time(black_box(107_892)));
    });
}

fn bench_timecode_formatting(c: &mut Criterion) {
    let ndf = TimecodeEngine::new(FrameRate::FPS_24, false);
    let df = TimecodeEngine::new(FrameRate::FPS_29_97, true);

    c.bench_function("frame_to_smpte_24fps", |bencher| {
        bencher.iter(|| black_box(ndf).frame_to_smpte(black_box(89_356)));
    });

    c.bench_function("frame_to_smpte_dropframe_29.97", |bencher| {
        bencher.iter(|| black_box(df).frame_to_smpte(black_box(111_610)));
    });

    c.bench_function("smpte_to_frame_dropframe_parse", |bencher| {
        bencher.iter(|| black_box(df).smpte_to_frame(black_box("01:02:03;04")));
    });
}

criterion_group!(
    benches,
    bench_rational_time_arithmetic,
    bench_frame_conversion,
    bench_timecode_formatting,
);
criterion_main!(benches);
