use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use stitchopt::dst;
use stitchopt::pattern::{Pattern, PatternBuilder, ThreadColor};
use stitchopt::reduce::{self, config_for_level};
use stitchopt::render;
use std::fs;
use std::path::Path;

/// Fill-like pattern: rows of short stitches with slight wobble, a jump
/// between rows and a color change every `rows_per_color` rows.
fn gen_pattern(stitches: usize, seed: u64) -> Pattern {
    let mut s = seed;
    let mut next = move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        (s >> 33) as i32
    };
    let per_row = 200usize;
    let rows_per_color = 20usize;
    let mut b = PatternBuilder::new("bench");
    for i in 0..stitches {
        let row = (i / per_row) as i32;
        let col = (i % per_row) as i32;
        if col == 0 && row > 0 {
            if row as usize % rows_per_color == 0 {
                let shade = (row as usize / rows_per_color * 40 % 256) as u8;
                b = b.color_change(ThreadColor::Rgb(shade, 0, 255 - shade));
            }
            b = b.jump(0, row * 4);
        }
        let wobble = next() % 3 - 1;
        let x = if row % 2 == 0 { col * 8 } else { (per_row as i32 - col) * 8 };
        b = b.stitch(x, row * 4 + wobble);
    }
    b.build()
}

fn write_reduction_snapshot() {
    let pattern = gen_pattern(50_000, 123);
    let mut csv = String::from("level,original,reduced,ratio\n");
    for level in 0u32..=3 {
        let (_, stats) = reduce::reduce(&pattern, &config_for_level(level));
        let ratio = stats.new_count as f64 / stats.original_count as f64;
        csv.push_str(&format!(
            "{level},{},{},{}\n",
            stats.original_count, stats.new_count, ratio
        ));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("reduction_snapshot.csv"), csv);
}

fn bench_decode(c: &mut Criterion) {
    let mut g = c.benchmark_group("dst_decode");
    for n in [1_000usize, 10_000, 100_000] {
        let bytes = dst::encode(&gen_pattern(n, 1)).unwrap();
        g.throughput(Throughput::Bytes(bytes.len() as u64));
        g.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let p = dst::decode(black_box(&bytes)).unwrap();
                black_box(p);
            });
        });
    }
    g.finish();
}

fn bench_encode(c: &mut Criterion) {
    let mut g = c.benchmark_group("dst_encode");
    for n in [1_000usize, 10_000, 100_000] {
        let pattern = gen_pattern(n, 2);
        g.throughput(Throughput::Elements(n as u64));
        g.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                let bytes = dst::encode(black_box(&pattern)).unwrap();
                black_box(bytes);
            });
        });
    }
    g.finish();
}

fn bench_reduce_vs_level(c: &mut Criterion) {
    write_reduction_snapshot();
    let mut g = c.benchmark_group("reduce_vs_level");
    let pattern = gen_pattern(50_000, 3);
    g.throughput(Throughput::Elements(pattern.len() as u64));
    for level in 0u32..=3 {
        let config = config_for_level(level);
        g.bench_with_input(BenchmarkId::from_parameter(level), &level, |b, _| {
            b.iter(|| {
                let out = reduce::reduce(black_box(&pattern), &config);
                black_box(out);
            });
        });
    }
    g.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut g = c.benchmark_group("render_preview");
    let pattern = gen_pattern(20_000, 4);
    for size in [256u32, 512, 1024] {
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, size| {
            b.iter(|| {
                let img = render::render(black_box(&pattern), *size).unwrap();
                black_box(img);
            });
        });
    }
    g.finish();
}

fn bench_full_pipeline(c: &mut Criterion) {
    let mut g = c.benchmark_group("optimize_pipeline");
    let bytes = dst::encode(&gen_pattern(30_000, 5)).unwrap();
    let no_preview = stitchopt::engine::OptimizeOptions {
        preview: false,
        ..Default::default()
    };
    g.throughput(Throughput::Bytes(bytes.len() as u64));
    g.bench_function("without_preview", |b| {
        b.iter(|| black_box(stitchopt::engine::optimize(black_box(&bytes), &no_preview)));
    });
    g.bench_function("with_preview", |b| {
        b.iter(|| {
            black_box(stitchopt::engine::optimize(
                black_box(&bytes),
                &Default::default(),
            ))
        });
    });
    g.finish();
}

criterion_group!(
    benches,
    bench_decode,
    bench_encode,
    bench_reduce_vs_level,
    bench_render,
    bench_full_pipeline
);
criterion_main!(benches);
