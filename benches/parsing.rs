//! Benchmarks for LogIQ template mining performance

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use logiq::template::{extract_message, mask_tokens};
use logiq::{TemplateId, TemplateMiner};
use std::sync::Arc;

fn generate_lines(count: usize) -> Vec<String> {
    let services = ["auth", "payment", "search", "checkout"];
    (0..count)
        .map(|i| {
            let service = services[i % services.len()];
            match i % 4 {
                0 => format!("[2024-05-01 12:00:00] [INFO] {}: User {} logged in", service, i),
                1 => format!("[2024-05-01 12:00:00] [INFO] {}: Query took {} ms", service, i % 300),
                2 => format!("[2024-05-01 12:00:00] [WARN] {}: Cache miss for key {}", service, i),
                _ => format!("[2024-05-01 12:00:00] [ERROR] {}: Connection reset by peer", service),
            }
        })
        .collect()
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    let lines = generate_lines(1000);
    group.throughput(Throughput::Elements(1000));

    group.bench_function("parse_1000_lines_warm", |b| {
        let miner = TemplateMiner::new();
        // Warm up the tree
        for line in &lines {
            miner.parse(line);
        }
        b.iter(|| {
            for line in &lines {
                black_box(miner.parse(line));
            }
        })
    });

    group.bench_function("parse_1000_lines_cold", |b| {
        b.iter(|| {
            let miner = TemplateMiner::new();
            for line in &lines {
                black_box(miner.parse(line));
            }
        })
    });

    group.finish();
}

fn bench_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("depth");
    let lines = generate_lines(1000);

    for depth in [2usize, 5, 10] {
        let miner = TemplateMiner::with_config(logiq::MinerConfig { max_depth: depth })
            .expect("valid depth");
        for line in &lines {
            miner.parse(line);
        }
        group.bench_with_input(BenchmarkId::from_parameter(depth), &lines, |b, lines| {
            b.iter(|| {
                for line in lines {
                    black_box(miner.parse(line));
                }
            })
        });
    }

    group.finish();
}

fn bench_helpers(c: &mut Criterion) {
    let mut group = c.benchmark_group("helpers");
    let line = "[2024-05-01 12:00:00] [INFO] auth: User 4242 logged in from 10.0.0.1";

    group.bench_function("extract_and_mask", |b| {
        b.iter(|| {
            let tokens: Vec<&str> = extract_message(black_box(line)).split_whitespace().collect();
            black_box(mask_tokens(&tokens));
        })
    });

    group.bench_function("template_id", |b| {
        b.iter(|| black_box(TemplateId::of(black_box("auth: User <*> logged in from <*>"))))
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    let mut group = c.benchmark_group("concurrent");
    let lines = Arc::new(generate_lines(1000));
    group.throughput(Throughput::Elements(4000));

    group.bench_function("parse_4_threads", |b| {
        let miner = Arc::new(TemplateMiner::new());
        b.iter(|| {
            std::thread::scope(|scope| {
                for _ in 0..4 {
                    let miner = Arc::clone(&miner);
                    let lines = Arc::clone(&lines);
                    scope.spawn(move || {
                        for line in lines.iter() {
                            black_box(miner.parse(line));
                        }
                    });
                }
            });
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parse,
    bench_depth,
    bench_helpers,
    bench_concurrent
);
criterion_main!(benches);
