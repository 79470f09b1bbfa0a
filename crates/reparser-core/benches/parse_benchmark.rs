//! Benchmarks for the inline scanner, with pulldown-cmark as a reference point
//!
//! Run with: cargo bench -p reparser-core

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pulldown_cmark::{Options, Parser as MdParser};
use reparser_core::{CaptureRef, Parser, TokenDefinition};

/// Inline-heavy chat-style text
const SAMPLE: &str = "Hey **team**, the *new* build is up at [staging](https://staging.example.com). \
Run `cargo test -- --nocapture` before you **merge *anything* else** :smile:\n\
Release notes: **fixed** the `*unclosed*` parser bug, *improved* [docs](https://docs.example.com) \
and removed the **legacy `**raw**` mode**. Ping me if anything breaks :smile:\n";

fn markdown_tokens() -> Vec<TokenDefinition> {
    vec![
        TokenDefinition::paired("bold", r"\*\*", r"\*\*").with_attr("bold", true),
        TokenDefinition::paired("italic", r"\*", r"\*").with_attr("italic", true),
        TokenDefinition::paired("code", "`", "`")
            .with_skip(true)
            .with_attr("code", true),
        TokenDefinition::single("link", r"\[(?P<label>[^\]]+)\]\((?P<url>[^)\s]+)\)")
            .with_text(CaptureRef::new("label"))
            .with_attr("href", CaptureRef::new("url")),
        TokenDefinition::single("smile", ":smile:").with_text("😀"),
    ]
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile", |b| {
        b.iter(|| {
            let parser = Parser::new(black_box(markdown_tokens())).unwrap();
            black_box(parser.pattern().len())
        })
    });
}

fn bench_parse(c: &mut Criterion) {
    let parser = Parser::new(markdown_tokens()).unwrap();
    let mut group = c.benchmark_group("parse");

    group.throughput(Throughput::Bytes(SAMPLE.len() as u64));

    group.bench_function("reparser", |b| {
        b.iter(|| {
            let count = parser.parse_plain(black_box(SAMPLE)).count();
            black_box(count)
        })
    });

    group.bench_function("markdown_pulldown", |b| {
        b.iter(|| {
            let md = MdParser::new_ext(black_box(SAMPLE), Options::all());
            let events: Vec<_> = md.collect();
            black_box(events.len())
        })
    });

    group.finish();
}

fn bench_scaling(c: &mut Criterion) {
    let parser = Parser::new(markdown_tokens()).unwrap();
    let mut group = c.benchmark_group("scaling");

    for size in [1, 10, 100].iter() {
        let content = SAMPLE.repeat(*size);
        group.throughput(Throughput::Bytes(content.len() as u64));

        group.bench_with_input(BenchmarkId::new("reparser", size), &content, |b, content| {
            b.iter(|| {
                let count = parser.parse_plain(black_box(content)).count();
                black_box(count)
            })
        });

        // Stops after the first fragment.
        group.bench_with_input(BenchmarkId::new("first_fragment", size), &content, |b, content| {
            b.iter(|| {
                let first = parser.parse_plain(black_box(content)).next();
                black_box(first.is_some())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_compile, bench_parse, bench_scaling);
criterion_main!(benches);
