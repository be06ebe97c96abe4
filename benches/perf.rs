use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use less_grammar::{compile, CompileOptions, Extensions};

struct Case {
    name: &'static str,
    source: &'static str,
    minify: bool,
}

fn compile_benchmarks(c: &mut Criterion) {
    let cases = [
        Case {
            name: "baseline_pretty",
            source: include_str!("../fixtures/benchmark.less"),
            minify: false,
        },
        Case {
            name: "baseline_minified",
            source: include_str!("../fixtures/benchmark.less"),
            minify: true,
        },
        Case {
            name: "mixins_pretty",
            source: include_str!("../fixtures/mixins.less"),
            minify: false,
        },
        Case {
            name: "mixins_minified",
            source: include_str!("../fixtures/mixins.less"),
            minify: true,
        },
        Case {
            name: "nested_pretty",
            source: include_str!("../fixtures/nested.less"),
            minify: false,
        },
        Case {
            name: "nested_minified",
            source: include_str!("../fixtures/nested.less"),
            minify: true,
        },
    ];

    for case in cases {
        bench_case(c, &case);
    }
}

fn bench_case(c: &mut Criterion, case: &Case) {
    let mut group = c.benchmark_group(format!("less_compile/{}", case.name));
    group.throughput(Throughput::Bytes(case.source.len() as u64));

    let id = BenchmarkId::new(case.name, if case.minify { "min" } else { "pretty" });
    group.bench_with_input(id, &case.minify, |b, &minify| {
        b.iter(|| {
            compile(
                case.source,
                CompileOptions {
                    minify,
                    ..CompileOptions::default()
                },
            )
            .unwrap()
        });
    });

    group.finish();
}

/// 先编译出纯 CSS，再测量关闭全部扩展后的 CSS2 解析速度。
fn plain_css_benchmark(c: &mut Criterion) {
    let css = compile(
        include_str!("../fixtures/benchmark.less"),
        CompileOptions::default(),
    )
    .unwrap();
    let mut group = c.benchmark_group("css_parse");
    group.throughput(Throughput::Bytes(css.len() as u64));
    group.bench_function("benchmark_output", |b| {
        b.iter(|| {
            compile(
                &css,
                CompileOptions {
                    extensions: Extensions::css(),
                    ..CompileOptions::default()
                },
            )
            .unwrap()
        });
    });
    group.finish();
}

criterion_group!(benches, compile_benchmarks, plain_css_benchmark);
criterion_main!(benches);
