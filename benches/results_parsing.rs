//! Benchmarks for results parsing and per-competitor derivation
//!
//! Uses the fixture event from `test_utils`, with the results document scaled up to
//! realistic group sizes (a regional event has a few hundred finishers per page).
//!
//! Run with `cargo bench --features benchmark`.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use splitview::config::{MarkerConfig, ResultsLayout, RouteConfig, SheetConfig, Tokens};
use splitview::registry::SheetScale;
use splitview::results::markup;
use splitview::test_utils::{COORDINATES, GROUPS};
use splitview::{CoordinateRegistry, GroupRegistry, ResultsParser, RouteGeometry, SplitsCalculator};
use std::fmt::Write as _;
use std::hint::black_box;

const HEADER: &str = "<tr><td>Место</td><td>№</td><td>Фамилия</td><td>Результат</td>\
                      <td>#1 [31]</td><td>#2 [32]</td><td>#3 [45]</td></tr>";

fn results_document(competitors: usize) -> String {
    let mut html = String::from("<html><body><a name=\"М21\"></a><table class=\"rezult\">");
    html.push_str(HEADER);
    for i in 0..competitors {
        let _ = write!(
            html,
            "<tr><td>{rank}.</td><td>{bib}</td><td>Участник {i}</td><td>0:{m:02}:{s:02}</td>\
             <td>[31] 10:{s:02}<br>10:{s:02}</td><td>[32]<br>12:30</td><td>[45]<br>{m}:0{d}</td></tr>",
            rank = i + 1,
            bib = 100 + i,
            m = 40 + i % 20,
            s = i % 60,
            d = i % 10,
        );
    }
    html.push_str("</table></body></html>");
    html
}

fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    for competitors in [10, 100, 500] {
        let html = results_document(competitors);
        group.throughput(Throughput::Bytes(html.len() as u64));
        group.bench_function(BenchmarkId::new("markup", competitors), |b| {
            b.iter(|| black_box(markup::tokenize(black_box(&html))))
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let tokens = Tokens::default();
    let layout = ResultsLayout::default();
    let groups = GroupRegistry::from_source(GROUPS, &tokens);
    let parser = ResultsParser::new(&groups, &layout, &tokens);

    let mut group = c.benchmark_group("parse");

    for competitors in [10, 100, 500] {
        let html = results_document(competitors);
        group.throughput(Throughput::Elements(competitors as u64));
        group.bench_function(BenchmarkId::new("results", competitors), |b| {
            b.iter(|| black_box(parser.parse(black_box(&html))))
        });
    }

    group.finish();
}

fn bench_derivation(c: &mut Criterion) {
    let tokens = Tokens::default();
    let layout = ResultsLayout::default();
    let scale = SheetScale::new(SheetConfig::default(), 2100, 2970);
    let registry =
        CoordinateRegistry::from_source(COORDINATES, scale, &MarkerConfig::default(), &tokens);
    let groups = GroupRegistry::from_source(GROUPS, &tokens);
    let results = ResultsParser::new(&groups, &layout, &tokens).parse(&results_document(100));

    let geometry = RouteGeometry::new(&registry, RouteConfig::default(), 1.5);
    let splits = SplitsCalculator::new(&registry, 10.0);
    let competitors: Vec<_> = results.iter().flat_map(|g| g.competitors.iter()).collect();

    let mut group = c.benchmark_group("derivation");
    group.throughput(Throughput::Elements(competitors.len() as u64));

    group.bench_function("polyline", |b| {
        b.iter(|| {
            for record in &competitors {
                black_box(geometry.polyline(black_box(&record.path)));
            }
        })
    });

    group.bench_function("split_rows", |b| {
        b.iter(|| {
            for record in &competitors {
                black_box(splits.rows(black_box(record)));
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_parse, bench_derivation);
criterion_main!(benches);
