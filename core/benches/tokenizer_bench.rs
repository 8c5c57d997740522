use criterion::{criterion_group, criterion_main, Criterion};
use sitesearch_core::source::parse_store;
use sitesearch_core::tokenizer::tokenize;
use sitesearch_core::{Document, IndexBuilder, QueryEngine};
use std::path::Path;

const STORE: &str = include_str!("../tests/data/lunr-store.js");

fn bench_tokenize(c: &mut Criterion) {
    c.bench_function("tokenize_store", |b| b.iter(|| tokenize(STORE)));
}

fn bench_query(c: &mut Criterion) {
    let docs: Vec<Document> = parse_store(Path::new("lunr-store.js"), STORE)
        .expect("fixture parses")
        .into_iter()
        .map(Document::from)
        .collect();
    let (index, _) = IndexBuilder::default().build(docs).expect("fixture builds");
    let engine = QueryEngine::new(index);
    c.bench_function("query_top10", |b| b.iter(|| engine.top("portfolio engineering", 10)));
}

criterion_group!(benches, bench_tokenize, bench_query);
criterion_main!(benches);
