use criterion::{criterion_group, criterion_main, Criterion};
use letor_core::evaluator::RetrievalEvaluator;
use letor_core::memory::{DocInput, MemoryIndex, MemoryIndexBuilder};
use letor_core::{Bm25Params, Field, IndriParams};

fn synthetic_index(docs: usize) -> MemoryIndex {
    let vocab = [
        "espresso", "roast", "grind", "filter", "machine", "water", "pressure", "crema",
        "bean", "brew", "kettle", "temperature",
    ];
    let mut b = MemoryIndexBuilder::new();
    for i in 0..docs {
        let mut body = String::new();
        for j in 0..40 {
            body.push_str(vocab[(i * 7 + j * 3) % vocab.len()]);
            body.push(' ');
        }
        b.add_document(DocInput {
            external_id: format!("doc-{i}"),
            url: format!("http://example.com/{i}"),
            spam_score: (i % 100) as i64,
            fields: vec![(Field::Body, body)],
        });
    }
    b.build()
}

fn bench_field_scores(c: &mut Criterion) {
    let index = synthetic_index(500);
    let evaluator = RetrievalEvaluator::new(
        &index,
        Some(Bm25Params {
            b: 0.75,
            k1: 1.2,
            k3: 0.0,
        }),
        Some(IndriParams {
            mu: 2500.0,
            lambda: 0.4,
        }),
    );
    let stems: Vec<String> = ["espresso", "grind", "pressure"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    c.bench_function("bm25_field_score_500_docs", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for doc in 0..500 {
                total += evaluator.bm25_score(&stems, doc, Field::Body);
            }
            total
        })
    });

    c.bench_function("indri_field_score_500_docs", |b| {
        b.iter(|| {
            let mut total = 0.0;
            for doc in 0..500 {
                total += evaluator.indri_score(&stems, doc, Field::Body);
            }
            total
        })
    });
}

criterion_group!(benches, bench_field_scores);
criterion_main!(benches);
