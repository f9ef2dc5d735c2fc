use criterion::{black_box, criterion_group, criterion_main, Criterion};

use std::sync::Arc;

use reform::{CatalogBuilder, ExternalData, FormSession, FormState, Record, RuleCatalog, Value};

/// Build a catalog of `n` chained rules (f0 -> f1 -> ... -> fn), each
/// incrementing its upstream field, so one edit cascades through all of them.
fn chain_catalog(n: usize) -> Arc<RuleCatalog> {
    let mut builder = CatalogBuilder::new();
    for i in 0..n {
        let from = format!("f{i}");
        let to = format!("f{}", i + 1);
        let id = format!("r{i}");
        builder = builder.rule(&id, |r| {
            let watch = from.clone();
            r.on(&from).calculate(&to, move |ctx| {
                Ok(Value::from(ctx.value(&watch).as_i64().unwrap_or(0) + 1))
            })
        });
    }
    Arc::new(builder.compile().unwrap())
}

fn worker_list(n: usize) -> ExternalData {
    ExternalData::new().list(
        "workerOptions",
        (0..n)
            .map(|i| {
                Record::new()
                    .with("_id", format!("w{i}"))
                    .with("fullName", format!("Worker {i}"))
            })
            .collect(),
    )
}

fn bench_cascade(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply_change");

    for &n in &[5, 20, 50] {
        let catalog = chain_catalog(n);
        group.bench_function(&format!("{n}_rule_chain"), |b| {
            let mut session =
                FormSession::new(Arc::clone(&catalog), FormState::new(), ExternalData::new())
                    .unwrap();
            let mut x = 0_i64;
            b.iter(|| {
                x += 1;
                session.apply_change("f0", black_box(x)).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    for &n in &[100, 1000] {
        let catalog = Arc::new(
            CatalogBuilder::new()
                .rule("resolve-name", |r| {
                    r.on("workerId").when_set().lookup("workerName", "workerOptions", |l| {
                        l.matching("_id").copying("fullName")
                    })
                })
                .compile()
                .unwrap(),
        );
        group.bench_function(&format!("{n}_records"), |b| {
            let mut session =
                FormSession::new(Arc::clone(&catalog), FormState::new(), worker_list(n)).unwrap();
            let mut i = 0_usize;
            b.iter(|| {
                i = (i + 1) % n;
                session
                    .apply_change("workerId", black_box(format!("w{i}")))
                    .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile_50_rules", |b| {
        b.iter(|| {
            let mut builder = CatalogBuilder::new();
            for i in 0..50 {
                let from = format!("f{i}");
                let to = format!("f{}", i + 1);
                builder = builder.rule(&format!("r{i}"), |r| {
                    r.on(&from).preset(&to, |_| Ok(Value::Int(1)))
                });
            }
            builder.compile().unwrap()
        });
    });
}

criterion_group!(benches, bench_cascade, bench_lookup, bench_compile);
criterion_main!(benches);
